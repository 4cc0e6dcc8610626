// Generates `chaotone.h` with `cbindgen` when it is on PATH, otherwise copies
// the checked-in `include/chaotone.h` to $OUT_DIR.
//
// Consumers can include the header from either:
//   - <repo>/chaotone-ffi/include/chaotone.h   (checked-in)
//   - $OUT_DIR/chaotone.h

use std::{env, fs, io, path::PathBuf, process::Command};

fn main() -> io::Result<()> {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=include/chaotone.h");

    let crate_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").map_err(io::Error::other)?);
    let out_dir = PathBuf::from(env::var("OUT_DIR").map_err(io::Error::other)?);
    let header_repo = crate_dir.join("include").join("chaotone.h");
    let header_out = out_dir.join("chaotone.h");

    let generated = Command::new("cbindgen")
        .args(["--crate", "chaotone-ffi", "--lang", "C", "--output"])
        .arg(&header_out)
        .current_dir(&crate_dir)
        .status()
        .map(|s| s.success())
        .unwrap_or(false);

    if generated {
        println!("cargo:warning=chaotone-ffi: generated header with cbindgen -> {}", header_out.display());
        return Ok(());
    }

    if header_repo.exists() {
        fs::copy(&header_repo, &header_out)?;
    } else {
        println!("cargo:warning=chaotone-ffi: no cbindgen and no include/chaotone.h; header not emitted");
    }
    Ok(())
}
