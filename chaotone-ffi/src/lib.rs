//! C ABI wrapper for the Chaotone engine.
//!
//! Exposes functions to create/destroy a session, render interleaved f32
//! samples, change parameters and routing, and pull meter snapshots.
//!
//! ABI notes
//! - All functions are `extern "C"` and `#[no_mangle]`.
//! - Opaque handle type: `ChaotoneEngine` (heap-allocated; you own/delete it).
//! - Render path produces **mono** internally and duplicates to N channels.
//! - Names (targets, keys) are NUL-terminated UTF-8 strings.
//! - Control functions return a status code: `0` ok, `-1` null pointer,
//!   `-2` invalid UTF-8, `-3` unknown target, `-4` unknown parameter,
//!   `-5` target has nothing to reset.
//!
//! Threading
//! - The object is NOT thread-safe; call all functions from the same audio thread.

use std::ffi::{c_char, CStr};
use std::str::FromStr;

use chaotone_engine::{Engine, Error, FormulaId, Patch, Session, StageKind, Target};

pub const CHAOTONE_OK: i32 = 0;
pub const CHAOTONE_ERR_NULL: i32 = -1;
pub const CHAOTONE_ERR_UTF8: i32 = -2;
pub const CHAOTONE_ERR_UNKNOWN_TARGET: i32 = -3;
pub const CHAOTONE_ERR_UNKNOWN_PARAM: i32 = -4;
pub const CHAOTONE_ERR_NOT_RESETTABLE: i32 = -5;

const SCRATCH_FRAMES: usize = 4096;

/// Opaque engine wrapper we hand to C.
///
/// The sample rate lives here so the host does not pass it with every render
/// call; `chaotone_reset_sample_rate` updates it on reconfiguration.
pub struct ChaotoneEngine {
    sr: f32,
    inner: Engine<Session>,
    scratch: Vec<f32>,
}

impl ChaotoneEngine {
    fn new(session: Session) -> Self {
        let sr = session.sample_rate();
        Self { sr, inner: Engine::new(session, sr), scratch: vec![0.0; SCRATCH_FRAMES] }
    }

    fn session(&mut self) -> &mut Session {
        self.inner.generator_mut()
    }
}

fn status_of(e: &Error) -> i32 {
    match e {
        Error::UnknownParam { .. } => CHAOTONE_ERR_UNKNOWN_PARAM,
        Error::NotResettable(_) => CHAOTONE_ERR_NOT_RESETTABLE,
        _ => CHAOTONE_ERR_UNKNOWN_TARGET,
    }
}

fn engine_mut<'a>(engine: *mut ChaotoneEngine) -> Result<&'a mut ChaotoneEngine, i32> {
    unsafe { engine.as_mut() }.ok_or(CHAOTONE_ERR_NULL)
}

fn name<'a>(s: *const c_char) -> Result<&'a str, i32> {
    if s.is_null() {
        return Err(CHAOTONE_ERR_NULL);
    }
    unsafe { CStr::from_ptr(s) }.to_str().map_err(|_| CHAOTONE_ERR_UTF8)
}

fn to_status(r: Result<(), i32>) -> i32 {
    r.err().unwrap_or(CHAOTONE_OK)
}

// --- Creation / destruction -------------------------------------------------------

/// Create a new engine with every formula and stage off.
#[no_mangle]
pub extern "C" fn chaotone_create(sample_rate: f32) -> *mut ChaotoneEngine {
    Box::into_raw(Box::new(ChaotoneEngine::new(Session::new(sample_rate))))
}

/// Create an engine from a JSON patch. Returns null on a null pointer,
/// invalid UTF-8 or malformed JSON.
#[no_mangle]
pub extern "C" fn chaotone_create_with_patch(sample_rate: f32, patch_json: *const c_char) -> *mut ChaotoneEngine {
    let Ok(text) = name(patch_json) else {
        return std::ptr::null_mut();
    };
    match Patch::from_json(text) {
        Ok(patch) => Box::into_raw(Box::new(ChaotoneEngine::new(Session::from_patch(sample_rate, &patch)))),
        Err(e) => {
            log::warn!("chaotone_create_with_patch: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Destroy an engine previously returned by `chaotone_create*`.
#[no_mangle]
pub extern "C" fn chaotone_destroy(engine: *mut ChaotoneEngine) {
    if !engine.is_null() {
        unsafe { drop(Box::from_raw(engine)); }
    }
}

/// Switch to a new sample rate (e.g., when the host changes device config).
/// Parameters, routing and enable flags are kept.
#[no_mangle]
pub extern "C" fn chaotone_reset_sample_rate(engine: *mut ChaotoneEngine, sample_rate: f32) -> i32 {
    to_status(engine_mut(engine).map(|e| e.sr = sample_rate.max(1.0)))
}

// --- Rendering -------------------------------------------------------------------

/// Render `frames` of audio into an interleaved f32 buffer with `channels` channels.
/// The internal signal is mono; each sample is duplicated to all channels.
///
/// Returns the number of frames rendered (0 on error).
#[no_mangle]
pub extern "C" fn chaotone_render_interleaved_f32(
    engine: *mut ChaotoneEngine,
    out_interleaved: *mut f32,
    frames: u32,
    channels: u32,
) -> u32 {
    let Ok(e) = engine_mut(engine) else { return 0 };
    if out_interleaved.is_null() || frames == 0 || channels == 0 {
        return 0;
    }
    let ch = channels as usize;
    let out = unsafe { std::slice::from_raw_parts_mut(out_interleaved, frames as usize * ch) };

    let sr = e.sr;
    for chunk in out.chunks_mut(ch * SCRATCH_FRAMES) {
        let mono = &mut e.scratch[..chunk.len() / ch];
        e.inner.render(sr, mono);
        for (frame, &s) in chunk.chunks_mut(ch).zip(mono.iter()) {
            frame.fill(s);
        }
    }
    frames
}

// --- Control ---------------------------------------------------------------------

/// Set `key` on a formula, an effect stage or `master`. Values are clamped.
/// Changing reverb `decay` rebuilds the impulse response before returning,
/// which can take tens of milliseconds.
#[no_mangle]
pub extern "C" fn chaotone_set_param(
    engine: *mut ChaotoneEngine,
    target: *const c_char,
    key: *const c_char,
    value: f32,
) -> i32 {
    to_status((|| -> Result<(), i32> {
        let e = engine_mut(engine)?;
        let target = Target::from_str(name(target)?).map_err(|err| status_of(&err))?;
        e.session().set_param(target, name(key)?, value).map_err(|err| status_of(&err))
    })())
}

/// Restart a resettable formula, or clear an effect stage's buffers.
#[no_mangle]
pub extern "C" fn chaotone_reset(engine: *mut ChaotoneEngine, target: *const c_char) -> i32 {
    to_status((|| -> Result<(), i32> {
        let e = engine_mut(engine)?;
        let target = Target::from_str(name(target)?).map_err(|err| status_of(&err))?;
        e.session().reset_target(target).map_err(|err| status_of(&err))
    })())
}

#[no_mangle]
pub extern "C" fn chaotone_set_stage_enabled(engine: *mut ChaotoneEngine, stage: *const c_char, enabled: bool) -> i32 {
    to_status((|| -> Result<(), i32> {
        let e = engine_mut(engine)?;
        let kind = StageKind::from_str(name(stage)?).map_err(|_| CHAOTONE_ERR_UNKNOWN_TARGET)?;
        e.session().set_stage_enabled(kind, enabled);
        Ok(())
    })())
}

#[no_mangle]
pub extern "C" fn chaotone_set_formula_enabled(
    engine: *mut ChaotoneEngine,
    formula: *const c_char,
    enabled: bool,
) -> i32 {
    to_status((|| -> Result<(), i32> {
        let e = engine_mut(engine)?;
        let id = FormulaId::from_str(name(formula)?).map_err(|_| CHAOTONE_ERR_UNKNOWN_TARGET)?;
        e.session().set_formula_enabled(id, enabled);
        Ok(())
    })())
}

// --- Metering --------------------------------------------------------------------

/// Copy the newest `len` post-master samples (oldest first, zero-padded) into `out`.
/// Returns the number of samples written (at most 16384).
#[no_mangle]
pub extern "C" fn chaotone_snapshot_time(engine: *mut ChaotoneEngine, out: *mut f32, len: u32) -> u32 {
    let Ok(e) = engine_mut(engine) else { return 0 };
    if out.is_null() {
        return 0;
    }
    let snap = e.session().meter().time_snapshot(len as usize);
    let dst = unsafe { std::slice::from_raw_parts_mut(out, snap.len()) };
    dst.copy_from_slice(&snap);
    snap.len() as u32
}

/// Write `bins` spectrum magnitudes in dB into `out`. Returns the number written.
#[no_mangle]
pub extern "C" fn chaotone_snapshot_frequency(engine: *mut ChaotoneEngine, out: *mut f32, bins: u32) -> u32 {
    let Ok(e) = engine_mut(engine) else { return 0 };
    if out.is_null() || bins == 0 {
        return 0;
    }
    let spec = e.session().meter().frequency_snapshot(bins as usize);
    let n = spec.len().min(bins as usize);
    let dst = unsafe { std::slice::from_raw_parts_mut(out, n) };
    dst.copy_from_slice(&spec[..n]);
    n as u32
}
