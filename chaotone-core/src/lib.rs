#![cfg_attr(not(feature = "std"), no_std)]
//! Chaotone Core: no_std-ready DSP primitives with optional fast-math and SIMD hooks.
//!
//! Features
//! - `std`      : (default) use the Rust standard library
//! - `no-std`   : build with `#![no_std]` and use `libm`/`micromath` math backends
//! - `fast-math`: enable polynomial approximations for trig in coefficient math
//! - `simd`     : vectorized block mixing via `wide`
//!
//! Modules
//! - [`dsp`]       : math backend, utils (db/lin, clamping, coefficients, meters, mixing)
//! - [`envelopes`] : peak follower for dynamics side-chains
//! - [`filters`]   : one-pole LP, TPT all-pass, TPT SVF
//! - [`noise`]     : Kellet pink filter bank, clamped brown walk
//!
//! Everything here is fixed-size state; buffers that grow with the sample rate
//! (delay lines, impulse responses) live in `chaotone-engine`.

pub mod dsp;
pub mod envelopes;
pub mod filters;
pub mod noise;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::dsp::{
        clamp, db_to_lin, kill_denormals, lin_to_db, max_freq, mix_in_place, one_pole_coeff_hz,
        one_pole_coeff_ms, sanitize, tpt_g, Rms, TAU,
    };
    pub use crate::envelopes::PeakFollower;
    pub use crate::filters::{AllpassTpt, OnePoleLP, SvfMode, SvfTpt};
    pub use crate::noise::{BrownWalk, PinkKellet};
}
