//! Effect stages.
//!
//! Six processors, one per [`StageKind`](crate::chain::StageKind). Every stage
//! is a mono `f32 → f32` transform with a static parameter table; the chain
//! owns exactly one of each and decides which ones run.
//!
//! Stages allocate only when built or when the sample rate changes. The reverb
//! impulse for a new `decay` is built off the audio thread and swapped in.

pub mod chorus;
pub mod delay_line;
pub mod echo;
pub mod filter;
pub mod limiter;
pub mod phaser;
pub mod reverb;

pub use chorus::Chorus;
pub use echo::Echo;
pub use filter::Filter;
pub use limiter::Limiter;
pub use phaser::Phaser;
pub use reverb::Reverb;

use crate::params::{Assign, ParamSet};

/// Common surface of every effect stage.
pub trait Stage {
    fn params(&self) -> &ParamSet;

    /// Assign one parameter (clamped) and update derived coefficients.
    fn set_param(&mut self, key: &str, value: f32) -> Assign;

    fn set_sample_rate(&mut self, sr: f32);

    /// Drop all signal memory (delay buffers, filter state, envelopes).
    fn clear(&mut self);

    fn process(&mut self, x: f32) -> f32;
}

#[inline]
pub(crate) fn blend(dry: f32, wet: f32, mix: f32) -> f32 {
    dry * (1.0 - mix) + wet * mix
}
