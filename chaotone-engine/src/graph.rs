//! Realtime synthesis graph core.
//!
//! This module defines the minimal `Generator` trait and a lightweight `Engine<G>`
//! wrapper that owns a generator (normally a [`Session`](crate::session::Session)),
//! tracks sample rate and time, and produces **mono** samples with zero heap
//! work per sample.
//!
//! Design goals
//! - No dynamic allocations in the audio thread
//! - SR changes handled lazily (if the host reconfigures), with cheap branching
//! - Generic over the generator type, so hosts can be tested with a stub

/// Anything that can generate one sample at a time.
pub trait Generator {
    /// Called when the sample rate changes.
    fn reset(&mut self, sr: f32);

    /// Generate the next mono sample. Implementations should assume the sample
    /// rate has been communicated via `reset`.
    fn next(&mut self) -> f32;

    /// Fill a block. Generators with a cheaper block path override this.
    fn render(&mut self, out: &mut [f32]) {
        for s in out.iter_mut() {
            *s = self.next();
        }
    }
}

/// Lightweight realtime engine that owns a generator.
///
/// The audio callback calls `render(sr, block)` (or `next(sr)` per sample). If
/// the `sr` reported by the host changes, the engine calls `reset(sr)` on the
/// inner generator once and continues.
pub struct Engine<G: Generator> {
    sr: f32,
    frames: u64,
    gen: G,
}

impl<G: Generator> Engine<G> {
    /// Wrap a generator already configured for `sr`.
    #[inline]
    pub fn new(gen: G, sr: f32) -> Self {
        Self { sr, frames: 0, gen }
    }

    #[inline]
    fn follow(&mut self, sr: f32) {
        if sr != self.sr {
            self.sr = sr;
            self.gen.reset(sr);
        }
    }

    /// Produce **one** mono sample at the given sample rate.
    #[inline]
    pub fn next(&mut self, sr: f32) -> f32 {
        self.follow(sr);
        self.frames += 1;
        self.gen.next()
    }

    /// Produce a block of mono samples at the given sample rate.
    #[inline]
    pub fn render(&mut self, sr: f32, out: &mut [f32]) {
        self.follow(sr);
        self.frames += out.len() as u64;
        self.gen.render(out);
    }

    /// Return the engine’s current sample rate.
    #[inline] pub fn sample_rate(&self) -> f32 { self.sr }

    /// Elapsed time in seconds at the current sample rate.
    #[inline] pub fn time(&self) -> f64 { self.frames as f64 / f64::from(self.sr) }

    /// Replace the inner generator, bringing it to the current sample rate.
    #[inline]
    pub fn swap_generator(&mut self, mut gen: G) -> G {
        gen.reset(self.sr);
        core::mem::replace(&mut self.gen, gen)
    }

    #[inline] pub fn generator(&self) -> &G { &self.gen }

    /// Mutable access for live parameter tweaks from the audio thread.
    #[inline] pub fn generator_mut(&mut self) -> &mut G { &mut self.gen }
}
