//! Building blocks (nodes) shared by formulas and effect stages.
//!
//! These are zero-allocation, per-sample components designed for realtime use.
//! Everything here is `Copy` and cheap to move; no locks, no heap.
//!
//! Contents:
//! - `Phasor`          : f64 phase accumulator for generators (long sessions keep precision)
//! - `Lfo`             : sine low-frequency oscillator for modulation effects
//! - `OnePoleSmoother` : parameter smoothing
//!
//! Notes:
//! - Frequency is **Hz**; methods expect the current **sample rate** when stepping.

use core::f64::consts::TAU as TAU64;

use chaotone_core::dsp::{one_pole_coeff_ms, sanitize, wrap_phase01, TAU};

/// Phase accumulator in cycles, kept in `[0, 1)`.
///
/// Integrating the instantaneous frequency (instead of evaluating `sin(2π f t)`)
/// keeps the waveform continuous when the frequency changes between samples.
#[derive(Copy, Clone, Debug, Default)]
pub struct Phasor {
    phase: f64,
}

impl Phasor {
    #[inline] pub fn new() -> Self { Self { phase: 0.0 } }
    #[inline] pub fn reset(&mut self) { self.phase = 0.0; }
    #[inline] pub fn phase(&self) -> f64 { self.phase }

    /// Return the current phase, then advance by `hz / sr`.
    #[inline]
    pub fn tick(&mut self, hz: f64, sr: f64) -> f64 {
        let p = self.phase;
        let next = p + hz / sr;
        self.phase = sanitize(next - next.floor());
        p
    }

    /// `sin(2π·phase)` of the current phase, then advance.
    #[inline]
    pub fn sine(&mut self, hz: f64, sr: f64) -> f64 {
        (TAU64 * self.tick(hz, sr)).sin()
    }
}

/// Sine LFO for delay/phase modulation.
#[derive(Copy, Clone, Debug)]
pub struct Lfo {
    phase: f32, // [0,1)
    rate: f32,  // Hz
}

impl Lfo {
    #[inline] pub fn sine(rate_hz: f32) -> Self { Self { phase: 0.0, rate: rate_hz.max(0.0) } }
    #[inline] pub fn set_rate(&mut self, hz: f32) { self.rate = hz.max(0.0); }
    #[inline] pub fn reset(&mut self) { self.phase = 0.0; }

    /// Next LFO value in **[-1,1]**.
    #[inline]
    pub fn next_norm(&mut self, sr: f32) -> f32 {
        let s = (TAU * self.phase).sin();
        self.phase = wrap_phase01(self.phase + self.rate / sr.max(1.0));
        s
    }
}

/// One-pole parameter smoother: y += (x - y) * (1 - a), with `a = exp(-1/(tau*sr))`.
#[derive(Copy, Clone, Debug)]
pub struct OnePoleSmoother {
    a: f32, // alpha (closer to 1 → slower)
    y: f32,
}
impl OnePoleSmoother {
    #[inline] pub fn new_ms(t_ms: f32, sr: f32) -> Self { Self { a: one_pole_coeff_ms(t_ms, sr), y: 0.0 } }
    #[inline] pub fn reset(&mut self, y0: f32) { self.y = y0; }
    #[inline] pub fn set_time_ms(&mut self, t_ms: f32, sr: f32) { self.a = one_pole_coeff_ms(t_ms, sr); }
    #[inline] pub fn process(&mut self, x: f32) -> f32 { self.y += (x - self.y) * (1.0 - self.a); self.y }
    #[inline] pub fn value(&self) -> f32 { self.y }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phasor_wraps_and_starts_at_zero() {
        let mut p = Phasor::new();
        assert_eq!(p.tick(1000.0, 4000.0), 0.0);
        assert_eq!(p.tick(1000.0, 4000.0), 0.25);
        for _ in 0..10 {
            let ph = p.tick(1000.0, 4000.0);
            assert!((0.0..1.0).contains(&ph));
        }
        p.reset();
        assert_eq!(p.phase(), 0.0);
    }

    #[test]
    fn phasor_survives_non_finite_frequency() {
        let mut p = Phasor::new();
        p.tick(f64::INFINITY, 44100.0);
        assert_eq!(p.phase(), 0.0);
    }

    #[test]
    fn lfo_is_bounded() {
        let mut lfo = Lfo::sine(3.0);
        for _ in 0..48_000 {
            let v = lfo.next_norm(48_000.0);
            assert!((-1.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn smoother_reaches_target() {
        let mut s = OnePoleSmoother::new_ms(10.0, 48_000.0);
        s.reset(0.0);
        for _ in 0..48_000 {
            s.process(1.0);
        }
        assert!((s.value() - 1.0).abs() < 1e-4);
    }
}
