//! Envelope followers for dynamics processing.
//!
//! `PeakFollower` tracks the rectified input with separate attack and release
//! time constants (RC-style, `a = exp(-1/(tau*sr))`), which is what a limiter or
//! compressor side-chain needs. Allocation free and `no_std` friendly.

use crate::dsp::one_pole_coeff_ms;
use core::fmt::Debug;

/// Peak envelope follower with attack/release smoothing.
#[derive(Copy, Clone, Debug)]
pub struct PeakFollower {
    sr: f32,
    atk_ms: f32,
    rel_ms: f32,
    a_atk: f32,
    a_rel: f32,
    env: f32,
}

impl PeakFollower {
    #[inline]
    pub fn new(atk_ms: f32, rel_ms: f32, sr: f32) -> Self {
        let mut f = Self {
            sr: sr.max(1.0),
            atk_ms: atk_ms.max(0.0),
            rel_ms: rel_ms.max(0.0),
            a_atk: 0.0,
            a_rel: 0.0,
            env: 0.0,
        };
        f.recalc();
        f
    }

    #[inline]
    fn recalc(&mut self) {
        self.a_atk = one_pole_coeff_ms(self.atk_ms, self.sr);
        self.a_rel = one_pole_coeff_ms(self.rel_ms, self.sr);
    }

    #[inline] pub fn set_sample_rate(&mut self, sr: f32) { self.sr = sr.max(1.0); self.recalc(); }
    #[inline] pub fn set_attack_ms(&mut self, ms: f32) { self.atk_ms = ms.max(0.0); self.recalc(); }
    #[inline] pub fn set_release_ms(&mut self, ms: f32) { self.rel_ms = ms.max(0.0); self.recalc(); }

    /// Advance one sample and return the current envelope.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let level = x.abs();
        let a = if level > self.env { self.a_atk } else { self.a_rel };
        self.env = level + a * (self.env - level);
        self.env
    }

    #[inline] pub fn value(&self) -> f32 { self.env }
    #[inline] pub fn reset(&mut self) { self.env = 0.0; }
}

#[cfg(test)]
mod tests {
    use super::*;
    use more_asserts::{assert_gt, assert_lt};

    #[test]
    fn attacks_fast_and_releases_slowly() {
        let sr = 48000.0;
        let mut f = PeakFollower::new(1.0, 200.0, sr);
        for _ in 0..480 {
            f.process(1.0);
        }
        assert_gt!(f.value(), 0.99);

        // 10 ms of silence: a 200 ms release barely moves.
        for _ in 0..480 {
            f.process(0.0);
        }
        assert_gt!(f.value(), 0.9);

        for _ in 0..(sr as usize * 2) {
            f.process(0.0);
        }
        assert_lt!(f.value(), 1e-3);
    }

    #[test]
    fn zero_attack_is_instant() {
        let mut f = PeakFollower::new(0.0, 50.0, 44100.0);
        assert_eq!(f.process(-0.7), 0.7);
    }
}
