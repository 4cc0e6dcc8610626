//! Filters: lightweight one-poles, a first-order all-pass and a TPT state-variable filter.
//!
//! Goals
//! - `no_std`-friendly, allocation free
//! - Stable, musically-pleasant responses
//! - Robust under per-sample parameter modulation
//!
//! Contents
//! - `OnePoleLP`  : "RC-style" one-pole low-pass (noise colouring, IR shaping)
//! - `AllpassTpt` : first-order TPT all-pass (phaser stages)
//! - `SvfMode`    : LP/HP/BP/Notch modes for the SVF
//! - `SvfTpt`     : State-Variable Filter via Topology Preserving Transform
//!
//! Notes
//! - `OnePoleLP` uses the inexpensive `y += a * (x - y)` form, where
//!   `a = 1 - exp(-2π fc / sr)`.
//! - `SvfTpt` uses the "g = tan(π fc / sr)" formulation with `R = 1/(2Q)`.

use crate::dsp::{kill_denormals, max_freq, one_pole_coeff_hz, tpt_g};
use core::fmt::Debug;

/// One-pole low-pass `y += a * (x - y)`.
///
/// `a` is derived from cutoff (Hz) and sample rate:
/// `a = 1 - exp(-2π * fc / sr)`.
#[derive(Copy, Clone, Debug)]
pub struct OnePoleLP {
    a: f32,
    y: f32,
    sr: f32,
    fc: f32,
}

impl OnePoleLP {
    /// Create a low-pass with cutoff `cut_hz` and sample rate `sr`.
    #[inline]
    pub fn new(cut_hz: f32, sr: f32) -> Self {
        let mut s = Self {
            a: 0.0,
            y: 0.0,
            sr: sr.max(1.0),
            fc: cut_hz.max(0.0),
        };
        s.update_coeffs();
        s
    }

    #[inline]
    pub fn set_sample_rate(&mut self, sr: f32) {
        self.sr = sr.max(1.0);
        self.update_coeffs();
    }

    #[inline]
    pub fn set_cutoff_hz(&mut self, cut_hz: f32) {
        self.fc = cut_hz.max(0.0);
        self.update_coeffs();
    }

    #[inline]
    fn update_coeffs(&mut self) {
        self.a = 1.0 - one_pole_coeff_hz(self.fc, self.sr);
    }

    /// Process one sample.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        self.y += self.a * (x - self.y);
        self.y = kill_denormals(self.y);
        self.y
    }

    #[inline] pub fn coeff(&self) -> f32 { self.a }
    #[inline] pub fn value(&self) -> f32 { self.y }
    #[inline] pub fn reset(&mut self) { self.y = 0.0; }
}

/// First-order all-pass in TPT form.
///
/// Unity magnitude at every frequency; phase passes -90° at `fc`.
/// `set_cutoff_hz` is cheap enough to call every sample.
#[derive(Copy, Clone, Debug)]
pub struct AllpassTpt {
    sr: f32,
    big_g: f32,
    s: f32,
}

impl AllpassTpt {
    #[inline]
    pub fn new(cut_hz: f32, sr: f32) -> Self {
        let mut ap = Self { sr: sr.max(1.0), big_g: 0.0, s: 0.0 };
        ap.set_cutoff_hz(cut_hz);
        ap
    }

    #[inline] pub fn set_sample_rate(&mut self, sr: f32) { self.sr = sr.max(1.0); }

    #[inline]
    pub fn set_cutoff_hz(&mut self, cut_hz: f32) {
        let fc = cut_hz.max(1.0).min(max_freq(self.sr));
        let g = tpt_g(fc, self.sr);
        self.big_g = g / (1.0 + g);
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let v = (x - self.s) * self.big_g;
        let lp = v + self.s;
        self.s = kill_denormals(lp + v);
        2.0 * lp - x
    }

    #[inline] pub fn reset(&mut self) { self.s = 0.0; }
}

/// SVF output tap selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SvfMode {
    Lowpass,
    Highpass,
    Bandpass,
    Notch,
}

/// Topology-Preserving Transform SVF (State-Variable Filter).
///
/// Parameters:
/// - `cut_hz`  : cutoff / center frequency in Hz (kept below 0.45·sr)
/// - `q`       : quality factor (>= ~0.5 typical; lower increases damping)
///
/// Internals:
/// - `g = tan(π fc / sr)`
/// - `R = 1 / (2Q)`
#[derive(Copy, Clone, Debug)]
pub struct SvfTpt {
    sr: f32,
    cut: f32,
    q: f32,
    // derived
    g: f32,
    r: f32,
    // states
    ic1eq: f32,
    ic2eq: f32,
}

impl SvfTpt {
    #[inline]
    pub fn new(cut_hz: f32, q: f32, sr: f32) -> Self {
        let mut s = Self {
            sr: sr.max(1.0),
            cut: cut_hz.max(0.0),
            q: q.max(1e-4),
            g: 0.0,
            r: 0.0,
            ic1eq: 0.0,
            ic2eq: 0.0,
        };
        s.recalc();
        s
    }

    #[inline] pub fn set_sample_rate(&mut self, sr: f32) { self.sr = sr.max(1.0); self.recalc(); }
    #[inline] pub fn set_cutoff_hz(&mut self, cut_hz: f32) { self.cut = cut_hz.max(0.0); self.recalc(); }
    #[inline] pub fn set_q(&mut self, q: f32) { self.q = q.max(1e-4); self.recalc(); }

    #[inline]
    fn recalc(&mut self) {
        let fc = self.cut.min(max_freq(self.sr));
        self.g = tpt_g(fc, self.sr);
        self.r = 1.0 / (2.0 * self.q);
    }

    #[inline]
    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }

    /// Process one sample and return the four taps `(lp, bp, hp, notch)`.
    #[inline]
    pub fn process_all(&mut self, x: f32) -> (f32, f32, f32, f32) {
        // Zavalishin's TPT SVF, solved for the zero-delay feedback loop:
        // hp = (x - (2R + g) s1 - s2) / (1 + 2Rg + g²)
        let g = self.g;
        let r2 = 2.0 * self.r;
        let hp = (x - (r2 + g) * self.ic1eq - self.ic2eq) / (1.0 + r2 * g + g * g);
        let v1 = g * hp;
        let bp = v1 + self.ic1eq;
        let v2 = g * bp;
        let lp = v2 + self.ic2eq;

        self.ic1eq = kill_denormals(bp + v1);
        self.ic2eq = kill_denormals(lp + v2);

        (lp, bp, hp, lp + hp)
    }

    /// Process one sample, returning only the mode requested.
    #[inline]
    pub fn process(&mut self, x: f32, mode: SvfMode) -> f32 {
        let (lp, bp, hp, n) = self.process_all(x);
        match mode {
            SvfMode::Lowpass => lp,
            SvfMode::Highpass => hp,
            SvfMode::Bandpass => bp,
            SvfMode::Notch => n,
        }
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::TAU;
    use more_asserts::{assert_gt, assert_lt};

    fn sine_peak(f: f32, sr: f32, mut run: impl FnMut(f32) -> f32) -> f32 {
        let n = sr as usize;
        let mut peak = 0.0_f32;
        for i in 0..n {
            let y = run((TAU * f * i as f32 / sr).sin());
            if i > n / 2 {
                peak = peak.max(y.abs());
            }
        }
        peak
    }

    #[test]
    fn one_pole_lp_moves_towards_input() {
        let sr = 48000.0;
        let mut lp = OnePoleLP::new(1000.0, sr);
        let mut y = 0.0;
        for _ in 0..(sr as usize) {
            y = lp.process(1.0);
        }
        assert_gt!(y, 0.9);
    }

    #[test]
    fn allpass_keeps_magnitude() {
        let sr = 48000.0;
        let mut ap = AllpassTpt::new(700.0, sr);
        let peak = sine_peak(300.0, sr, |x| ap.process(x));
        assert!((peak - 1.0).abs() < 0.02, "peak={peak}");
    }

    #[test]
    fn svf_lowpass_passes_low_and_cuts_high() {
        let sr = 48000.0;
        let mut svf = SvfTpt::new(500.0, 0.707, sr);
        let low = sine_peak(50.0, sr, |x| svf.process(x, SvfMode::Lowpass));
        svf.reset();
        let high = sine_peak(8000.0, sr, |x| svf.process(x, SvfMode::Lowpass));
        assert_gt!(low, 0.9);
        assert_lt!(high, 0.05);
    }

    #[test]
    fn svf_highpass_blocks_dc() {
        let sr = 48000.0;
        let mut svf = SvfTpt::new(200.0, 0.707, sr);
        let mut y = 1.0;
        for _ in 0..(sr as usize) {
            y = svf.process(1.0, SvfMode::Highpass);
        }
        assert_lt!(y.abs(), 1e-3);
    }

    #[test]
    fn svf_survives_cutoff_above_nyquist() {
        let sr = 44100.0;
        let mut svf = SvfTpt::new(40_000.0, 10.0, sr);
        for i in 0..10_000 {
            let y = svf.process(if i % 2 == 0 { 1.0 } else { -1.0 }, SvfMode::Bandpass);
            assert!(y.is_finite());
        }
    }
}
