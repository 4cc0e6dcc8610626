//! Generic DSP utilities and math helpers.
//!
//! Design goals:
//! - `no_std` ready (guarded by the crate feature `no-std`)
//! - Math backend selection that works in both `std` and `no_std` contexts
//! - Optional `fast-math` approximations for hot paths
//! - Clean, side-effect free helpers that are easy to test
//!
//! Features used by this file:
//! - `fast-math` : enables polynomial/rational approximations (faster, approx.)
//! - `simd`      : vectorized `mix_in_place` through `wide::f32x4`
//!
//! Conventions:
//! - All functions are `#[inline]` where useful to help the optimizer.
//! - Argument and return domains are documented per function.

#![allow(clippy::excessive_precision)]

use core::f32::consts::PI;

use cfg_if::cfg_if;
use num_traits::Float;

// ----------------------------- Math backend selection -----------------------------

cfg_if! {
    // micromath preferred if explicitly requested (works in no_std)
    if #[cfg(feature = "micromath")] {
        use micromath::F32Ext as _;
        #[inline] fn m_sin(x: f32) -> f32 { x.sin() }
        #[inline] fn m_cos(x: f32) -> f32 { x.cos() }
        #[inline] fn m_exp(x: f32) -> f32 { x.exp() }
        #[inline] fn m_tan(x: f32) -> f32 { (x.sin()) / (x.cos()) }
        #[inline] fn m_ln(x: f32) -> f32 { x.ln() }
    // libm (C math) in no_std
    } else if #[cfg(feature = "no-std")] {
        #[inline] fn m_sin(x: f32) -> f32 { libm::sinf(x) }
        #[inline] fn m_cos(x: f32) -> f32 { libm::cosf(x) }
        #[inline] fn m_exp(x: f32) -> f32 { libm::expf(x) }
        #[inline] fn m_tan(x: f32) -> f32 { libm::tanf(x) }
        #[inline] fn m_ln(x: f32) -> f32 { libm::logf(x) }
    // std backend
    } else {
        #[inline] fn m_sin(x: f32) -> f32 { x.sin() }
        #[inline] fn m_cos(x: f32) -> f32 { x.cos() }
        #[inline] fn m_exp(x: f32) -> f32 { x.exp() }
        #[inline] fn m_tan(x: f32) -> f32 { x.tan() }
        #[inline] fn m_ln(x: f32) -> f32 { x.ln() }
    }
}

// --------------------------------- Constants -------------------------------------

/// 2π (commonly useful)
pub const TAU: f32 = 2.0 * PI;

/// A very small epsilon used in denormal handling and safe divisions.
pub const EPS_SMALL: f32 = 1.0e-20;

/// Highest frequency any oscillator or filter is allowed to reach, as a fraction of
/// the sample rate.
pub const NYQUIST_GUARD: f32 = 0.45;

// --------------------------------- Utilities -------------------------------------

/// Clamp `x` into `[lo, hi]`. NaN maps to `lo`.
#[inline]
pub fn clamp(x: f32, lo: f32, hi: f32) -> f32 {
    if x >= lo {
        if x > hi { hi } else { x }
    } else {
        lo
    }
}

/// Replace NaN/±inf with zero. Works for both the `f32` audio path and the `f64`
/// clocks used by the generators.
#[inline]
pub fn sanitize<T: Float>(x: T) -> T {
    if x.is_finite() { x } else { T::zero() }
}

/// Wrap phase into [0, 1).
#[inline]
pub fn wrap_phase01(mut p: f32) -> f32 {
    p = p - (p + 1.0).floor() + 1.0;
    if p >= 1.0 { p - 1.0 } else { p }
}

/// Highest usable frequency for a given sample rate (see [`NYQUIST_GUARD`]).
#[inline]
pub fn max_freq(sr: f32) -> f32 {
    NYQUIST_GUARD * sr
}

/// Kill denormal/subnormal values. Returns 0.0 if |x| < EPS_SMALL.
#[inline]
pub fn kill_denormals(x: f32) -> f32 {
    if x.abs() < EPS_SMALL { 0.0 } else { x }
}

// --------------------------------- dB / linear -----------------------------------

/// Convert dB to linear gain: lin = 10^(db/20).
#[inline]
pub fn db_to_lin(db: f32) -> f32 {
    if db <= -120.0 { 0.0 } else { m_exp(0.11512925464970229_f32 * db) } // ln(10)/20
}

/// Convert linear gain to dB: db = 20*log10(lin). Floors at -120 dB.
#[inline]
pub fn lin_to_db(lin: f32) -> f32 {
    if lin <= EPS_SMALL { -120.0 }
    else { (8.685889638065036553_f32 * m_ln(lin)).max(-120.0) } // 20/ln(10)
}

// --------------------------------- Fast trig -------------------------------------

/// Fast sine with range reduction into [-π, π] and 5th-order minimax-style poly.
/// Max abs error ~1e-3 for musical uses when `fast-math` is enabled; falls back to exact otherwise.
#[inline]
pub fn fast_sin(x: f32) -> f32 {
    if cfg!(feature = "fast-math") {
        let mut xr = x;
        let k = (xr / TAU).round();
        xr -= k * TAU;

        // 5th-order odd polynomial: sin(x) ≈ x * (a + b x^2 + c x^4)
        let x2 = xr * xr;
        xr * (0.999_979_313_3 + x2 * (-0.166_624_432_0 + x2 * 0.008_308_978_98))
    } else {
        m_sin(x)
    }
}

#[inline]
pub fn fast_cos(x: f32) -> f32 {
    if cfg!(feature = "fast-math") {
        fast_sin(x + core::f32::consts::PI * 0.5)
    } else {
        m_cos(x)
    }
}

// --------------------------------- Exponentials / smoothing ----------------------

/// One-pole smoothing coefficient for a time constant `t_ms` (milliseconds).
///
/// The discrete one-pole form: `y[n] += (1 - a) * (x[n] - y[n])`
/// where `a = exp(-1/(tau * sr))` for first-order lag with time constant `tau`.
#[inline]
pub fn one_pole_coeff_ms(t_ms: f32, sr: f32) -> f32 {
    if t_ms <= 0.0 { return 0.0; }
    let tau = t_ms * 0.001;
    m_exp(-1.0 / (tau * sr.max(1.0)))
}

/// Convert cutoff in Hz to the `exp(-2π fc / sr)` pole of an "RC" style one-pole.
#[inline]
pub fn one_pole_coeff_hz(cut_hz: f32, sr: f32) -> f32 {
    let sr = sr.max(1.0);
    let fc = cut_hz.max(0.0).min(0.499 * sr);
    m_exp(-2.0 * PI * fc / sr)
}

/// TPT (Topology-Preserving Transform) `g = tan(π fc / sr)` helper for state-variable
/// and all-pass filters.
#[inline]
pub fn tpt_g(cut_hz: f32, sr: f32) -> f32 {
    let x = core::f32::consts::PI * (cut_hz / sr.max(1.0));
    if cfg!(feature = "fast-math") {
        fast_sin(x) / fast_cos(x)
    } else {
        m_tan(x)
    }
}

// --------------------------------- Simple meters ---------------------------------

/// Running RMS meter (windowed via exponential smoothing). Call once per sample.
///
/// `alpha` is the smoothing factor in [0,1]; a good choice is
/// `alpha = 1 - one_pole_coeff_ms(50, sr)`.
#[derive(Copy, Clone, Debug)]
pub struct Rms {
    pub alpha: f32,
    state: f32,
}
impl Rms {
    #[inline]
    pub fn new(alpha: f32) -> Self { Self { alpha, state: 0.0 } }

    /// Meter with a `t_ms` integration time.
    #[inline]
    pub fn with_time_ms(t_ms: f32, sr: f32) -> Self {
        Self::new(1.0 - one_pole_coeff_ms(t_ms, sr))
    }

    #[inline]
    pub fn reset(&mut self) { self.state = 0.0; }

    #[inline]
    pub fn tick(&mut self, x: f32) -> f32 {
        let x2 = x * x;
        self.state += self.alpha * (x2 - self.state);
        self.state.sqrt()
    }

    #[inline]
    pub fn value(&self) -> f32 { self.state.sqrt() }
}

// --------------------------------- Block mixing ----------------------------------

/// In-place mix: `dst[i] += src[i] * gain`. Mismatched lengths mix the common prefix.
#[cfg(not(feature = "simd"))]
#[inline]
pub fn mix_in_place(dst: &mut [f32], src: &[f32], gain: f32) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d += *s * gain;
    }
}

/// In-place mix: `dst[i] += src[i] * gain`, four lanes at a time.
#[cfg(feature = "simd")]
#[inline]
pub fn mix_in_place(dst: &mut [f32], src: &[f32], gain: f32) {
    use wide::f32x4;

    let n = dst.len().min(src.len());
    let (dst, src) = (&mut dst[..n], &src[..n]);
    let g = f32x4::splat(gain);
    let mut d4 = dst.chunks_exact_mut(4);
    let mut s4 = src.chunks_exact(4);
    for (d, s) in (&mut d4).zip(&mut s4) {
        let dv = f32x4::from([d[0], d[1], d[2], d[3]]);
        let sv = f32x4::from([s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&(dv + sv * g).to_array());
    }
    for (d, s) in d4.into_remainder().iter_mut().zip(s4.remainder()) {
        *d += *s * gain;
    }
}

// --------------------------------- Tests (std only) ------------------------------
