//! Closed-form and phase-accumulated tonal formulas.
//!
//! The stateless ones (`fm`, `beats`, `am`, `additive`, `distortion`) are pure
//! functions of the voice clock. The rest carry a small state struct.

use core::f64::consts::TAU;

use super::Clock;
use crate::nodes::Phasor;
use crate::params::{ParamSet, ParamSpec, GAIN};

// ---- fm -------------------------------------------------------------------

pub static FM_PARAMS: [ParamSpec; 4] = [
    GAIN,
    ParamSpec::new("fc", 220.0, 20.0, 8000.0),
    ParamSpec::new("fm", 2.0, 0.0, 2000.0),
    ParamSpec::new("index", 2.0, 0.0, 50.0),
];

#[inline]
pub fn fm(p: &ParamSet, c: Clock) -> f64 {
    let fc = c.hz(p.get(1));
    let fm = c.hz(p.get(2));
    let index = f64::from(p.get(3));
    (TAU * fc * c.t + index * (TAU * fm * c.t).sin()).sin()
}

// ---- beats ----------------------------------------------------------------

pub static BEATS_PARAMS: [ParamSpec; 3] = [
    GAIN,
    ParamSpec::new("f1", 220.0, 20.0, 8000.0),
    ParamSpec::new("f2", 222.0, 20.0, 8000.0),
];

#[inline]
pub fn beats(p: &ParamSet, c: Clock) -> f64 {
    (TAU * c.hz(p.get(1)) * c.t).sin() * (TAU * c.hz(p.get(2)) * c.t).sin()
}

// ---- am -------------------------------------------------------------------

pub static AM_PARAMS: [ParamSpec; 4] = [
    GAIN,
    ParamSpec::new("fc", 440.0, 20.0, 8000.0),
    ParamSpec::new("fm", 4.0, 0.0, 1000.0),
    ParamSpec::new("depth", 0.5, 0.0, 1.0),
];

#[inline]
pub fn am(p: &ParamSet, c: Clock) -> f64 {
    let depth = f64::from(p.get(3));
    let env = 1.0 + depth * (TAU * c.hz(p.get(2)) * c.t).sin();
    env * (TAU * c.hz(p.get(1)) * c.t).sin() / (1.0 + depth)
}

// ---- additive -------------------------------------------------------------

pub const MAX_HARMONICS: usize = 64;

pub static ADDITIVE_PARAMS: [ParamSpec; 4] = [
    GAIN,
    ParamSpec::new("fund", 110.0, 20.0, 2000.0),
    ParamSpec::new("harmonics", 8.0, 1.0, MAX_HARMONICS as f32),
    ParamSpec::new("move", 1.5, 0.0, 20.0),
];

/// Harmonics above the Nyquist guard are skipped; the normalization still
/// counts them so the level does not jump as `fund` sweeps.
pub fn additive(p: &ParamSet, c: Clock) -> f64 {
    let fund = f64::from(p.get(1));
    let n = (p.get(2).round() as usize).clamp(1, MAX_HARMONICS);
    let mv = f64::from(p.get(3));
    let ceiling = c.max_hz();
    let mut sum = 0.0;
    for k in 1..=n {
        let kf = k as f64;
        let f = kf * fund;
        if f > ceiling {
            break;
        }
        sum += (mv * c.t + kf).sin() * (TAU * f * c.t).sin() / kf;
    }
    sum / ((n + 1) as f64).log2().max(1.0)
}

// ---- distortion -----------------------------------------------------------

pub static DISTORTION_PARAMS: [ParamSpec; 3] = [
    GAIN,
    ParamSpec::new("f", 110.0, 20.0, 8000.0),
    ParamSpec::new("alpha", 3.0, 0.1, 50.0),
];

#[inline]
pub fn distortion(p: &ParamSet, c: Clock) -> f64 {
    (f64::from(p.get(2)) * (TAU * c.hz(p.get(1)) * c.t).sin()).tanh()
}

// ---- glissando ------------------------------------------------------------

pub static GLISSANDO_PARAMS: [ParamSpec; 3] = [
    GAIN,
    ParamSpec::new("f0", 55.0, 20.0, 2000.0),
    ParamSpec::new("k", 0.2, -2.0, 2.0),
];

/// Exponential sweep; the glide clock only restarts on reset.
#[derive(Clone, Debug, Default)]
pub struct Glissando {
    elapsed: u64,
    osc: Phasor,
}

impl Glissando {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Instantaneous frequency, clamped to `[1 Hz, guard]`.
    pub fn frequency(&self, p: &ParamSet, c: Clock) -> f64 {
        let tg = self.elapsed as f64 / c.sr;
        let f = f64::from(p.get(1)) * (f64::from(p.get(2)) * tg).exp();
        f.clamp(1.0, c.max_hz())
    }

    pub fn next(&mut self, p: &ParamSet, c: Clock) -> f64 {
        let f = self.frequency(p, c);
        self.elapsed += 1;
        self.osc.sine(f, c.sr)
    }
}

// ---- pm -------------------------------------------------------------------

pub static PM_PARAMS: [ParamSpec; 3] = [
    GAIN,
    ParamSpec::new("f", 220.0, 20.0, 8000.0),
    ParamSpec::new("f2", 3.0, 0.0, 1000.0),
];

#[derive(Clone, Debug, Default)]
pub struct Pm {
    carrier: Phasor,
}

impl Pm {
    pub fn reset(&mut self) {
        self.carrier.reset();
    }

    pub fn next(&mut self, p: &ParamSet, c: Clock) -> f64 {
        let phi = self.carrier.tick(c.hz(p.get(1)), c.sr);
        let wobble = (TAU * c.hz(p.get(2)) * c.t).sin().sin();
        (TAU * phi + 5.0 * wobble).sin()
    }
}

// ---- quasi ----------------------------------------------------------------

pub static QUASI_PARAMS: [ParamSpec; 4] = [
    GAIN,
    ParamSpec::new("base", 220.0, 20.0, 4000.0),
    ParamSpec::new("excursion", 110.0, 0.0, 2000.0),
    ParamSpec::new("w", 1.3, 0.01, 50.0),
];

/// Frequency driven by a triply nested sine of a slow angle.
#[derive(Clone, Debug, Default)]
pub struct Quasi {
    theta: f64,
    osc: Phasor,
}

impl Quasi {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn next(&mut self, p: &ParamSet, c: Clock) -> f64 {
        let m = self.theta.sin().sin().sin();
        self.theta = (self.theta + f64::from(p.get(3)) / c.sr) % TAU;
        let f = c.hz_f64(f64::from(p.get(1)) + f64::from(p.get(2)) * m);
        self.osc.sine(f, c.sr)
    }
}

// ---- bitcrush -------------------------------------------------------------

pub static BITCRUSH_PARAMS: [ParamSpec; 4] = [
    GAIN,
    ParamSpec::new("f", 220.0, 20.0, 8000.0),
    ParamSpec::new("bits", 4.0, 1.0, 16.0),
    ParamSpec::new("rate", 8000.0, 100.0, 48000.0),
];

/// Sample-and-hold at `rate` Hz, then quantize to `2^bits` levels over [-1, 1].
#[derive(Clone, Debug)]
pub struct Bitcrush {
    acc: f64,
    held: f64,
}

impl Default for Bitcrush {
    fn default() -> Self {
        // First sample always latches.
        Self { acc: 1.0, held: 0.0 }
    }
}

impl Bitcrush {
    pub fn next(&mut self, p: &ParamSet, c: Clock) -> f64 {
        if self.acc >= 1.0 {
            self.acc -= self.acc.floor();
            let s = (TAU * c.hz(p.get(1)) * c.t).sin();
            self.held = quantize(s, p.get(2));
        }
        self.acc += f64::from(p.get(3)).min(c.sr) / c.sr;
        self.held
    }
}

pub fn quantize(x: f64, bits: f32) -> f64 {
    let bits = bits.round().clamp(1.0, 16.0) as i32;
    let steps = f64::from(2_i32.pow(bits as u32) - 1);
    let q = ((x.clamp(-1.0, 1.0) + 1.0) * 0.5 * steps).round() / steps;
    q * 2.0 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    const SR: f64 = 48_000.0;

    fn clock(n: u64) -> Clock {
        Clock { sr: SR, t: n as f64 / SR }
    }

    #[test]
    fn fm_without_modulator_is_a_sine() {
        let mut p = ParamSet::new(&FM_PARAMS);
        p.set("fm", 0.0);
        p.set("fc", 1000.0);
        assert_eq!(fm(&p, clock(0)), 0.0);
        // Quarter period of 1 kHz at 48 kHz is exactly 12 samples.
        assert!(approx_eq!(f64, fm(&p, clock(12)), 1.0, epsilon = 1e-9));
    }

    #[test]
    fn am_stays_in_unit_range() {
        let p = ParamSet::new(&AM_PARAMS);
        for n in 0..48_000 {
            assert!(am(&p, clock(n)).abs() <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn additive_is_bounded_for_every_harmonic_count() {
        let mut p = ParamSet::new(&ADDITIVE_PARAMS);
        for h in [1.0, 2.0, 8.0, 64.0] {
            p.set("harmonics", h);
            for n in (0..48_000).step_by(7) {
                assert!(additive(&p, clock(n)).abs() <= 1.0);
            }
        }
    }

    #[test]
    fn glissando_reset_restarts_the_glide() {
        let p = ParamSet::new(&GLISSANDO_PARAMS);
        let mut g = Glissando::default();
        let f_start = g.frequency(&p, clock(0));
        for n in 0..48_000 {
            g.next(&p, clock(n));
        }
        assert!(g.frequency(&p, clock(0)) > f_start);
        g.reset();
        assert_eq!(g.frequency(&p, clock(0)), f_start);
    }

    #[test]
    fn glissando_frequency_is_clamped() {
        let mut p = ParamSet::new(&GLISSANDO_PARAMS);
        p.set("k", 2.0);
        let g = Glissando { elapsed: 48_000 * 60, osc: Phasor::new() };
        assert_eq!(g.frequency(&p, clock(0)), 0.45 * SR);
        p.set("k", -2.0);
        assert_eq!(g.frequency(&p, clock(0)), 1.0);
    }

    #[test]
    fn bitcrush_one_bit_is_a_square() {
        let mut p = ParamSet::new(&BITCRUSH_PARAMS);
        p.set("bits", 1.0);
        let mut b = Bitcrush::default();
        for n in 0..4800 {
            let v = b.next(&p, clock(n));
            assert!(v == 1.0 || v == -1.0, "{v}");
        }
    }

    #[test]
    fn quantize_hits_the_rails() {
        assert_eq!(quantize(1.0, 4.0), 1.0);
        assert_eq!(quantize(-1.0, 4.0), -1.0);
        assert_eq!(quantize(5.0, 8.0), 1.0);
    }

    #[test]
    fn bitcrush_holds_each_value_for_sr_over_rate_samples() {
        let mut p = ParamSet::new(&BITCRUSH_PARAMS);
        p.set("f", 1000.0);
        p.set("bits", 16.0);
        p.set("rate", (SR / 4.0) as f32);
        let mut b = Bitcrush::default();
        let out: Vec<f64> = (0..4800).map(|n| b.next(&p, clock(n))).collect();
        for (n, v) in out.iter().enumerate() {
            assert_eq!(v.to_bits(), out[n - n % 4].to_bits(), "sample {n} left its hold");
        }
        let latches = out.chunks(4).collect::<Vec<_>>();
        assert!(latches.windows(2).filter(|w| w[0][0] != w[1][0]).count() > 1000);
    }

    #[test]
    fn quasi_replays_exactly_after_reset() {
        let p = ParamSet::new(&QUASI_PARAMS);
        let mut q = Quasi::default();
        let first: Vec<u64> = (0..4096).map(|n| q.next(&p, clock(n)).to_bits()).collect();
        for n in 4096..20_000 {
            q.next(&p, clock(n));
        }
        q.reset();
        let again: Vec<u64> = (0..4096).map(|n| q.next(&p, clock(n)).to_bits()).collect();
        assert_eq!(first, again);
    }
}
