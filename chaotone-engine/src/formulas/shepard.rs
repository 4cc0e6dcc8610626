//! Shepard-Risset glissando.
//!
//! Octave-spaced partials under a fixed Gaussian loudness envelope (centred on
//! 440 Hz, 1.5 octaves wide) drift by `speed` octaves per second. When the drift
//! position wraps, the phase bank is rotated by one slot so every partial keeps
//! its own running phase and the tone never clicks.

use core::f64::consts::TAU;

use super::Clock;
use crate::params::{ParamSet, ParamSpec, GAIN};

pub const MAX_OCTAVES: usize = 10;
const CENTER_HZ: f64 = 440.0;
const SIGMA_OCT: f64 = 1.5;
const CEILING_HZ: f64 = 20_000.0;

pub static SHEPARD_PARAMS: [ParamSpec; 4] = [
    GAIN,
    ParamSpec::new("base", 27.5, 10.0, 200.0),
    ParamSpec::new("speed", 0.05, -2.0, 2.0),
    ParamSpec::new("octaves", 10.0, 1.0, MAX_OCTAVES as f32),
];

#[inline]
pub fn weight(f: f64) -> f64 {
    let oct = (f / CENTER_HZ).log2();
    (-(oct * oct) / (2.0 * SIGMA_OCT * SIGMA_OCT)).exp()
}

#[derive(Clone, Debug, Default)]
pub struct Shepard {
    phases: [f64; MAX_OCTAVES],
    pos: f64,
}

impl Shepard {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn position(&self) -> f64 {
        self.pos
    }

    pub fn next(&mut self, p: &ParamSet, c: Clock) -> f64 {
        let base = f64::from(p.get(1));
        let speed = f64::from(p.get(2));
        let octaves = (p.get(3).round() as usize).clamp(1, MAX_OCTAVES);
        let ceiling = c.max_hz().min(CEILING_HZ);

        let mut sum = 0.0;
        for (i, ph) in self.phases.iter_mut().enumerate().take(octaves) {
            let f = base * (i as f64 + self.pos).exp2();
            if f > ceiling {
                continue;
            }
            sum += weight(f) * (TAU * *ph).sin();
            let next = *ph + f / c.sr;
            *ph = next - next.floor();
        }

        self.pos += speed / c.sr;
        if self.pos >= 1.0 {
            self.pos -= 1.0;
            self.phases.rotate_left(1);
            self.phases[MAX_OCTAVES - 1] = 0.0;
        } else if self.pos < 0.0 {
            self.pos += 1.0;
            self.phases.rotate_right(1);
            self.phases[0] = 0.0;
        }

        sum / ((2.0 * core::f64::consts::PI).sqrt() * SIGMA_OCT)
    }
}
