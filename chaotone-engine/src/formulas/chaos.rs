//! Chaotic maps and flows driving a sine carrier.
//!
//! - `logistic` : discrete map stepped at control rate, sets pitch
//! - `lorenz`   : Euler-integrated Lorenz flow, `x` sets pitch, `z` sets level
//! - `rossler`  : Euler-integrated Rössler flow at a 100x rate multiplier
//!
//! Integration is plain forward Euler in f64. A flow that leaves the finite
//! range is put back on its initial condition.

use super::Clock;
use crate::nodes::Phasor;
use crate::params::{ParamSet, ParamSpec, GAIN};

// ---- logistic -------------------------------------------------------------

pub const LOGISTIC_X0: f64 = 0.4;

pub static LOGISTIC_PARAMS: [ParamSpec; 5] = [
    GAIN,
    ParamSpec::new("r", 3.9, 0.0, 4.0),
    ParamSpec::new("lfo_hz", 8.0, 0.1, 1000.0),
    ParamSpec::new("base", 330.0, 20.0, 4000.0),
    ParamSpec::new("depth", 220.0, 0.0, 2000.0),
];

/// One step of `x ← r·x·(1−x)`, kept inside `[0, 1]`.
#[inline]
pub fn logistic_step(x: f64, r: f64) -> f64 {
    let y = r * x * (1.0 - x);
    if y.is_finite() { y.clamp(0.0, 1.0) } else { LOGISTIC_X0 }
}

#[derive(Clone, Debug)]
pub struct Logistic {
    x: f64,
    counter: u64,
    osc: Phasor,
}

impl Default for Logistic {
    fn default() -> Self {
        Self { x: LOGISTIC_X0, counter: 0, osc: Phasor::new() }
    }
}

impl Logistic {
    pub fn value(&self) -> f64 {
        self.x
    }

    pub fn next(&mut self, p: &ParamSet, c: Clock) -> f64 {
        let period = ((c.sr / f64::from(p.get(2))).floor() as u64).max(1);
        self.counter += 1;
        if self.counter >= period {
            self.counter = 0;
            self.x = logistic_step(self.x, f64::from(p.get(1)));
        }
        let f = f64::from(p.get(3)) + f64::from(p.get(4)) * (self.x - 0.5);
        self.osc.sine(c.hz_f64(f), c.sr)
    }
}

// ---- lorenz ---------------------------------------------------------------

pub const LORENZ_INIT: [f64; 3] = [0.1, 0.0, 0.0];

pub static LORENZ_PARAMS: [ParamSpec; 7] = [
    GAIN,
    ParamSpec::new("sigma", 10.0, 0.0, 50.0),
    ParamSpec::new("rho", 28.0, 0.0, 100.0),
    ParamSpec::new("beta", 2.6667, 0.0, 10.0),
    ParamSpec::new("speed", 1.0, 0.01, 20.0),
    ParamSpec::new("base", 220.0, 20.0, 2000.0),
    ParamSpec::new("spread", 110.0, 0.0, 2000.0),
];

#[derive(Clone, Debug)]
pub struct Lorenz {
    xyz: [f64; 3],
    osc: Phasor,
}

impl Default for Lorenz {
    fn default() -> Self {
        Self { xyz: LORENZ_INIT, osc: Phasor::new() }
    }
}

impl Lorenz {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn coords(&self) -> [f64; 3] {
        self.xyz
    }

    pub fn next(&mut self, p: &ParamSet, c: Clock) -> f64 {
        let sigma = f64::from(p.get(1));
        let rho = f64::from(p.get(2));
        let beta = f64::from(p.get(3));
        let dt = f64::from(p.get(4)) / c.sr;

        let [x, y, z] = self.xyz;
        let next = [
            x + sigma * (y - x) * dt,
            y + (x * (rho - z) - y) * dt,
            z + (x * y - beta * z) * dt,
        ];
        self.xyz = if next.iter().all(|v| v.is_finite()) { next } else { LORENZ_INIT };

        let [x, _, z] = self.xyz;
        let f = f64::from(p.get(5)) + f64::from(p.get(6)) * x / 20.0;
        let amp = 0.5 * (1.0 + ((z - 25.0) / 10.0).tanh());
        amp * self.osc.sine(c.hz_f64(f), c.sr)
    }
}

// ---- rossler --------------------------------------------------------------

pub const ROSSLER_INIT: [f64; 3] = [0.1, 0.0, 0.0];
const ROSSLER_RATE: f64 = 100.0;
const ROSSLER_BOUND: f64 = 50.0;

pub static ROSSLER_PARAMS: [ParamSpec; 6] = [
    GAIN,
    ParamSpec::new("a", 0.2, 0.0, 1.0),
    ParamSpec::new("b", 0.2, 0.0, 2.0),
    ParamSpec::new("c", 5.7, 1.0, 20.0),
    ParamSpec::new("base", 220.0, 20.0, 2000.0),
    ParamSpec::new("spread", 110.0, 0.0, 2000.0),
];

#[derive(Clone, Debug)]
pub struct Rossler {
    xyz: [f64; 3],
    osc: Phasor,
}

impl Default for Rossler {
    fn default() -> Self {
        Self { xyz: ROSSLER_INIT, osc: Phasor::new() }
    }
}

impl Rossler {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn coords(&self) -> [f64; 3] {
        self.xyz
    }

    pub fn next(&mut self, p: &ParamSet, c: Clock) -> f64 {
        let a = f64::from(p.get(1));
        let b = f64::from(p.get(2));
        let cc = f64::from(p.get(3));
        let dt = ROSSLER_RATE / c.sr;

        let [x, y, z] = self.xyz;
        let next = [
            x + (-y - z) * dt,
            y + (x + a * y) * dt,
            z + (b + z * (x - cc)) * dt,
        ];
        self.xyz = if next.iter().all(|v| v.is_finite()) {
            next.map(|v| v.clamp(-ROSSLER_BOUND, ROSSLER_BOUND))
        } else {
            ROSSLER_INIT
        };

        let [x, y, _] = self.xyz;
        let f = f64::from(p.get(4)) + f64::from(p.get(5)) * x / 10.0;
        let amp = (0.5 + y / 20.0).clamp(0.0, 1.0);
        amp * self.osc.sine(c.hz_f64(f), c.sr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn logistic_converges_below_the_bifurcation() {
        let mut x = LOGISTIC_X0;
        for _ in 0..5_000 {
            x = logistic_step(x, 2.5);
        }
        // Fixed point 1 - 1/r.
        assert!(approx_eq!(f64, x, 0.6, epsilon = 1e-9));
    }

    #[test]
    fn logistic_is_aperiodic_in_the_chaotic_regime() {
        let mut seen = Vec::with_capacity(10_000);
        let mut x = LOGISTIC_X0;
        for _ in 0..10_000 {
            x = logistic_step(x, 3.9);
            seen.push(x.to_bits());
        }
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 10_000);
    }

    #[test]
    fn logistic_period_floor_is_one_sample() {
        let mut p = ParamSet::new(&LOGISTIC_PARAMS);
        p.set("lfo_hz", 1000.0);
        let mut l = Logistic::default();
        // sr below lfo_hz: the map steps every sample.
        let c = Clock { sr: 500.0, t: 0.0 };
        l.next(&p, c);
        assert_ne!(l.value(), LOGISTIC_X0);
    }

    #[test]
    fn flows_stay_finite_with_extreme_parameters() {
        let mut lp = ParamSet::new(&LORENZ_PARAMS);
        lp.set("rho", 100.0);
        lp.set("speed", 20.0);
        let mut rp = ParamSet::new(&ROSSLER_PARAMS);
        rp.set("c", 20.0);
        rp.set("b", 2.0);
        let mut lorenz = Lorenz::default();
        let mut rossler = Rossler::default();
        for n in 0..44_100 {
            let c = Clock { sr: 8000.0, t: n as f64 / 8000.0 };
            assert!(lorenz.next(&lp, c).is_finite());
            assert!(rossler.next(&rp, c).is_finite());
            assert!(rossler.coords().iter().all(|v| v.abs() <= ROSSLER_BOUND));
        }
    }

    #[test]
    fn reset_restores_initial_conditions_exactly() {
        let p = ParamSet::new(&LORENZ_PARAMS);
        let mut l = Lorenz::default();
        for n in 0..1000 {
            l.next(&p, Clock { sr: 44_100.0, t: n as f64 / 44_100.0 });
        }
        assert_ne!(l.coords(), LORENZ_INIT);
        l.reset();
        assert_eq!(l.coords().map(f64::to_bits), [0.1f64, 0.0, 0.0].map(f64::to_bits));
    }
}
