//! Peak limiter at the end of the chain.

use chaotone_core::dsp::{db_to_lin, lin_to_db};
use chaotone_core::envelopes::PeakFollower;

use super::Stage;
use crate::params::{Assign, ParamSet, ParamSpec};

pub static LIMITER_PARAMS: [ParamSpec; 2] = [
    ParamSpec::new("threshold", -3.0, -40.0, 0.0),
    ParamSpec::new("release", 0.1, 0.01, 2.0),
];

const THRESHOLD: usize = 0;
const RELEASE: usize = 1;

pub const RATIO: f32 = 20.0;
pub const ATTACK_MS: f32 = 3.0;

/// Hard-knee peak limiter with a fixed 20:1 ratio and 3 ms attack.
#[derive(Clone, Debug)]
pub struct Limiter {
    params: ParamSet,
    env: PeakFollower,
}

impl Limiter {
    pub fn new(sr: f32) -> Self {
        let params = ParamSet::new(&LIMITER_PARAMS);
        Self { env: PeakFollower::new(ATTACK_MS, params.get(RELEASE) * 1000.0, sr), params }
    }

    /// Gain reduction in dB for a detector level in dB.
    #[inline]
    pub fn reduction_db(level_db: f32, threshold_db: f32) -> f32 {
        let over = level_db - threshold_db;
        if over > 0.0 { over * (1.0 - 1.0 / RATIO) } else { 0.0 }
    }
}

impl Stage for Limiter {
    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn set_param(&mut self, key: &str, value: f32) -> Assign {
        let a = self.params.set(key, value);
        if a.changed() == Some(RELEASE) {
            self.env.set_release_ms(self.params.get(RELEASE) * 1000.0);
        }
        a
    }

    fn set_sample_rate(&mut self, sr: f32) {
        self.env.set_sample_rate(sr);
        self.env.reset();
    }

    fn clear(&mut self) {
        self.env.reset();
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        let level = lin_to_db(self.env.process(x));
        x * db_to_lin(-Self::reduction_db(level, self.params.get(THRESHOLD)))
    }
}
