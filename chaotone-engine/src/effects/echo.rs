//! Feedback delay.

use super::delay_line::DelayLine;
use super::{blend, Stage};
use crate::params::{Assign, ParamSet, ParamSpec};

pub const MAX_SECONDS: f32 = 2.0;

pub static DELAY_PARAMS: [ParamSpec; 3] = [
    ParamSpec::new("time", 0.35, 0.01, MAX_SECONDS),
    ParamSpec::new("feedback", 0.35, 0.0, 0.9),
    ParamSpec::new("mix", 0.3, 0.0, 1.0),
];

const TIME: usize = 0;
const FEEDBACK: usize = 1;
const MIX: usize = 2;

/// Feedback echo on a single tap. The buffer always holds the 2 s maximum.
#[derive(Clone, Debug)]
pub struct Echo {
    params: ParamSet,
    line: DelayLine,
    delay: usize,
    sr: f32,
}

impl Echo {
    pub fn new(sr: f32) -> Self {
        let mut e = Self {
            params: ParamSet::new(&DELAY_PARAMS),
            line: DelayLine::with_max_seconds(MAX_SECONDS, sr),
            delay: 1,
            sr,
        };
        e.update_delay();
        e
    }

    fn update_delay(&mut self) {
        let n = (self.params.get(TIME) * self.sr).round() as usize;
        self.delay = n.clamp(1, self.line.max_delay());
    }

    #[inline]
    pub fn delay_samples(&self) -> usize {
        self.delay
    }
}

impl Stage for Echo {
    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn set_param(&mut self, key: &str, value: f32) -> Assign {
        let a = self.params.set(key, value);
        if a.changed() == Some(TIME) {
            self.update_delay();
        }
        a
    }

    fn set_sample_rate(&mut self, sr: f32) {
        self.sr = sr;
        self.line = DelayLine::with_max_seconds(MAX_SECONDS, sr);
        self.update_delay();
    }

    fn clear(&mut self) {
        self.line.clear();
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        let wet = self.line.read(self.delay);
        self.line.write(x + self.params.get(FEEDBACK) * wet);
        blend(x, wet, self.params.get(MIX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn echo_lands_on_the_delay_time() {
        let mut e = Echo::new(48_000.0);
        e.set_param("time", 0.1);
        e.set_param("feedback", 0.5);
        e.set_param("mix", 1.0);
        let out: Vec<f32> = (0..10_000).map(|n| e.process(if n == 0 { 1.0 } else { 0.0 })).collect();
        assert_eq!(out[0], 0.0);
        assert_eq!(out[4800], 1.0);
        assert!(approx_eq!(f32, out[9600], 0.5, epsilon = 1e-6));
        let stray = out.iter().enumerate().filter(|&(i, &s)| s != 0.0 && i != 4800 && i != 9600).count();
        assert_eq!(stray, 0);
    }

    #[test]
    fn maximum_time_fits_the_buffer() {
        let mut e = Echo::new(44_100.0);
        e.set_param("time", 10.0);
        assert_eq!(e.delay_samples(), 88_200);
    }
}
