//! Chorus and flanger on one modulated delay line; `mode` selects the timing.

use super::delay_line::DelayLine;
use super::{blend, Stage};
use crate::nodes::Lfo;
use crate::params::{Assign, ParamSet, ParamSpec};

pub static CHORUS_PARAMS: [ParamSpec; 5] = [
    ParamSpec::new("mode", 0.0, 0.0, 1.0),
    ParamSpec::new("rate", 0.8, 0.01, 10.0),
    ParamSpec::new("depth", 0.5, 0.0, 1.0),
    ParamSpec::new("feedback", 0.2, 0.0, 0.95),
    ParamSpec::new("mix", 0.4, 0.0, 1.0),
];

const MODE: usize = 0;
const RATE: usize = 1;
const DEPTH: usize = 2;
const FEEDBACK: usize = 3;
const MIX: usize = 4;

/// (base delay, modulation span) in milliseconds.
const CHORUS_MS: (f32, f32) = (20.0, 8.0);
const FLANGER_MS: (f32, f32) = (3.0, 2.5);
const MAX_MS: f32 = 30.0;

/// Chorus / flanger: one fractional delay tap swept by a sine LFO.
#[derive(Clone, Debug)]
pub struct Chorus {
    params: ParamSet,
    line: DelayLine,
    lfo: Lfo,
    sr: f32,
}

impl Chorus {
    pub fn new(sr: f32) -> Self {
        let params = ParamSet::new(&CHORUS_PARAMS);
        Self {
            line: DelayLine::with_max_seconds(MAX_MS * 0.001, sr),
            lfo: Lfo::sine(params.get(RATE)),
            params,
            sr,
        }
    }

    #[inline]
    fn timing(&self) -> (f32, f32) {
        if self.params.get(MODE) >= 0.5 { FLANGER_MS } else { CHORUS_MS }
    }
}

impl Stage for Chorus {
    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn set_param(&mut self, key: &str, value: f32) -> Assign {
        let a = self.params.set(key, value);
        if a.changed() == Some(RATE) {
            self.lfo.set_rate(self.params.get(RATE));
        }
        a
    }

    fn set_sample_rate(&mut self, sr: f32) {
        self.sr = sr;
        self.line = DelayLine::with_max_seconds(MAX_MS * 0.001, sr);
    }

    fn clear(&mut self) {
        self.line.clear();
        self.lfo.reset();
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        let (base, span) = self.timing();
        let ms = base + span * self.params.get(DEPTH) * self.lfo.next_norm(self.sr);
        let wet = self.line.read_frac(ms * 0.001 * self.sr);
        self.line.write(x + self.params.get(FEEDBACK) * wet);
        blend(x, wet, self.params.get(MIX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use more_asserts::assert_le;

    #[test]
    fn impulse_response_stays_bounded_at_maximum_feedback() {
        for mode in [0.0, 1.0] {
            let mut c = Chorus::new(44_100.0);
            c.set_param("mode", mode);
            c.set_param("feedback", 1.0);
            c.set_param("depth", 1.0);
            c.set_param("rate", 10.0);
            let mut peak = 0.0f32;
            for n in 0..44_100 {
                let y = c.process(if n == 0 { 1.0 } else { 0.0 });
                assert!(y.is_finite());
                peak = peak.max(y.abs());
            }
            assert_le!(peak, 1.0);
        }
    }

    #[test]
    fn dry_only_when_mix_is_zero() {
        let mut c = Chorus::new(48_000.0);
        c.set_param("mix", 0.0);
        for n in 0..1000 {
            let x = (n as f32 * 0.01).sin();
            assert_eq!(c.process(x), x);
        }
    }
}
