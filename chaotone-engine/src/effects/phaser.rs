//! Phaser: a cascade of swept first-order all-passes with feedback.

use chaotone_core::dsp::{kill_denormals, max_freq};
use chaotone_core::filters::AllpassTpt;

use super::{blend, Stage};
use crate::nodes::Lfo;
use crate::params::{Assign, ParamSet, ParamSpec};

pub static PHASER_PARAMS: [ParamSpec; 6] = [
    ParamSpec::new("rate", 0.4, 0.01, 10.0),
    ParamSpec::new("depth", 0.7, 0.0, 1.0),
    ParamSpec::new("stages", 4.0, 2.0, 8.0),
    ParamSpec::new("freq", 700.0, 50.0, 5000.0),
    ParamSpec::new("feedback", 0.3, 0.0, 0.9),
    ParamSpec::new("mix", 0.5, 0.0, 1.0),
];

const RATE: usize = 0;
const DEPTH: usize = 1;
const STAGES: usize = 2;
const FREQ: usize = 3;
const FEEDBACK: usize = 4;
const MIX: usize = 5;

pub const ALLPASSES: usize = 8;

/// Eight first-order all-passes swept together around `freq`.
///
/// `stages` does not change the topology; it scales the sweep depth by `stages/8`.
#[derive(Clone, Debug)]
pub struct Phaser {
    params: ParamSet,
    aps: [AllpassTpt; ALLPASSES],
    lfo: Lfo,
    last: f32,
    sr: f32,
}

impl Phaser {
    pub fn new(sr: f32) -> Self {
        let params = ParamSet::new(&PHASER_PARAMS);
        Self {
            aps: [AllpassTpt::new(params.get(FREQ), sr); ALLPASSES],
            lfo: Lfo::sine(params.get(RATE)),
            params,
            last: 0.0,
            sr,
        }
    }

    #[inline]
    fn effective_depth(&self) -> f32 {
        self.params.get(DEPTH) * self.params.get(STAGES) / ALLPASSES as f32
    }
}

impl Stage for Phaser {
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
        for ap in &mut self.aps {
            ap.set_sample_rate(sr);
        }
        self.clear();
    }

    fn clear(&mut self) {
        for ap in &mut self.aps {
            ap.reset();
        }
        self.lfo.reset();
        self.last = 0.0;
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        let sweep = 2.0 * self.effective_depth() * self.lfo.next_norm(self.sr);
        let f = (self.params.get(FREQ) * sweep.exp2()).min(max_freq(self.sr));
        let mut y = x + self.params.get(FEEDBACK) * self.last;
        for ap in &mut self.aps {
            ap.set_cutoff_hz(f);
            y = ap.process(y);
        }
        self.last = kill_denormals(y);
        blend(x, y, self.params.get(MIX))
    }
}
