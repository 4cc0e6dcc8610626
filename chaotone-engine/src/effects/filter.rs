//! State-variable filter stage: lowpass, highpass or bandpass by `kind`.

use chaotone_core::dsp::max_freq;
use chaotone_core::filters::{SvfMode, SvfTpt};

use super::Stage;
use crate::params::{Assign, ParamSet, ParamSpec};

pub static FILTER_PARAMS: [ParamSpec; 3] = [
    ParamSpec::new("kind", 0.0, 0.0, 2.0),
    ParamSpec::new("cutoff", 1200.0, 20.0, 20000.0),
    ParamSpec::new("q", 0.707, 0.1, 20.0),
];

const KIND: usize = 0;
const CUTOFF: usize = 1;
const Q: usize = 2;

/// `kind` parameter → SVF output tap.
pub fn mode_of(kind: f32) -> SvfMode {
    match kind.round() as i32 {
        1 => SvfMode::Highpass,
        2 => SvfMode::Bandpass,
        _ => SvfMode::Lowpass,
    }
}

/// State-variable filter stage (full-signal, no dry path).
#[derive(Clone, Debug)]
pub struct Filter {
    params: ParamSet,
    svf: SvfTpt,
    mode: SvfMode,
    sr: f32,
}

impl Filter {
    pub fn new(sr: f32) -> Self {
        let params = ParamSet::new(&FILTER_PARAMS);
        let mut f = Self {
            svf: SvfTpt::new(params.get(CUTOFF), params.get(Q), sr),
            mode: mode_of(params.get(KIND)),
            params,
            sr,
        };
        f.update();
        f
    }

    fn update(&mut self) {
        self.mode = mode_of(self.params.get(KIND));
        self.svf.set_cutoff_hz(self.params.get(CUTOFF).min(max_freq(self.sr)));
        self.svf.set_q(self.params.get(Q));
    }
}

impl Stage for Filter {
    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn set_param(&mut self, key: &str, value: f32) -> Assign {
        let a = self.params.set(key, value);
        if a.changed().is_some() {
            self.update();
        }
        a
    }

    fn set_sample_rate(&mut self, sr: f32) {
        self.sr = sr;
        self.svf.set_sample_rate(sr);
        self.update();
        self.svf.reset();
    }

    fn clear(&mut self) {
        self.svf.reset();
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        self.svf.process(x, self.mode)
    }
}
