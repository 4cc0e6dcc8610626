//! Karplus-Strong plucked string.
//!
//! The delay buffer is allocated once for the lowest pitch the parameter range
//! allows. A pitch change re-plucks the string in place over the new length.

use rand::rngs::SmallRng;
use rand::Rng;

use super::Clock;
use crate::params::{ParamSet, ParamSpec, GAIN};

const MIN_FREQ: f32 = 20.0;

pub static KARPLUS_PARAMS: [ParamSpec; 4] = [
    GAIN,
    ParamSpec::new("freq", 110.0, MIN_FREQ, 2000.0),
    ParamSpec::new("ks_damp", 0.996, 0.8, 0.99999),
    ParamSpec::new("brightness", 0.5, 0.0, 1.0),
];

#[derive(Clone, Debug)]
pub struct Karplus {
    buf: Vec<f32>,
    len: usize,
    idx: usize,
    rng: SmallRng,
}

impl Karplus {
    pub fn new(p: &ParamSet, sr: f64, rng: SmallRng) -> Self {
        let cap = (sr / f64::from(MIN_FREQ)).ceil() as usize + 2;
        let mut ks = Self { buf: vec![0.0; cap], len: 0, idx: 0, rng };
        ks.pluck(ks.target_len(p, sr));
        ks
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    fn target_len(&self, p: &ParamSet, sr: f64) -> usize {
        let n = (sr / f64::from(p.get(1))).round() as usize;
        n.clamp(2, self.buf.len())
    }

    fn pluck(&mut self, len: usize) {
        self.len = len;
        self.idx = 0;
        for s in &mut self.buf[..len] {
            *s = self.rng.gen_range(-1.0f32..1.0);
        }
    }

    pub fn reset(&mut self, p: &ParamSet, sr: f64) {
        let len = self.target_len(p, sr);
        self.pluck(len);
    }

    pub fn next(&mut self, p: &ParamSet, c: Clock) -> f64 {
        let want = self.target_len(p, c.sr);
        if want != self.len {
            self.pluck(want);
        }
        let damp = p.get(2);
        let bright = p.get(3);
        let i = self.idx;
        let j = if i + 1 == self.len { 0 } else { i + 1 };
        let cur = self.buf[i];
        let nxt = self.buf[j];
        self.buf[i] = damp * (bright * cur + (1.0 - bright) * 0.5 * (cur + nxt));
        self.idx = j;
        f64::from(cur)
    }
}
