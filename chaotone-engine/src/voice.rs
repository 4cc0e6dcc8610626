//! One running generator instance.

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::error::{Error, Result};
use crate::formulas::{Clock, FormulaId, FormulaState};
use crate::params::{Assign, ParamSet};

/// A formula with its live parameters, state and private clock.
///
/// The clock counts samples since creation, so `t` is exact no matter how long
/// the session runs. Disabling a voice only gates it at the mix bus: the
/// mixer keeps ticking it so a re-enabled voice continues where it would be.
#[derive(Clone, Debug)]
pub struct Voice {
    id: FormulaId,
    params: ParamSet,
    state: FormulaState,
    enabled: bool,
    sr: f64,
    n: u64,
    seed: u64,
    faulted: bool,
}

impl Voice {
    pub fn new(id: FormulaId, sr: f32, seed: u64) -> Self {
        let params = ParamSet::new(id.params());
        Self::with_params(id, params, sr, seed)
    }

    fn with_params(id: FormulaId, params: ParamSet, sr: f32, seed: u64) -> Self {
        let sr = f64::from(sr.max(1.0));
        let state = FormulaState::new(id, &params, sr, SmallRng::seed_from_u64(seed));
        Self { id, params, state, enabled: false, sr, n: 0, seed, faulted: false }
    }

    #[inline] pub fn id(&self) -> FormulaId { self.id }
    #[inline] pub fn params(&self) -> &ParamSet { &self.params }
    #[inline] pub fn state(&self) -> &FormulaState { &self.state }
    #[inline] pub fn is_enabled(&self) -> bool { self.enabled }
    #[inline] pub fn set_enabled(&mut self, on: bool) { self.enabled = on; }
    #[inline] pub fn gain(&self) -> f32 { self.params.get(0) }
    #[inline] pub fn elapsed(&self) -> f64 { self.n as f64 / self.sr }

    /// Merge one value into the parameter set. Returns whether anything changed.
    pub fn set_param(&mut self, key: &str, value: f32) -> Result<bool> {
        match self.params.set(key, value) {
            Assign::Unknown => Err(Error::UnknownParam { target: self.id.to_string(), key: key.to_owned() }),
            a => Ok(a.changed().is_some()),
        }
    }

    /// Restart the formula from its initial condition. Parameters are kept.
    pub fn reset(&mut self) -> Result<()> {
        if self.state.reset(&self.params, self.sr) {
            self.faulted = false;
            Ok(())
        } else {
            Err(Error::NotResettable(self.id.to_string()))
        }
    }

    /// Rebuild state for a new sample rate, keeping parameters and the enable flag.
    pub fn set_sample_rate(&mut self, sr: f32) {
        let enabled = self.enabled;
        *self = Self::with_params(self.id, self.params.clone(), sr, self.seed);
        self.enabled = enabled;
    }

    /// Next raw sample (before `gain`). Non-finite output is replaced by 0.0 and
    /// flagged for [`Voice::take_fault`].
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let c = Clock { sr: self.sr, t: self.n as f64 / self.sr };
        self.n += 1;
        let v = self.state.tick(&self.params, c) as f32;
        if v.is_finite() {
            v
        } else {
            self.faulted = true;
            0.0
        }
    }

    /// Fill `out` with raw samples.
    pub fn render(&mut self, out: &mut [f32]) {
        for s in out.iter_mut() {
            *s = self.next_sample();
        }
    }

    /// Clear and return the fault flag.
    #[inline]
    pub fn take_fault(&mut self) -> bool {
        core::mem::take(&mut self.faulted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulas::FormulaState;

    #[test]
    fn unknown_param_is_a_typed_error() {
        let mut v = Voice::new(FormulaId::Fm, 48_000.0, 0);
        match v.set_param("cutoff", 1.0) {
            Err(Error::UnknownParam { target, key }) => {
                assert_eq!(target, "fm");
                assert_eq!(key, "cutoff");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reset_of_stateless_kind_is_rejected() {
        let mut v = Voice::new(FormulaId::Beats, 48_000.0, 0);
        assert!(matches!(v.reset(), Err(Error::NotResettable(_))));
    }

    #[test]
    fn lorenz_and_rossler_reset_bit_exact() {
        for id in [FormulaId::Lorenz, FormulaId::Rossler] {
            let mut v = Voice::new(id, 44_100.0, 0);
            let mut buf = vec![0.0; 4096];
            v.render(&mut buf);
            v.reset().unwrap();
            let xyz = match v.state() {
                FormulaState::Lorenz(s) => s.coords(),
                FormulaState::Rossler(s) => s.coords(),
                _ => unreachable!(),
            };
            assert_eq!(xyz.map(f64::to_bits), [0.1f64, 0.0, 0.0].map(f64::to_bits));
        }
    }

    #[test]
    fn identical_updates_leave_output_bit_identical() {
        let mut a = Voice::new(FormulaId::Quasi, 44_100.0, 3);
        let mut b = Voice::new(FormulaId::Quasi, 44_100.0, 3);
        a.set_param("base", 300.0).unwrap();
        b.set_param("base", 300.0).unwrap();
        assert!(!b.set_param("base", 300.0).unwrap());
        let (mut x, mut y) = (vec![0.0; 2048], vec![0.0; 2048]);
        a.render(&mut x);
        b.render(&mut y);
        assert_eq!(
            x.iter().map(|s| s.to_bits()).collect::<Vec<_>>(),
            y.iter().map(|s| s.to_bits()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn sample_rate_change_keeps_params() {
        let mut v = Voice::new(FormulaId::Karplus, 44_100.0, 0);
        v.set_enabled(true);
        v.set_param("freq", 440.0).unwrap();
        v.set_sample_rate(96_000.0);
        assert_eq!(v.params().value_of("freq"), Some(440.0));
        assert!(v.is_enabled());
        assert_eq!(v.elapsed(), 0.0);
    }

    #[test]
    fn karplus_reset_plucks_a_decaying_note() {
        let mut v = Voice::new(FormulaId::Karplus, 44_100.0, 5);
        let mut buf = vec![0.0; 44_100];
        v.render(&mut buf);
        v.set_param("ks_damp", 0.995).unwrap();
        v.reset().unwrap();

        let win = 4410;
        let mut buf = vec![0.0; win];
        let mut rms = Vec::new();
        for _ in 0..10 {
            v.render(&mut buf);
            rms.push((buf.iter().map(|s| s * s).sum::<f32>() / win as f32).sqrt());
        }
        // Fresh noise right after the pluck.
        assert!(rms[0] > 0.1);
        for pair in rms[1..].windows(2) {
            assert!(pair[1] <= pair[0], "{rms:?}");
        }
    }
}
