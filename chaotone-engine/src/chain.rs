//! Effects routing.
//!
//! The six stages always run in one canonical order. What varies is only which
//! of them are enabled, kept as a [`StageSet`] bitset; the active [`Route`] is a
//! pure function of that set. Bypassed stages are not processed at all, so
//! their state is frozen and they add no latency.

use strum_macros::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

use crate::effects::{chorus, echo, filter, limiter, phaser, reverb};
use crate::effects::{Chorus, Echo, Filter, Limiter, Phaser, Reverb, Stage};
use crate::params::{Assign, ParamSet, ParamSpec};

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    EnumString, Display, EnumIter, EnumCount, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum StageKind {
    Filter,
    Chorus,
    Phaser,
    Delay,
    Reverb,
    Limiter,
}

impl StageKind {
    pub const CANONICAL: [StageKind; 6] = [
        StageKind::Filter,
        StageKind::Chorus,
        StageKind::Phaser,
        StageKind::Delay,
        StageKind::Reverb,
        StageKind::Limiter,
    ];

    #[inline]
    fn bit(self) -> u8 {
        1 << (self as u8)
    }

    #[inline]
    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn params(self) -> &'static [ParamSpec] {
        match self {
            StageKind::Filter => &filter::FILTER_PARAMS,
            StageKind::Chorus => &chorus::CHORUS_PARAMS,
            StageKind::Phaser => &phaser::PHASER_PARAMS,
            StageKind::Delay => &echo::DELAY_PARAMS,
            StageKind::Reverb => &reverb::REVERB_PARAMS,
            StageKind::Limiter => &limiter::LIMITER_PARAMS,
        }
    }
}

/// Set of enabled stages.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StageSet(u8);

impl StageSet {
    pub const EMPTY: StageSet = StageSet(0);

    #[inline] pub fn contains(self, k: StageKind) -> bool { self.0 & k.bit() != 0 }
    #[inline] pub fn insert(&mut self, k: StageKind) { self.0 |= k.bit(); }
    #[inline] pub fn remove(&mut self, k: StageKind) { self.0 &= !k.bit(); }
    #[inline] pub fn is_empty(self) -> bool { self.0 == 0 }

    #[inline]
    pub fn with(mut self, k: StageKind, on: bool) -> Self {
        if on { self.insert(k) } else { self.remove(k) }
        self
    }

    pub fn iter(self) -> impl Iterator<Item = StageKind> {
        StageKind::CANONICAL.into_iter().filter(move |k| self.contains(*k))
    }
}

impl FromIterator<StageKind> for StageSet {
    fn from_iter<I: IntoIterator<Item = StageKind>>(iter: I) -> Self {
        let mut s = StageSet::EMPTY;
        for k in iter {
            s.insert(k);
        }
        s
    }
}

/// Enabled stages in processing order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Route {
    kinds: [StageKind; 6],
    len: usize,
}

impl Route {
    #[inline]
    pub fn as_slice(&self) -> &[StageKind] {
        &self.kinds[..self.len]
    }
}

/// The canonical order filtered by `set`.
pub fn route(set: StageSet) -> Route {
    let mut kinds = [StageKind::Filter; 6];
    let mut len = 0;
    for k in set.iter() {
        kinds[len] = k;
        len += 1;
    }
    Route { kinds, len }
}

/// One instance of every stage plus the enabled set and its route.
#[derive(Debug)]
pub struct EffectsChain {
    filter: Filter,
    chorus: Chorus,
    phaser: Phaser,
    delay: Echo,
    reverb: Reverb,
    limiter: Limiter,
    enabled: StageSet,
    route: Route,
}

impl EffectsChain {
    pub fn new(sr: f32, seed: u64) -> Self {
        Self {
            filter: Filter::new(sr),
            chorus: Chorus::new(sr),
            phaser: Phaser::new(sr),
            delay: Echo::new(sr),
            reverb: Reverb::new(sr, seed),
            limiter: Limiter::new(sr),
            enabled: StageSet::EMPTY,
            route: route(StageSet::EMPTY),
        }
    }

    #[inline] pub fn enabled(&self) -> StageSet { self.enabled }
    #[inline] pub fn is_enabled(&self, k: StageKind) -> bool { self.enabled.contains(k) }
    #[inline] pub fn route(&self) -> &[StageKind] { self.route.as_slice() }

    pub fn stage(&self, k: StageKind) -> &dyn Stage {
        match k {
            StageKind::Filter => &self.filter,
            StageKind::Chorus => &self.chorus,
            StageKind::Phaser => &self.phaser,
            StageKind::Delay => &self.delay,
            StageKind::Reverb => &self.reverb,
            StageKind::Limiter => &self.limiter,
        }
    }

    pub fn stage_mut(&mut self, k: StageKind) -> &mut dyn Stage {
        match k {
            StageKind::Filter => &mut self.filter,
            StageKind::Chorus => &mut self.chorus,
            StageKind::Phaser => &mut self.phaser,
            StageKind::Delay => &mut self.delay,
            StageKind::Reverb => &mut self.reverb,
            StageKind::Limiter => &mut self.limiter,
        }
    }

    pub fn reverb(&self) -> &Reverb {
        &self.reverb
    }

    pub fn reverb_mut(&mut self) -> &mut Reverb {
        &mut self.reverb
    }

    #[inline]
    pub fn params(&self, k: StageKind) -> &ParamSet {
        self.stage(k).params()
    }

    #[inline]
    pub fn set_param(&mut self, k: StageKind, key: &str, value: f32) -> Assign {
        self.stage_mut(k).set_param(key, value)
    }

    /// Toggle one stage. Returns `false` when the set did not change (no rebuild).
    pub fn set_enabled(&mut self, k: StageKind, on: bool) -> bool {
        self.rebuild(self.enabled.with(k, on))
    }

    /// Replace the whole enabled set. Returns `false` when it did not change.
    pub fn rebuild(&mut self, set: StageSet) -> bool {
        if set == self.enabled {
            return false;
        }
        self.enabled = set;
        self.route = route(set);
        true
    }

    pub fn set_sample_rate(&mut self, sr: f32) {
        for k in StageKind::CANONICAL {
            self.stage_mut(k).set_sample_rate(sr);
        }
    }

    pub fn clear(&mut self) {
        for k in StageKind::CANONICAL {
            self.stage_mut(k).clear();
        }
    }

    #[inline]
    pub fn process(&mut self, mut x: f32) -> f32 {
        for i in 0..self.route.len {
            x = match self.route.kinds[i] {
                StageKind::Filter => self.filter.process(x),
                StageKind::Chorus => self.chorus.process(x),
                StageKind::Phaser => self.phaser.process(x),
                StageKind::Delay => self.delay.process(x),
                StageKind::Reverb => self.reverb.process(x),
                StageKind::Limiter => self.limiter.process(x),
            };
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn enable_order_does_not_change_route_order() {
        let mut chain = EffectsChain::new(8000.0, 0);
        assert!(chain.set_enabled(StageKind::Filter, true));
        assert!(chain.set_enabled(StageKind::Reverb, true));
        assert!(chain.set_enabled(StageKind::Delay, true));
        assert_eq!(chain.route(), [StageKind::Filter, StageKind::Delay, StageKind::Reverb]);
        assert!(chain.set_enabled(StageKind::Filter, false));
        assert_eq!(chain.route(), [StageKind::Delay, StageKind::Reverb]);
    }

    #[test]
    fn redundant_toggle_is_a_no_op() {
        let mut chain = EffectsChain::new(8000.0, 0);
        assert!(chain.set_enabled(StageKind::Limiter, true));
        assert!(!chain.set_enabled(StageKind::Limiter, true));
        assert!(!chain.set_enabled(StageKind::Phaser, false));
    }

    #[test]
    fn every_subset_routes_as_a_canonical_subsequence() {
        for bits in 0u8..64 {
            let set = StageSet(bits);
            let r = route(set);
            let mut last = None;
            for &k in r.as_slice() {
                assert!(set.contains(k));
                assert!(last < Some(k as usize), "{k} out of order for {bits:#08b}");
                last = Some(k as usize);
            }
            assert_eq!(r.as_slice().len(), bits.count_ones() as usize);
        }
    }

    #[test]
    fn empty_route_is_a_passthrough() {
        let mut chain = EffectsChain::new(8000.0, 0);
        for x in [0.0, 0.5, -1.0, 3.0] {
            assert_eq!(chain.process(x), x);
        }
    }

    #[test]
    fn stage_names_parse() {
        for k in StageKind::CANONICAL {
            assert_eq!(StageKind::from_str(k.name()).ok(), Some(k));
        }
        assert!(StageKind::from_str("distortion").is_err());
    }

    #[test]
    fn bypassed_stage_state_is_frozen() {
        let mut chain = EffectsChain::new(48_000.0, 0);
        chain.set_param(StageKind::Delay, "mix", 1.0);
        chain.set_param(StageKind::Delay, "time", 0.01);
        chain.set_enabled(StageKind::Delay, true);
        chain.process(1.0);
        chain.set_enabled(StageKind::Delay, false);
        for _ in 0..10_000 {
            chain.process(0.0);
        }
        chain.set_enabled(StageKind::Delay, true);
        let out: Vec<f32> = (0..480).map(|_| chain.process(0.0)).collect();
        assert_eq!(out[479], 1.0);
    }
}
