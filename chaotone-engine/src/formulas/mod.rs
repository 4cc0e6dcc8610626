//! The formula catalogue.
//!
//! Each of the eighteen generator algorithms has a [`FormulaId`], a static
//! [`FormulaDescriptor`] (parameter table + whether it has state worth
//! resetting) and a [`FormulaState`] variant holding whatever it must remember
//! between samples. [`FormulaState::tick`] is the single per-sample dispatch.
//!
//! Output is a nominally `[-1, 1]` sample before the formula's own `gain`,
//! which the mix bus applies.

use rand::rngs::SmallRng;
use strum_macros::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

use crate::params::{ParamSet, ParamSpec};

pub mod chaos;
pub mod noise;
pub mod shepard;
pub mod string;
pub mod tonal;

use chaos::{Logistic, Lorenz, Rossler};
use noise::{Brown, Pink, Velvet, White};
use shepard::Shepard;
use string::Karplus;
use tonal::{Bitcrush, Glissando, Pm, Quasi};

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    EnumString, Display, EnumIter, EnumCount, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum FormulaId {
    Fm,
    Beats,
    Am,
    Logistic,
    Glissando,
    Additive,
    Pm,
    Distortion,
    Quasi,
    Lorenz,
    Rossler,
    Karplus,
    Bitcrush,
    White,
    Pink,
    Brown,
    Velvet,
    Shepard,
}

#[derive(Debug)]
pub struct FormulaDescriptor {
    pub id: FormulaId,
    pub params: &'static [ParamSpec],
    pub resettable: bool,
}

impl FormulaId {
    pub fn descriptor(self) -> &'static FormulaDescriptor {
        &DESCRIPTORS[self as usize]
    }

    #[inline]
    pub fn params(self) -> &'static [ParamSpec] {
        self.descriptor().params
    }

    #[inline]
    pub fn is_resettable(self) -> bool {
        self.descriptor().resettable
    }

    #[inline]
    pub fn name(self) -> &'static str {
        self.into()
    }
}

const fn d(id: FormulaId, params: &'static [ParamSpec], resettable: bool) -> FormulaDescriptor {
    FormulaDescriptor { id, params, resettable }
}

/// Indexed by `FormulaId as usize`.
static DESCRIPTORS: [FormulaDescriptor; 18] = [
    d(FormulaId::Fm, &tonal::FM_PARAMS, false),
    d(FormulaId::Beats, &tonal::BEATS_PARAMS, false),
    d(FormulaId::Am, &tonal::AM_PARAMS, false),
    d(FormulaId::Logistic, &chaos::LOGISTIC_PARAMS, false),
    d(FormulaId::Glissando, &tonal::GLISSANDO_PARAMS, true),
    d(FormulaId::Additive, &tonal::ADDITIVE_PARAMS, false),
    d(FormulaId::Pm, &tonal::PM_PARAMS, true),
    d(FormulaId::Distortion, &tonal::DISTORTION_PARAMS, false),
    d(FormulaId::Quasi, &tonal::QUASI_PARAMS, true),
    d(FormulaId::Lorenz, &chaos::LORENZ_PARAMS, true),
    d(FormulaId::Rossler, &chaos::ROSSLER_PARAMS, true),
    d(FormulaId::Karplus, &string::KARPLUS_PARAMS, true),
    d(FormulaId::Bitcrush, &tonal::BITCRUSH_PARAMS, false),
    d(FormulaId::White, &noise::WHITE_PARAMS, false),
    d(FormulaId::Pink, &noise::PINK_PARAMS, false),
    d(FormulaId::Brown, &noise::BROWN_PARAMS, false),
    d(FormulaId::Velvet, &noise::VELVET_PARAMS, false),
    d(FormulaId::Shepard, &shepard::SHEPARD_PARAMS, true),
];

/// Sample rate and the voice's own elapsed time for one tick.
#[derive(Copy, Clone, Debug)]
pub struct Clock {
    pub sr: f64,
    pub t: f64,
}

impl Clock {
    /// Highest frequency any oscillator may run at.
    #[inline]
    pub fn max_hz(&self) -> f64 {
        f64::from(chaotone_core::dsp::NYQUIST_GUARD) * self.sr
    }

    #[inline]
    pub fn hz(&self, f: f32) -> f64 {
        self.hz_f64(f64::from(f))
    }

    #[inline]
    pub fn hz_f64(&self, f: f64) -> f64 {
        f.clamp(0.0, self.max_hz())
    }
}

/// Per-algorithm state. Closed-form formulas carry none.
#[derive(Clone, Debug)]
pub enum FormulaState {
    Fm,
    Beats,
    Am,
    Logistic(Logistic),
    Glissando(Glissando),
    Additive,
    Pm(Pm),
    Distortion,
    Quasi(Quasi),
    Lorenz(Lorenz),
    Rossler(Rossler),
    Karplus(Karplus),
    Bitcrush(Bitcrush),
    White(White),
    Pink(Pink),
    Brown(Brown),
    Velvet(Velvet),
    Shepard(Shepard),
}

impl FormulaState {
    /// Fresh state for `id`. Only the Karplus buffer depends on the sample rate.
    pub fn new(id: FormulaId, params: &ParamSet, sr: f64, rng: SmallRng) -> Self {
        match id {
            FormulaId::Fm => Self::Fm,
            FormulaId::Beats => Self::Beats,
            FormulaId::Am => Self::Am,
            FormulaId::Logistic => Self::Logistic(Logistic::default()),
            FormulaId::Glissando => Self::Glissando(Glissando::default()),
            FormulaId::Additive => Self::Additive,
            FormulaId::Pm => Self::Pm(Pm::default()),
            FormulaId::Distortion => Self::Distortion,
            FormulaId::Quasi => Self::Quasi(Quasi::default()),
            FormulaId::Lorenz => Self::Lorenz(Lorenz::default()),
            FormulaId::Rossler => Self::Rossler(Rossler::default()),
            FormulaId::Karplus => Self::Karplus(Karplus::new(params, sr, rng)),
            FormulaId::Bitcrush => Self::Bitcrush(Bitcrush::default()),
            FormulaId::White => Self::White(White::new(params, sr, rng)),
            FormulaId::Pink => Self::Pink(Pink::new(rng)),
            FormulaId::Brown => Self::Brown(Brown::new(rng)),
            FormulaId::Velvet => Self::Velvet(Velvet::new(rng)),
            FormulaId::Shepard => Self::Shepard(Shepard::default()),
        }
    }

    #[inline]
    pub fn tick(&mut self, p: &ParamSet, c: Clock) -> f64 {
        match self {
            Self::Fm => tonal::fm(p, c),
            Self::Beats => tonal::beats(p, c),
            Self::Am => tonal::am(p, c),
            Self::Logistic(s) => s.next(p, c),
            Self::Glissando(s) => s.next(p, c),
            Self::Additive => tonal::additive(p, c),
            Self::Pm(s) => s.next(p, c),
            Self::Distortion => tonal::distortion(p, c),
            Self::Quasi(s) => s.next(p, c),
            Self::Lorenz(s) => s.next(p, c),
            Self::Rossler(s) => s.next(p, c),
            Self::Karplus(s) => s.next(p, c),
            Self::Bitcrush(s) => s.next(p, c),
            Self::White(s) => s.next(p, c),
            Self::Pink(s) => s.next(p, c),
            Self::Brown(s) => s.next(p, c),
            Self::Velvet(s) => s.next(p, c),
            Self::Shepard(s) => s.next(p, c),
        }
    }

    /// Put resettable kinds back on their initial condition.
    ///
    /// Returns `false` (and does nothing) for kinds without resettable state.
    pub fn reset(&mut self, p: &ParamSet, sr: f64) -> bool {
        match self {
            Self::Glissando(s) => s.reset(),
            Self::Pm(s) => s.reset(),
            Self::Quasi(s) => s.reset(),
            Self::Lorenz(s) => s.reset(),
            Self::Rossler(s) => s.reset(),
            Self::Karplus(s) => s.reset(p, sr),
            Self::Shepard(s) => s.reset(),
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::str::FromStr;
    use strum::{EnumCount, IntoEnumIterator};

    #[test]
    fn descriptor_table_matches_ids() {
        assert_eq!(FormulaId::COUNT, 18);
        for id in FormulaId::iter() {
            let d = id.descriptor();
            assert_eq!(d.id, id);
            assert_eq!(d.params[0].name, "gain");
        }
    }

    #[test]
    fn exactly_seven_kinds_are_resettable() {
        let resettable: Vec<_> = FormulaId::iter().filter(|id| id.is_resettable()).map(FormulaId::name).collect();
        assert_eq!(
            resettable,
            ["glissando", "pm", "quasi", "lorenz", "rossler", "karplus", "shepard"]
        );
    }

    #[test]
    fn ids_round_trip_through_strings() {
        for id in FormulaId::iter() {
            assert_eq!(FormulaId::from_str(&id.to_string()).ok(), Some(id));
        }
        assert!(FormulaId::from_str("sawtooth").is_err());
    }

    #[test]
    fn reset_reports_capability() {
        for id in FormulaId::iter() {
            let p = ParamSet::new(id.params());
            let mut s = FormulaState::new(id, &p, 44_100.0, SmallRng::seed_from_u64(0));
            assert_eq!(s.reset(&p, 44_100.0), id.is_resettable(), "{id}");
        }
    }

    #[test]
    fn every_formula_is_finite_for_five_seconds() {
        let sr = 44_100.0;
        for id in FormulaId::iter() {
            let p = ParamSet::new(id.params());
            let mut s = FormulaState::new(id, &p, sr, SmallRng::seed_from_u64(11));
            for n in 0..(5 * 44_100u64) {
                let v = s.tick(&p, Clock { sr, t: n as f64 / sr });
                assert!(v.is_finite(), "{id} went non-finite at sample {n}");
            }
        }
    }
}
