//! Noise colours: filtered white, Kellet pink, clamped brown walk, velvet.

use rand::rngs::SmallRng;
use rand::Rng;

use chaotone_core::dsp::max_freq;
use chaotone_core::filters::OnePoleLP;
use chaotone_core::noise::{BrownWalk, PinkKellet};

use super::Clock;
use crate::params::{ParamSet, ParamSpec, GAIN};

#[inline]
fn white(rng: &mut SmallRng) -> f32 {
    rng.gen_range(-1.0f32..1.0)
}

// ---- white ----------------------------------------------------------------

pub static WHITE_PARAMS: [ParamSpec; 2] = [GAIN, ParamSpec::new("cutoff", 8000.0, 20.0, 20000.0)];

#[derive(Clone, Debug)]
pub struct White {
    lp: OnePoleLP,
    cutoff: f32,
    rng: SmallRng,
}

impl White {
    pub fn new(p: &ParamSet, sr: f64, rng: SmallRng) -> Self {
        let cutoff = p.get(1);
        let sr = sr as f32;
        Self { lp: OnePoleLP::new(cutoff.min(max_freq(sr)), sr), cutoff, rng }
    }

    pub fn next(&mut self, p: &ParamSet, c: Clock) -> f64 {
        let cutoff = p.get(1);
        if cutoff.to_bits() != self.cutoff.to_bits() {
            self.lp.set_cutoff_hz(cutoff.min(max_freq(c.sr as f32)));
            self.cutoff = cutoff;
        }
        f64::from(self.lp.process(white(&mut self.rng)))
    }
}

// ---- pink -----------------------------------------------------------------

pub static PINK_PARAMS: [ParamSpec; 2] = [GAIN, ParamSpec::new("brightness", 0.0, 0.0, 1.0)];

#[derive(Clone, Debug)]
pub struct Pink {
    bank: PinkKellet,
    rng: SmallRng,
}

impl Pink {
    pub fn new(rng: SmallRng) -> Self {
        Self { bank: PinkKellet::new(), rng }
    }

    pub fn next(&mut self, p: &ParamSet, _c: Clock) -> f64 {
        let w = white(&mut self.rng);
        let pink = self.bank.process(w);
        let b = p.get(1);
        f64::from(pink * (1.0 - b) + w * b)
    }
}

// ---- brown ----------------------------------------------------------------

pub static BROWN_PARAMS: [ParamSpec; 2] = [GAIN, ParamSpec::new("step", 0.02, 0.001, 0.2)];

#[derive(Clone, Debug)]
pub struct Brown {
    walk: BrownWalk,
    rng: SmallRng,
}

impl Brown {
    pub fn new(rng: SmallRng) -> Self {
        Self { walk: BrownWalk::new(), rng }
    }

    pub fn next(&mut self, p: &ParamSet, _c: Clock) -> f64 {
        let w = white(&mut self.rng);
        f64::from(self.walk.process(w, p.get(1)))
    }
}

// ---- velvet ---------------------------------------------------------------

pub static VELVET_PARAMS: [ParamSpec; 3] = [
    GAIN,
    ParamSpec::new("density", 1500.0, 10.0, 20000.0),
    ParamSpec::new("jitter", 0.8, 0.0, 1.0),
];

/// Sparse ±1 impulses with jittered spacing.
#[derive(Clone, Debug)]
pub struct Velvet {
    countdown: u64,
    rng: SmallRng,
}

impl Velvet {
    pub fn new(rng: SmallRng) -> Self {
        Self { countdown: 0, rng }
    }

    fn interval(&mut self, p: &ParamSet, sr: f64) -> u64 {
        let density = f64::from(p.get(1)).min(sr * 0.5);
        let jitter = f64::from(p.get(2));
        let spread: f64 = self.rng.gen_range(-1.0..1.0);
        let n = (sr / density) * (1.0 + jitter * spread);
        (n.round() as u64).max(1)
    }

    pub fn next(&mut self, p: &ParamSet, c: Clock) -> f64 {
        if self.countdown == 0 {
            self.countdown = self.interval(p, c.sr) - 1;
            if self.rng.gen::<bool>() { 1.0 } else { -1.0 }
        } else {
            self.countdown -= 1;
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use more_asserts::{assert_gt, assert_lt};
    use rand::SeedableRng;

    const SR: f64 = 48_000.0;
    const C: Clock = Clock { sr: SR, t: 0.0 };

    #[test]
    fn velvet_density_is_roughly_respected() {
        let p = ParamSet::new(&VELVET_PARAMS);
        let mut v = Velvet::new(SmallRng::seed_from_u64(3));
        let hits = (0..48_000).filter(|_| v.next(&p, C) != 0.0).count();
        // Nominal 1500 per second.
        assert_gt!(hits, 1200);
        assert_lt!(hits, 1800);
    }

    #[test]
    fn velvet_only_emits_unit_impulses() {
        let p = ParamSet::new(&VELVET_PARAMS);
        let mut v = Velvet::new(SmallRng::seed_from_u64(4));
        for _ in 0..10_000 {
            let s = v.next(&p, C);
            assert!(s == 0.0 || s.abs() == 1.0);
        }
    }

    #[test]
    fn brown_is_clamped() {
        let mut p = ParamSet::new(&BROWN_PARAMS);
        p.set("step", 0.2);
        let mut b = Brown::new(SmallRng::seed_from_u64(5));
        for _ in 0..100_000 {
            assert!(b.next(&p, C).abs() <= 1.0);
        }
    }

    #[test]
    fn white_cutoff_change_darkens_output() {
        fn diff_energy(cutoff: f32) -> f64 {
            let mut p = ParamSet::new(&WHITE_PARAMS);
            p.set("cutoff", cutoff);
            let mut w = White::new(&ParamSet::new(&WHITE_PARAMS), SR, SmallRng::seed_from_u64(9));
            let mut prev = 0.0;
            let mut acc = 0.0;
            for _ in 0..48_000 {
                let s = w.next(&p, C);
                acc += (s - prev) * (s - prev);
                prev = s;
            }
            acc
        }
        assert_lt!(diff_energy(200.0), diff_energy(15_000.0));
    }

    #[test]
    fn pink_at_full_brightness_is_the_raw_white_sample() {
        let mut p = ParamSet::new(&PINK_PARAMS);
        p.set("brightness", 1.0);
        let mut pink = Pink::new(SmallRng::seed_from_u64(11));
        let mut raw = SmallRng::seed_from_u64(11);
        for _ in 0..10_000 {
            assert_eq!(pink.next(&p, C), f64::from(white(&mut raw)));
        }
    }
}
