//! Convolution reverb.
//!
//! The impulse response is synthetic: one-pole-lowpassed white noise under an
//! exponential envelope that reaches −60 dB at `decay` seconds, cut at
//! `1.2·decay` (bounded to `[0.1, 6]` s) and normalized to unit energy.
//!
//! Convolution is uniformly partitioned overlap-save: the IR is split into
//! 256-sample partitions whose spectra are multiplied against a frequency-domain
//! delay line of past input blocks. The wet path is exactly one block late.

use std::fmt;
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use chaotone_core::filters::OnePoleLP;

use super::{blend, Stage};
use crate::params::{Assign, ParamSet, ParamSpec};

pub const BLOCK: usize = 256;
const FFT_LEN: usize = 2 * BLOCK;

pub const MIN_IR_SECONDS: f32 = 0.1;
pub const MAX_IR_SECONDS: f32 = 6.0;
const IR_TAIL_FACTOR: f32 = 1.2;
const IR_TONE_HZ: f32 = 6000.0;
/// ln(10^-3): −60 dB.
const LN_MINUS_60DB: f32 = -6.907_755;

pub static REVERB_PARAMS: [ParamSpec; 2] = [
    ParamSpec::new("decay", 2.5, 0.1, 10.0),
    ParamSpec::new("mix", 0.3, 0.0, 1.0),
];

const DECAY: usize = 0;
const MIX: usize = 1;

/// Build the reverb impulse response for `decay` seconds (RT60).
pub fn synth_impulse(decay: f32, sr: f32, rng: &mut SmallRng) -> Vec<f32> {
    let decay = decay.max(MIN_IR_SECONDS);
    let seconds = (decay * IR_TAIL_FACTOR).clamp(MIN_IR_SECONDS, MAX_IR_SECONDS);
    let n = ((seconds * sr) as usize).max(1);
    let k = LN_MINUS_60DB / (decay * sr);
    let mut lp = OnePoleLP::new(IR_TONE_HZ, sr);

    let mut ir: Vec<f32> = (0..n)
        .map(|i| lp.process(rng.gen_range(-1.0f32..1.0)) * (k * i as f32).exp())
        .collect();

    let energy: f32 = ir.iter().map(|h| h * h).sum();
    let scale = 1.0 / energy.sqrt().max(1e-9);
    for h in &mut ir {
        *h *= scale;
    }
    ir
}

/// Partitions needed to hold the longest impulse at `sr`.
pub fn max_partitions(sr: f32) -> usize {
    ((MAX_IR_SECONDS * sr) as usize).div_ceil(BLOCK).max(1)
}

/// Partition spectra of one impulse response, ready to convolve with.
///
/// Built off the audio thread and shared by `Arc`; the convolver only swaps
/// pointers.
#[derive(Clone, PartialEq)]
pub struct Impulse {
    decay: f32,
    sr: f32,
    partitions: Vec<Vec<Complex32>>,
}

impl Impulse {
    /// Spectra of an arbitrary response. `decay` is only recorded.
    pub fn from_response(ir: &[f32], decay: f32, sr: f32) -> Self {
        let fft = FftPlanner::<f32>::new().plan_fft_forward(FFT_LEN);
        let mut scratch = vec![Complex32::default(); fft.get_inplace_scratch_len()];
        let partitions = ir
            .chunks(BLOCK)
            .map(|chunk| {
                let mut part = vec![Complex32::default(); FFT_LEN];
                for (dst, &h) in part.iter_mut().zip(chunk) {
                    dst.re = h;
                }
                fft.process_with_scratch(&mut part, &mut scratch);
                part
            })
            .collect::<Vec<_>>();
        let partitions = if partitions.is_empty() { vec![vec![Complex32::default(); FFT_LEN]] } else { partitions };
        Self { decay, sr, partitions }
    }

    #[inline] pub fn decay(&self) -> f32 { self.decay }
    #[inline] pub fn sample_rate(&self) -> f32 { self.sr }
    #[inline] pub fn partition_count(&self) -> usize { self.partitions.len() }
}

impl fmt::Debug for Impulse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Impulse")
            .field("decay", &self.decay)
            .field("sr", &self.sr)
            .field("partitions", &self.partitions.len())
            .finish()
    }
}

/// Everything needed to rebuild a reverb's impulse for a new `decay`.
///
/// The same source always yields the same response for the same decay, so an
/// impulse built on a control thread matches one built in place.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ImpulseSource {
    pub sr: f32,
    pub seed: u64,
}

impl ImpulseSource {
    /// Expensive: noise synthesis plus one FFT per partition.
    pub fn build(self, decay: f32) -> Arc<Impulse> {
        let decay = REVERB_PARAMS[DECAY].clamp(decay);
        let mut rng = SmallRng::seed_from_u64(self.seed);
        let ir = synth_impulse(decay, self.sr, &mut rng);
        Arc::new(Impulse::from_response(&ir, decay, self.sr))
    }
}

/// Uniformly partitioned FFT convolver with a fixed block of [`BLOCK`] samples.
///
/// The frequency-domain delay line is sized for the longest impulse at the
/// impulse's sample rate, so [`Convolver::swap`] never drops history.
#[derive(Clone)]
pub struct Convolver {
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex32>,
    ir: Arc<Impulse>,
    /// Spectra of the most recent input blocks, ring indexed by `head`.
    fdl: Vec<Vec<Complex32>>,
    head: usize,
    work: Vec<Complex32>,
    acc: Vec<Complex32>,
    prev: Vec<f32>,
    input: Vec<f32>,
    output: Vec<f32>,
    pos: usize,
}

impl Convolver {
    pub fn new(ir: Arc<Impulse>) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FFT_LEN);
        let ifft = planner.plan_fft_inverse(FFT_LEN);
        let scratch_len = fft.get_inplace_scratch_len().max(ifft.get_inplace_scratch_len());
        let zero = Complex32::default();
        let depth = max_partitions(ir.sr).max(ir.partition_count());
        Self {
            fft,
            ifft,
            scratch: vec![zero; scratch_len],
            ir,
            fdl: vec![vec![zero; FFT_LEN]; depth],
            head: 0,
            work: vec![zero; FFT_LEN],
            acc: vec![zero; FFT_LEN],
            prev: vec![0.0; BLOCK],
            input: vec![0.0; BLOCK],
            output: vec![0.0; BLOCK],
            pos: 0,
        }
    }

    pub fn impulse(&self) -> &Arc<Impulse> {
        &self.ir
    }

    pub fn partition_count(&self) -> usize {
        self.ir.partition_count()
    }

    /// Replace the impulse response and hand back the old one. Input history is
    /// kept; partitions beyond the delay line's depth are ignored.
    pub fn swap(&mut self, ir: Arc<Impulse>) -> Arc<Impulse> {
        std::mem::replace(&mut self.ir, ir)
    }

    pub fn clear(&mut self) {
        let zero = Complex32::default();
        for spec in &mut self.fdl {
            spec.fill(zero);
        }
        self.prev.fill(0.0);
        self.input.fill(0.0);
        self.output.fill(0.0);
        self.pos = 0;
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.output[self.pos];
        self.input[self.pos] = x;
        self.pos += 1;
        if self.pos == BLOCK {
            self.pos = 0;
            self.process_block();
        }
        y
    }

    fn process_block(&mut self) {
        let depth = self.fdl.len();

        for (w, &s) in self.work.iter_mut().zip(self.prev.iter().chain(self.input.iter())) {
            *w = Complex32::new(s, 0.0);
        }
        self.fft.process_with_scratch(&mut self.work, &mut self.scratch);
        self.head = (self.head + 1) % depth;
        self.fdl[self.head].copy_from_slice(&self.work);

        // Real input: only bins 0..=BLOCK are independent.
        self.acc.fill(Complex32::default());
        for (p, part) in self.ir.partitions.iter().take(depth).enumerate() {
            let spec = &self.fdl[(self.head + depth - p) % depth];
            for k in 0..=BLOCK {
                self.acc[k] += spec[k] * part[k];
            }
        }
        for k in 1..BLOCK {
            self.acc[FFT_LEN - k] = self.acc[k].conj();
        }

        self.ifft.process_with_scratch(&mut self.acc, &mut self.scratch);
        let norm = 1.0 / FFT_LEN as f32;
        for (o, a) in self.output.iter_mut().zip(&self.acc[BLOCK..]) {
            *o = a.re * norm;
        }
        self.prev.copy_from_slice(&self.input);
    }
}

impl fmt::Debug for Convolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Convolver")
            .field("ir", &self.ir)
            .field("depth", &self.fdl.len())
            .field("pos", &self.pos)
            .finish_non_exhaustive()
    }
}

/// Convolution reverb stage.
///
/// Assigning `decay` through [`Stage::set_param`] is cheap and leaves the
/// current impulse in place ([`Reverb::is_stale`]). The new response is built
/// either by [`Reverb::rebuild`] on a control thread or ahead of time through
/// [`ImpulseSource::build`] and handed over with [`Reverb::install`].
#[derive(Clone, Debug)]
pub struct Reverb {
    params: ParamSet,
    conv: Convolver,
    source: ImpulseSource,
    generation: u64,
}

impl Reverb {
    pub fn new(sr: f32, seed: u64) -> Self {
        let params = ParamSet::new(&REVERB_PARAMS);
        let source = ImpulseSource { sr, seed };
        Self { conv: Convolver::new(source.build(params.get(DECAY))), params, source, generation: 1 }
    }

    /// How many impulse responses have been put in place.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn partition_count(&self) -> usize {
        self.conv.partition_count()
    }

    pub fn source(&self) -> ImpulseSource {
        self.source
    }

    /// `decay` no longer matches the impulse being convolved.
    pub fn is_stale(&self) -> bool {
        self.conv.impulse().decay() != self.params.get(DECAY)
    }

    /// Build and install an impulse for the current `decay` if it is stale.
    /// Allocates; not for the audio thread.
    pub fn rebuild(&mut self) -> bool {
        if !self.is_stale() {
            return false;
        }
        let ir = self.source.build(self.params.get(DECAY));
        self.conv.swap(ir);
        self.generation += 1;
        true
    }

    /// Swap in a prebuilt impulse and return the one it replaces, so the caller
    /// decides where it is freed. An impulse built for another sample rate is
    /// refused and handed back as `Err`.
    pub fn install(&mut self, ir: Arc<Impulse>) -> Result<Arc<Impulse>, Arc<Impulse>> {
        if ir.sample_rate() != self.source.sr {
            return Err(ir);
        }
        self.params.set("decay", ir.decay());
        self.generation += 1;
        Ok(self.conv.swap(ir))
    }
}

impl Stage for Reverb {
    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn set_param(&mut self, key: &str, value: f32) -> Assign {
        self.params.set(key, value)
    }

    fn set_sample_rate(&mut self, sr: f32) {
        self.source.sr = sr;
        self.conv = Convolver::new(self.source.build(self.params.get(DECAY)));
        self.generation += 1;
    }

    fn clear(&mut self) {
        self.conv.clear();
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        let wet = self.conv.process(x);
        blend(x, wet, self.params.get(MIX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    fn convolver(ir: &[f32]) -> Convolver {
        Convolver::new(Arc::new(Impulse::from_response(ir, 1.0, 8000.0)))
    }

    fn run(conv: &mut Convolver, n: usize) -> Vec<f32> {
        (0..n).map(|i| conv.process(if i == 0 { 1.0 } else { 0.0 })).collect()
    }

    #[test]
    fn unit_impulse_delays_by_one_block() {
        let mut c = convolver(&[1.0]);
        let out = run(&mut c, 1024);
        assert!(approx_eq!(f32, out[BLOCK], 1.0, epsilon = 1e-5));
        for (i, s) in out.iter().enumerate().filter(|&(i, _)| i != BLOCK) {
            assert!(s.abs() < 1e-5, "leak at {i}: {s}");
        }
    }

    #[test]
    fn taps_in_later_partitions_land_on_time() {
        let mut ir = vec![0.0; 700];
        ir[300] = 0.5;
        ir[650] = -0.25;
        let mut c = convolver(&ir);
        assert_eq!(c.partition_count(), 3);
        let out = run(&mut c, 2048);
        assert!(approx_eq!(f32, out[BLOCK + 300], 0.5, epsilon = 1e-5));
        assert!(approx_eq!(f32, out[BLOCK + 650], -0.25, epsilon = 1e-5));
    }

    #[test]
    fn swapping_to_a_longer_impulse_keeps_the_tail() {
        let mut short = vec![0.0; 400];
        short[300] = 0.5;
        let mut long = vec![0.0; 1500];
        long[300] = 0.5;
        long[1200] = 0.25;
        let mut c = convolver(&short);

        // The impulse is inside the delay line but its echo has not come out yet.
        let mut out = run(&mut c, BLOCK);
        let old = c.swap(Arc::new(Impulse::from_response(&long, 1.0, 8000.0)));
        assert_eq!(old.partition_count(), 2);
        assert_eq!(c.partition_count(), 6);
        out.extend((0..2048).map(|_| c.process(0.0)));

        assert!(approx_eq!(f32, out[BLOCK + 300], 0.5, epsilon = 1e-5));
        assert!(approx_eq!(f32, out[BLOCK + 1200], 0.25, epsilon = 1e-5));
    }

    #[test]
    fn impulse_has_unit_energy_and_bounded_length() {
        let mut rng = SmallRng::seed_from_u64(1);
        let ir = synth_impulse(10.0, 8000.0, &mut rng);
        assert_eq!(ir.len(), 48_000);
        let e: f32 = ir.iter().map(|h| h * h).sum();
        assert!(approx_eq!(f32, e, 1.0, epsilon = 1e-3));
        let floor = synth_impulse(0.1, 8000.0, &mut rng);
        assert_eq!(synth_impulse(0.001, 8000.0, &mut rng).len(), floor.len());
        assert_eq!(max_partitions(8000.0), 188);
    }

    #[test]
    fn same_source_and_decay_give_the_same_impulse() {
        let source = ImpulseSource { sr: 8000.0, seed: 9 };
        assert_eq!(source.build(1.5), source.build(1.5));
        assert_eq!(source.build(50.0).decay(), 10.0);
    }

    #[test]
    fn decay_changes_only_rebuild_when_asked() {
        let mut r = Reverb::new(8000.0, 2);
        assert_eq!(r.generation(), 1);
        r.set_param("mix", 0.9);
        assert!(!r.is_stale());
        assert!(!r.rebuild());

        r.set_param("decay", 1.0);
        assert!(r.is_stale());
        assert_eq!(r.generation(), 1);
        assert!(r.rebuild());
        assert_eq!(r.generation(), 2);
        assert!(!r.rebuild());
        assert_eq!(r.generation(), 2);
        assert_eq!(r.partition_count(), (1.2f32 * 8000.0) as usize / BLOCK + 1);
    }

    #[test]
    fn install_swaps_prebuilt_impulses_of_the_same_rate() {
        let mut r = Reverb::new(8000.0, 2);
        let ir = r.source().build(0.5);
        let old = r.install(Arc::clone(&ir)).unwrap();
        assert_eq!(old.decay(), 2.5);
        assert_eq!(r.params().value_of("decay"), Some(0.5));
        assert!(!r.is_stale());
        assert_eq!(r.generation(), 2);

        let foreign = ImpulseSource { sr: 16_000.0, seed: 2 }.build(1.0);
        assert!(r.install(foreign).is_err());
        assert_eq!(r.params().value_of("decay"), Some(0.5));
        assert_eq!(r.generation(), 2);
    }
}
