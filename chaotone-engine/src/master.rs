//! Master stage: output gain, metering point and recorder tap.
//!
//! The audio thread owns [`Master`]. Readers get cheap clonable handles:
//! - [`MeterHandle`] : last 16384 post-master samples, time and spectrum snapshots
//! - [`Tap`]         : continuous post-master stream for a recorder
//!
//! Neither handle can stall the audio thread. Meter publication uses `try_lock`
//! (a contended publish is dropped for metering only) and the tap is a bounded
//! lock-free queue that drops and counts on overflow.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use crossbeam::queue::ArrayQueue;
use rustfft::num_complex::Complex32;
use rustfft::FftPlanner;

use chaotone_core::dsp::{lin_to_db, Rms, TAU};

use crate::nodes::OnePoleSmoother;
use crate::params::{Assign, ParamSet, ParamSpec};

pub const METER_CAPACITY: usize = 16_384;
const STAGING: usize = 256;
const GAIN_SMOOTH_MS: f32 = 10.0;
const RMS_WINDOW_MS: f32 = 50.0;

pub static MASTER_PARAMS: [ParamSpec; 1] = [ParamSpec::new("gain", 0.8, 0.0, 1.5)];

// ------------------------------------ Meter --------------------------------------

#[derive(Debug)]
struct Ring {
    buf: Vec<f32>,
    head: usize,
    filled: usize,
}

impl Ring {
    fn push_slice(&mut self, xs: &[f32]) {
        let cap = self.buf.len();
        for &x in xs {
            self.buf[self.head] = x;
            self.head = (self.head + 1) % cap;
        }
        self.filled = (self.filled + xs.len()).min(cap);
    }

    /// Newest `len` samples, oldest first, zero-padded at the front.
    fn newest(&self, len: usize) -> Vec<f32> {
        let cap = self.buf.len();
        let len = len.min(cap);
        let have = self.filled.min(len);
        let mut out = vec![0.0; len];
        let start = (self.head + cap - have) % cap;
        for (i, o) in out[len - have..].iter_mut().enumerate() {
            *o = self.buf[(start + i) % cap];
        }
        out
    }
}

/// Read side of the meter. Clone freely; all clones see the same buffer.
#[derive(Clone, Debug)]
pub struct MeterHandle {
    ring: Arc<Mutex<Ring>>,
    rms_bits: Arc<AtomicU32>,
}

impl MeterHandle {
    fn new() -> Self {
        let ring = Ring { buf: vec![0.0; METER_CAPACITY], head: 0, filled: 0 };
        Self { ring: Arc::new(Mutex::new(ring)), rms_bits: Arc::default() }
    }

    fn lock(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Audio side: never blocks. Returns `false` if a reader held the lock.
    fn publish(&self, xs: &[f32]) -> bool {
        let mut ring = match self.ring.try_lock() {
            Ok(g) => g,
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
            Err(TryLockError::WouldBlock) => return false,
        };
        ring.push_slice(xs);
        true
    }

    /// The newest `len` samples (at most [`METER_CAPACITY`]), zero-padded at the
    /// front while fewer have been produced.
    pub fn time_snapshot(&self, len: usize) -> Vec<f32> {
        self.lock().newest(len)
    }

    /// `bins` magnitudes in dB of a Hann-windowed FFT over the newest `2·bins`
    /// samples. A full-scale sine on a bin centre reads about 0 dB.
    pub fn frequency_snapshot(&self, bins: usize) -> Vec<f32> {
        let n = (2 * bins).clamp(2, METER_CAPACITY);
        let bins = n / 2;
        let samples = self.time_snapshot(n);

        let mut window_sum = 0.0;
        let mut buf: Vec<Complex32> = samples
            .iter()
            .enumerate()
            .map(|(i, &s)| {
                let w = 0.5 - 0.5 * (TAU * i as f32 / n as f32).cos();
                window_sum += w;
                Complex32::new(s * w, 0.0)
            })
            .collect();

        FftPlanner::<f32>::new().plan_fft_forward(n).process(&mut buf);

        let scale = 2.0 / window_sum.max(f32::EPSILON);
        buf[..bins].iter().map(|c| lin_to_db(c.norm() * scale)).collect()
    }

    /// RMS of the post-master signal over roughly the last 50 ms.
    pub fn rms(&self) -> f32 {
        f32::from_bits(self.rms_bits.load(Ordering::Relaxed))
    }
}

// ------------------------------------- Tap ---------------------------------------

/// Bounded post-master sample stream for a recorder thread.
#[derive(Clone, Debug)]
pub struct Tap {
    queue: Arc<ArrayQueue<f32>>,
    dropped: Arc<AtomicU64>,
}

impl Tap {
    pub fn with_capacity(samples: usize) -> Self {
        Self { queue: Arc::new(ArrayQueue::new(samples.max(1))), dropped: Arc::default() }
    }

    /// Audio side: never blocks, drops and counts on overflow.
    #[inline]
    pub fn push(&self, x: f32) {
        if self.queue.push(x).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Recorder side: move everything queued into `out`. Returns how many samples moved.
    pub fn drain_into(&self, out: &mut Vec<f32>) -> usize {
        let before = out.len();
        while let Some(x) = self.queue.pop() {
            out.push(x);
        }
        out.len() - before
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Samples lost to overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

// ------------------------------------ Master -------------------------------------

/// Smoothed master gain followed by the metering point and the optional tap.
#[derive(Debug)]
pub struct Master {
    params: ParamSet,
    smoother: OnePoleSmoother,
    rms: Rms,
    meter: MeterHandle,
    staging: [f32; STAGING],
    staged: usize,
    tap: Option<Tap>,
}

impl Master {
    pub fn new(sr: f32) -> Self {
        let params = ParamSet::new(&MASTER_PARAMS);
        let mut smoother = OnePoleSmoother::new_ms(GAIN_SMOOTH_MS, sr);
        smoother.reset(params.get(0));
        Self {
            params,
            smoother,
            rms: Rms::with_time_ms(RMS_WINDOW_MS, sr),
            meter: MeterHandle::new(),
            staging: [0.0; STAGING],
            staged: 0,
            tap: None,
        }
    }

    #[inline] pub fn params(&self) -> &ParamSet { &self.params }
    #[inline] pub fn gain(&self) -> f32 { self.params.get(0) }
    pub fn meter(&self) -> MeterHandle { self.meter.clone() }

    pub fn set_param(&mut self, key: &str, value: f32) -> Assign {
        self.params.set(key, value)
    }

    /// Jump straight to the current gain target, skipping the ramp.
    pub fn settle(&mut self) {
        self.smoother.reset(self.params.get(0));
    }

    pub fn set_sample_rate(&mut self, sr: f32) {
        self.smoother.set_time_ms(GAIN_SMOOTH_MS, sr);
        self.rms = Rms::with_time_ms(RMS_WINDOW_MS, sr);
    }

    pub fn attach_tap(&mut self, tap: Tap) {
        self.tap = Some(tap);
    }

    pub fn detach_tap(&mut self) -> Option<Tap> {
        self.tap.take()
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = x * self.smoother.process(self.params.get(0));
        self.rms.tick(y);
        self.staging[self.staged] = y;
        self.staged += 1;
        if self.staged == STAGING {
            self.flush_meter();
        }
        if let Some(tap) = &self.tap {
            tap.push(y);
        }
        y
    }

    /// Publish staged samples to the meter. Called at the end of every block.
    pub fn flush_meter(&mut self) {
        if self.staged > 0 {
            // A busy reader costs this block's meter data only.
            let _ = self.meter.publish(&self.staging[..self.staged]);
            self.staged = 0;
        }
        self.meter.rms_bits.store(self.rms.value().to_bits(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use more_asserts::{assert_gt, assert_lt};

    fn feed(m: &mut Master, xs: impl IntoIterator<Item = f32>) {
        for x in xs {
            m.process(x);
        }
        m.flush_meter();
    }

    #[test]
    fn snapshot_is_padded_then_newest_first_last() {
        let mut m = Master::new(48_000.0);
        m.set_param("gain", 1.0);
        m.settle();
        feed(&mut m, [1.0, 2.0, 3.0]);
        assert_eq!(m.meter().time_snapshot(5), vec![0.0, 0.0, 1.0, 2.0, 3.0]);
        assert_eq!(m.meter().time_snapshot(2), vec![2.0, 3.0]);
    }

    #[test]
    fn snapshot_wraps_and_caps_at_capacity() {
        let mut m = Master::new(48_000.0);
        m.set_param("gain", 1.0);
        m.settle();
        feed(&mut m, (0..METER_CAPACITY + 10).map(|i| i as f32));
        let snap = m.meter().time_snapshot(METER_CAPACITY * 2);
        assert_eq!(snap.len(), METER_CAPACITY);
        assert_eq!(snap[0], 10.0);
        assert_eq!(*snap.last().unwrap(), (METER_CAPACITY + 9) as f32);
    }

    #[test]
    fn spectrum_peaks_at_the_sine_bin() {
        let sr = 48_000.0;
        let mut m = Master::new(sr);
        m.set_param("gain", 1.0);
        m.settle();
        // Bin 32 of a 1024-point FFT.
        let f = 32.0 * sr / 1024.0;
        feed(&mut m, (0..4096).map(|n| (TAU * f * n as f32 / sr).sin()));
        let spec = m.meter().frequency_snapshot(512);
        assert_eq!(spec.len(), 512);
        let (peak_bin, peak_db) = spec
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
        assert_eq!(peak_bin, 32);
        assert!(approx_eq!(f32, peak_db, 0.0, epsilon = 0.5));
        assert_lt!(spec[200], -60.0);
    }

    #[test]
    fn gain_change_is_smoothed() {
        let mut m = Master::new(48_000.0);
        m.set_param("gain", 0.0);
        let first = m.process(1.0);
        assert_gt!(first, 0.7);
        for _ in 0..48_000 {
            m.process(1.0);
        }
        assert_lt!(m.process(1.0), 1e-3);
    }

    #[test]
    fn tap_counts_overflow() {
        let tap = Tap::with_capacity(4);
        let mut m = Master::new(48_000.0);
        m.attach_tap(tap.clone());
        feed(&mut m, [0.1; 10]);
        assert_eq!(tap.len(), 4);
        assert_eq!(tap.dropped(), 6);
        let mut out = Vec::new();
        assert_eq!(tap.drain_into(&mut out), 4);
        assert!(tap.is_empty());
    }

    #[test]
    fn rms_readout_tracks_level() {
        let mut m = Master::new(48_000.0);
        m.set_param("gain", 1.0);
        m.settle();
        feed(&mut m, (0..48_000).map(|n| if n % 2 == 0 { 0.5 } else { -0.5 }));
        assert!(approx_eq!(f32, m.meter().rms(), 0.5, epsilon = 0.01));
    }
}
