//! Heap-backed circular delay line.
//!
//! Read before write: `read(d)` returns the sample written `d` calls to
//! `write` ago, so the shortest usable delay is one sample.

#[derive(Clone, Debug)]
pub struct DelayLine {
    buf: Vec<f32>,
    w: usize,
}

impl DelayLine {
    /// Line able to delay by up to `max_delay` samples.
    pub fn new(max_delay: usize) -> Self {
        Self { buf: vec![0.0; max_delay.max(1) + 2], w: 0 }
    }

    pub fn with_max_seconds(seconds: f32, sr: f32) -> Self {
        Self::new((seconds * sr).ceil() as usize)
    }

    #[inline]
    pub fn max_delay(&self) -> usize {
        self.buf.len() - 2
    }

    pub fn clear(&mut self) {
        self.buf.fill(0.0);
        self.w = 0;
    }

    #[inline]
    pub fn write(&mut self, x: f32) {
        self.buf[self.w] = x;
        self.w += 1;
        if self.w == self.buf.len() {
            self.w = 0;
        }
    }

    #[inline]
    pub fn read(&self, delay: usize) -> f32 {
        let len = self.buf.len();
        let d = delay.clamp(1, len - 1);
        self.buf[(self.w + len - d) % len]
    }

    /// Linear interpolation between integer taps.
    #[inline]
    pub fn read_frac(&self, delay: f32) -> f32 {
        let d = delay.max(1.0);
        let i = d.floor();
        let frac = d - i;
        let i = i as usize;
        let a = self.read(i);
        let b = self.read(i + 1);
        a + (b - a) * frac
    }
}
