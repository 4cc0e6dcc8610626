//! Mix bus: sums the gain-scaled output of every enabled voice.

use chaotone_core::dsp::mix_in_place;
use strum::{EnumCount, IntoEnumIterator};

use crate::formulas::FormulaId;
use crate::voice::Voice;

/// Largest block the bus renders in one pass; longer requests are chunked.
pub const MAX_BLOCK: usize = 512;

/// Seed offset so each voice draws a different noise stream.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// One voice per formula, indexed by `FormulaId as usize`.
#[derive(Clone, Debug)]
pub struct MixBus {
    voices: Vec<Voice>,
    scratch: Vec<f32>,
}

impl MixBus {
    pub fn new(sr: f32, seed: u64) -> Self {
        let voices = FormulaId::iter()
            .map(|id| Voice::new(id, sr, seed.wrapping_add(SEED_STRIDE.wrapping_mul(id as u64 + 1))))
            .collect::<Vec<_>>();
        debug_assert_eq!(voices.len(), FormulaId::COUNT);
        Self { voices, scratch: vec![0.0; MAX_BLOCK] }
    }

    #[inline]
    pub fn voice(&self, id: FormulaId) -> &Voice {
        &self.voices[id as usize]
    }

    #[inline]
    pub fn voice_mut(&mut self, id: FormulaId) -> &mut Voice {
        &mut self.voices[id as usize]
    }

    pub fn voices(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter()
    }

    pub fn set_sample_rate(&mut self, sr: f32) {
        for v in &mut self.voices {
            v.set_sample_rate(sr);
        }
    }

    /// Render up to [`MAX_BLOCK`] samples of the bus into `out` (overwriting it).
    ///
    /// Disabled voices are still advanced so their clocks and state stay
    /// continuous; they are just not summed.
    pub fn render(&mut self, out: &mut [f32]) {
        debug_assert!(out.len() <= MAX_BLOCK);
        out.fill(0.0);
        let scratch = &mut self.scratch[..out.len()];
        for v in &mut self.voices {
            v.render(scratch);
            if v.is_enabled() {
                mix_in_place(out, scratch, v.gain());
            }
        }
    }

    /// Reset every voice that produced a non-finite sample since the last call.
    /// Returns how many faults were seen.
    pub fn recover_faults(&mut self) -> usize {
        let mut faults = 0;
        for v in &mut self.voices {
            if v.take_fault() {
                faults += 1;
                // Stateless kinds only ever lose the bad sample.
                let _ = v.reset();
            }
        }
        faults
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn silent_when_nothing_is_enabled() {
        let mut bus = MixBus::new(48_000.0, 1);
        let mut out = vec![1.0; 256];
        bus.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn enabled_voice_is_scaled_by_its_gain() {
        let mut bus = MixBus::new(48_000.0, 1);
        let v = bus.voice_mut(FormulaId::Fm);
        v.set_enabled(true);
        v.set_param("fm", 0.0).unwrap();
        v.set_param("fc", 1000.0).unwrap();
        v.set_param("gain", 0.5).unwrap();
        let mut out = vec![0.0; 64];
        bus.render(&mut out);
        assert_eq!(out[0], 0.0);
        assert!(approx_eq!(f32, out[12], 0.5, epsilon = 1e-5));
    }

    #[test]
    fn disabled_voices_keep_their_clock_running() {
        let mut bus = MixBus::new(48_000.0, 1);
        let mut out = vec![0.0; 480];
        bus.render(&mut out);
        assert!(approx_eq!(f64, bus.voice(FormulaId::Lorenz).elapsed(), 0.01, epsilon = 1e-12));
    }
}
