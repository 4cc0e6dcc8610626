//! WAV output: the live recorder thread and the offline renderer.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use chaotone_engine::{Session, Tap};

const POLL: Duration = Duration::from_millis(20);

/// Seconds of audio the tap can hold before the recorder falls behind.
pub const TAP_SECONDS: usize = 4;

/// Background thread moving post-master samples from a [`Tap`] into a mono
/// 32-bit float WAV file.
pub struct Recorder {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Result<u64>>,
    tap: Tap,
    path: PathBuf,
}

impl Recorder {
    pub fn start(path: &Path, tap: Tap, sample_rate: u32) -> Result<Self> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)
            .with_context(|| format!("failed to create wav file: {}", path.display()))?;

        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop = Arc::clone(&stop);
            let tap = tap.clone();
            thread::Builder::new().name("recorder".into()).spawn(move || -> Result<u64> {
                let mut buf = Vec::with_capacity(sample_rate as usize);
                let mut written = 0u64;
                loop {
                    // Read the flag first so the final drain sees everything pushed before it.
                    let stopping = stop.load(Ordering::Acquire);
                    buf.clear();
                    tap.drain_into(&mut buf);
                    for &s in &buf {
                        writer.write_sample(s).context("failed to write sample")?;
                    }
                    written += buf.len() as u64;
                    if stopping {
                        break;
                    }
                    thread::sleep(POLL);
                }
                writer.finalize().context("failed to finalize wav file")?;
                Ok(written)
            })?
        };

        log::info!("recording to {}", path.display());
        Ok(Self { stop, handle, tap, path: path.to_owned() })
    }

    /// Flush what is queued, close the file and report.
    pub fn finish(self) -> Result<()> {
        self.stop.store(true, Ordering::Release);
        let written = self
            .handle
            .join()
            .map_err(|_| anyhow::anyhow!("recorder thread panicked"))??;
        let dropped = self.tap.dropped();
        if dropped > 0 {
            log::warn!("recorder fell behind: {dropped} samples dropped");
        }
        log::info!("wrote {written} samples to {}", self.path.display());
        Ok(())
    }
}

/// Render `seconds` of `session` straight to a 16-bit WAV, duplicating the mono
/// signal across `channels`.
pub fn render_offline(session: &mut Session, path: &Path, seconds: f32, channels: u16) -> Result<()> {
    let sr = session.sample_rate();
    let spec = hound::WavSpec {
        channels,
        sample_rate: sr as u32,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("failed to create wav file: {}", path.display()))?;

    let total = (seconds.max(0.0) * sr) as usize;
    let mut block = [0.0f32; 512];
    let mut done = 0;
    let mut peak = 0.0f32;
    while done < total {
        let n = (total - done).min(block.len());
        session.process_block(&mut block[..n]);
        for &s in &block[..n] {
            peak = peak.max(s.abs());
            let q = (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16;
            for _ in 0..channels {
                writer.write_sample(q).context("failed to write sample")?;
            }
        }
        done += n;
    }
    writer.finalize().context("failed to finalize wav file")?;

    if peak > 1.0 {
        log::warn!("output clipped (peak {peak:.2}); lower master gain or enable the limiter");
    }
    if session.faults() > 0 {
        log::warn!("{} non-finite samples were replaced by silence", session.faults());
    }
    log::info!("rendered {seconds} s ({total} frames) to {}", path.display());
    Ok(())
}
