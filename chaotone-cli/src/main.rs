//! Chaotone CLI: real-time player and offline renderer for formula synthesis.

mod recorder;

use std::io::BufRead;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam::channel;

use chaotone_engine::params::ParamSpec;
use chaotone_engine::session::{formula_ids, DEFAULT_SEED};
use chaotone_engine::{
    CommandReceiver, CommandSender, Engine, FormulaId, MeterHandle, Patch, Session, StageKind, Tap,
};

use recorder::{render_offline, Recorder, TAP_SECONDS};

/// Largest mono block rendered per pass inside the audio callback.
const CALLBACK_FRAMES: usize = 4096;

#[derive(Parser, Debug)]
#[command(name = "chaotone", version, about = "Formula and chaos synthesizer")]
struct Args {
    /// List output devices and exit.
    #[arg(long)]
    list_devices: bool,

    /// List formulas, effect stages and their parameters, then exit.
    #[arg(long)]
    list_formulas: bool,

    /// Output device name (default device when omitted).
    #[arg(long)]
    device: Option<String>,

    #[arg(long)]
    sample_rate: Option<u32>,

    #[arg(long)]
    channels: Option<u16>,

    /// Stop after this many seconds (offline render defaults to 10).
    #[arg(long)]
    duration: Option<f32>,

    /// JSON patch with the starting parameters.
    #[arg(long)]
    patch: Option<PathBuf>,

    /// Turn on a formula or effect stage by name. Repeatable.
    #[arg(long = "enable", value_name = "NAME")]
    enable: Vec<String>,

    /// Override the patch master gain.
    #[arg(long)]
    gain: Option<f32>,

    /// Seed for noise sources, string excitation and the reverb impulse.
    #[arg(long)]
    seed: Option<u64>,

    /// Record the live post-master output to a WAV file.
    #[arg(long, value_name = "WAV")]
    record: Option<PathBuf>,

    /// Render offline to a WAV file instead of playing.
    #[arg(long, value_name = "WAV")]
    render: Option<PathBuf>,

    /// Write the full starting parameter set as a JSON patch.
    #[arg(long, value_name = "JSON")]
    save_patch: Option<PathBuf>,
}

fn list_output_devices() -> Result<()> {
    let host = cpal::default_host();
    println!("Available output devices:");
    for dev in host.output_devices()? {
        println!("- {}", dev.name()?);
    }
    Ok(())
}

fn print_params(params: &[ParamSpec]) {
    for p in params {
        println!("      {:<11} {:>9.3}  [{}, {}]", p.name, p.default, p.min, p.max);
    }
}

fn list_formulas() {
    println!("Formulas:");
    for id in formula_ids() {
        let tag = if id.is_resettable() { "  (resettable)" } else { "" };
        println!("  {id}{tag}");
        print_params(id.params());
    }
    println!("Effect stages (processing order):");
    for k in StageKind::CANONICAL {
        println!("  {k}");
        print_params(k.params());
    }
}

fn pick_device(args: &Args) -> Result<cpal::Device> {
    let host = cpal::default_host();
    if let Some(name) = &args.device {
        for d in host.output_devices()? {
            if d.name()? == *name {
                return Ok(d);
            }
        }
        bail!("requested device not found: {name}");
    }
    host.default_output_device().ok_or_else(|| anyhow!("no default output device"))
}

fn choose_config(
    device: &cpal::Device,
    req_sr: Option<u32>,
    req_ch: Option<u16>,
) -> Result<cpal::SupportedStreamConfig> {
    if req_sr.is_none() && req_ch.is_none() {
        return Ok(device.default_output_config()?);
    }

    // Closest range wins; sample-rate mismatch weighs more than channel count.
    let mut best: Option<(u64, cpal::SupportedStreamConfigRange)> = None;
    for range in device.supported_output_configs()? {
        let ch = range.channels();
        let sr_min = range.min_sample_rate().0;
        let sr_max = range.max_sample_rate().0;

        let ch_pen = req_ch.map_or(0, |c| u64::from(ch.abs_diff(c)));
        let sr_pen = match req_sr {
            Some(sr) if (sr_min..=sr_max).contains(&sr) => 0,
            Some(sr) => u64::from(sr_min.abs_diff(sr).min(sr_max.abs_diff(sr))),
            None => 0,
        };

        let score = sr_pen.saturating_mul(1000) + ch_pen;
        if best.as_ref().map_or(true, |(s, _)| score < *s) {
            best = Some((score, range));
        }
    }

    let (_, range) = best.ok_or_else(|| anyhow!("no supported output configs"))?;
    let sr = match req_sr {
        Some(sr) => cpal::SampleRate(sr.clamp(range.min_sample_rate().0, range.max_sample_rate().0)),
        None => range.max_sample_rate(),
    };
    Ok(range.with_sample_rate(sr))
}

/// Patch file (or defaults) with the command-line overrides applied.
fn build_patch(args: &Args) -> Result<Patch> {
    let mut patch = match &args.patch {
        Some(path) => Patch::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Patch::default(),
    };
    if let Some(g) = args.gain {
        patch.master_gain = g;
    }
    for name in &args.enable {
        if name.parse::<FormulaId>().is_ok() {
            patch.formulas.entry(name.clone()).or_default().enabled = true;
        } else if name.parse::<StageKind>().is_ok() {
            patch.effects.entry(name.clone()).or_default().enabled = true;
        } else {
            bail!("`{name}` is neither a formula nor an effect stage (see --list-formulas)");
        }
    }
    if !patch.formulas.values().any(|s| s.enabled) {
        log::warn!("no formula enabled; output will be silent until one is (`enable <formula>`)");
    }
    Ok(patch)
}

fn make_session(args: &Args, patch: &Patch, sr: f32) -> Result<Session> {
    let mut session = Session::with_seed(sr, args.seed.unwrap_or(DEFAULT_SEED));
    session.load_patch(patch);
    if let Some(path) = &args.save_patch {
        session.to_patch().save(path).with_context(|| format!("saving {}", path.display()))?;
        log::info!("saved patch to {}", path.display());
    }
    Ok(session)
}

fn build_stream<T>(
    device: &cpal::Device,
    cfg: &cpal::StreamConfig,
    mut engine: Engine<Session>,
    commands: CommandReceiver,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::FromSample<f32> + cpal::SizedSample + Send + 'static,
{
    let sr = cfg.sample_rate.0 as f32;
    let channels = usize::from(cfg.channels).max(1);
    let mut mono = vec![0.0f32; CALLBACK_FRAMES];

    let stream = device.build_output_stream(
        cfg,
        move |output: &mut [T], _| {
            engine.generator_mut().drain_commands(&commands);
            for frames in output.chunks_mut(channels * CALLBACK_FRAMES) {
                let block = &mut mono[..frames.len() / channels];
                engine.render(sr, block);
                for (frame, &s) in frames.chunks_mut(channels).zip(block.iter()) {
                    let v: T = T::from_sample(s.clamp(-1.0, 1.0));
                    for ch in frame.iter_mut() {
                        *ch = v;
                    }
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

fn print_meter(meter: &MeterHandle, sr: f32) {
    let bins = 2048;
    let spectrum = meter.frequency_snapshot(bins);
    let (peak_bin, peak_db) = spectrum
        .iter()
        .enumerate()
        .skip(1)
        .fold((0, f32::MIN), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
    let rms = meter.rms();
    let rms_db = if rms > 0.0 { 20.0 * rms.log10() } else { f32::NEG_INFINITY };
    println!(
        "rms {rms_db:.1} dBFS | strongest partial ~{:.0} Hz at {peak_db:.1} dB",
        peak_bin as f32 * sr / (2 * bins) as f32
    );
}

const CONSOLE_HELP: &str = "\
commands:
  set <target> <key> <value>   target = formula id, stage id or `master`
  reset <target>               restart a chaotic/stateful formula or clear a stage
  enable <name> | disable <name>
  gain <value>                 master gain
  meter                        print level and strongest partial
  quit";

/// Reads console lines until `quit`. Returns when stdin closes.
fn run_console(tx: CommandSender, meter: MeterHandle, sr: f32, done: channel::Sender<()>) {
    println!("{CONSOLE_HELP}");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        match line.trim() {
            "" => {}
            "quit" | "exit" | "q" => {
                let _ = done.send(());
                return;
            }
            "help" | "?" => println!("{CONSOLE_HELP}"),
            "meter" => print_meter(&meter, sr),
            cmd => match tx.send_line(cmd) {
                Ok(c) => log::info!("{c:?}"),
                Err(e) => eprintln!("error: {e}"),
            },
        }
    }
    log::debug!("stdin closed; console stopped");
}

fn play(args: &Args, patch: &Patch) -> Result<()> {
    let device = pick_device(args)?;
    let sup_cfg = choose_config(&device, args.sample_rate, args.channels)?;
    let sample_format = sup_cfg.sample_format();
    let mut cfg = sup_cfg.config();
    if let Some(sr) = args.sample_rate {
        cfg.sample_rate = cpal::SampleRate(sr);
    }
    if let Some(ch) = args.channels {
        cfg.channels = ch;
    }
    let sr = cfg.sample_rate.0;

    let mut session = make_session(args, patch, sr as f32)?;
    let meter = session.meter();

    let recorder = match &args.record {
        Some(path) => {
            let tap = Tap::with_capacity(sr as usize * TAP_SECONDS);
            session.attach_tap(tap.clone());
            Some(Recorder::start(path, tap, sr)?)
        }
        None => None,
    };

    let queue = session.command_queue();
    let engine = Engine::new(session, sr as f32);

    log::info!("device: {}", device.name()?);
    log::info!("stream config: {cfg:?} (sample format {sample_format:?})");

    let err_fn = |e: cpal::StreamError| log::error!("stream error: {e}");
    let rx = queue.receiver();
    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &cfg, engine, rx, err_fn)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &cfg, engine, rx, err_fn)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &cfg, engine, rx, err_fn)?,
        other => bail!("unsupported device sample format: {other:?}"),
    };
    stream.play()?;

    let (done_tx, done_rx) = channel::bounded(1);
    {
        let tx = queue.sender();
        let meter = meter.clone();
        let done = done_tx.clone();
        thread::Builder::new()
            .name("console".into())
            .spawn(move || run_console(tx, meter, sr as f32, done))?;
    }

    // `done_tx` stays alive here so a closed stdin keeps playing until Ctrl+C or `--duration`.
    match args.duration {
        Some(d) => {
            let _ = done_rx.recv_timeout(Duration::from_secs_f32(d.max(0.0)));
        }
        None => {
            let _ = done_rx.recv();
        }
    }
    drop(done_tx);
    drop(stream);

    if let Some(r) = recorder {
        r.finish()?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.list_devices {
        return list_output_devices();
    }
    if args.list_formulas {
        list_formulas();
        return Ok(());
    }

    let patch = build_patch(&args)?;

    if let Some(path) = &args.render {
        let sr = args.sample_rate.unwrap_or(48_000);
        let mut session = make_session(&args, &patch, sr as f32)?;
        return render_offline(&mut session, path, args.duration.unwrap_or(10.0), args.channels.unwrap_or(2));
    }

    play(&args, &patch)
}
