//! A running synthesizer: mix bus → effects chain → master.
//!
//! The session owns every voice and stage and is driven from the audio thread,
//! either directly through [`Session::process_block`] or as the `Generator`
//! inside an [`Engine`](crate::graph::Engine). Control threads talk to it only
//! through a [`CommandQueue`], a [`MeterHandle`] and an optional [`Tap`].
//!
//! The direct setters (`set_param`, `apply`, `load_patch`) are the synchronous
//! control path and may rebuild the reverb impulse in place.
//! [`Session::drain_commands`] is the audio-thread path and never does.

use std::str::FromStr;
use std::sync::Arc;

use strum::IntoEnumIterator;

use crate::chain::{EffectsChain, StageKind, StageSet};
use crate::control::{Command, CommandQueue, CommandReceiver, Target};
use crate::effects::reverb::{Impulse, ImpulseSource};
use crate::error::{Error, Result};
use crate::formulas::FormulaId;
use crate::graph::Generator;
use crate::master::{Master, MeterHandle, Tap};
use crate::mixer::{MixBus, MAX_BLOCK};
use crate::params::Assign;
use crate::patch::{Patch, Slot};
use crate::voice::Voice;

pub const DEFAULT_SEED: u64 = 0x00C4_A070_0E5E_ED01;

#[derive(Debug)]
pub struct Session {
    sr: f32,
    bus: MixBus,
    chain: EffectsChain,
    master: Master,
    block: Vec<f32>,
    faults: u64,
}

impl Session {
    pub fn new(sr: f32) -> Self {
        Self::with_seed(sr, DEFAULT_SEED)
    }

    /// Noise sources, Karplus excitation and the reverb IR all derive from `seed`.
    pub fn with_seed(sr: f32, seed: u64) -> Self {
        let sr = sr.max(1.0);
        Self {
            sr,
            bus: MixBus::new(sr, seed),
            chain: EffectsChain::new(sr, seed ^ 0x5EED),
            master: Master::new(sr),
            block: vec![0.0; MAX_BLOCK],
            faults: 0,
        }
    }

    pub fn from_patch(sr: f32, patch: &Patch) -> Self {
        let mut s = Self::new(sr);
        s.load_patch(patch);
        s
    }

    /// Apply a patch on top of the current state. Unknown names are logged and skipped.
    pub fn load_patch(&mut self, patch: &Patch) {
        for (name, slot) in &patch.formulas {
            let Ok(id) = FormulaId::from_str(name) else {
                log::warn!("patch: unknown formula `{name}` skipped");
                continue;
            };
            let voice = self.bus.voice_mut(id);
            for (key, &value) in &slot.params {
                if let Err(e) = voice.set_param(key, value) {
                    log::warn!("patch: {e}");
                }
            }
            voice.set_enabled(slot.enabled);
        }

        let mut enabled = StageSet::EMPTY;
        for (name, slot) in &patch.effects {
            let Ok(kind) = StageKind::from_str(name) else {
                log::warn!("patch: unknown effect `{name}` skipped");
                continue;
            };
            for (key, &value) in &slot.params {
                if !self.chain.set_param(kind, key, value).is_known() {
                    log::warn!("patch: `{kind}` has no parameter `{key}`");
                }
            }
            if slot.enabled {
                enabled.insert(kind);
            }
        }
        self.chain.rebuild(enabled);
        self.chain.reverb_mut().rebuild();

        self.master.set_param("gain", patch.master_gain);
        self.master.settle();

        log::info!(
            "session at {} Hz: formulas [{}], route {:?}",
            self.sr,
            self.bus.voices().filter(|v| v.is_enabled()).map(|v| v.id().name()).collect::<Vec<_>>().join(", "),
            self.chain.route()
        );
    }

    /// Export everything needed to rebuild this session's parameters.
    pub fn to_patch(&self) -> Patch {
        let mut patch = Patch { master_gain: self.master.gain(), ..Patch::default() };
        for v in self.bus.voices() {
            let slot = Slot {
                enabled: v.is_enabled(),
                params: v.params().iter().map(|(k, x)| (k.to_owned(), x)).collect(),
            };
            patch.formulas.insert(v.id().name().to_owned(), slot);
        }
        for k in StageKind::CANONICAL {
            let slot = Slot {
                enabled: self.chain.is_enabled(k),
                params: self.chain.params(k).iter().map(|(n, x)| (n.to_owned(), x)).collect(),
            };
            patch.effects.insert(k.name().to_owned(), slot);
        }
        patch
    }

    #[inline] pub fn sample_rate(&self) -> f32 { self.sr }
    #[inline] pub fn voice(&self, id: FormulaId) -> &Voice { self.bus.voice(id) }
    #[inline] pub fn chain(&self) -> &EffectsChain { &self.chain }
    #[inline] pub fn master(&self) -> &Master { &self.master }
    #[inline] pub fn meter(&self) -> MeterHandle { self.master.meter() }

    /// Non-finite samples replaced by silence so far.
    #[inline] pub fn faults(&self) -> u64 { self.faults }

    /// What a control thread needs to build reverb impulses for this session.
    pub fn impulse_source(&self) -> ImpulseSource {
        self.chain.reverb().source()
    }

    /// A command queue whose sender builds impulses matching this session.
    pub fn command_queue(&self) -> CommandQueue {
        CommandQueue::new(self.impulse_source())
    }

    pub fn attach_tap(&mut self, tap: Tap) {
        self.master.attach_tap(tap);
    }

    pub fn detach_tap(&mut self) -> Option<Tap> {
        self.master.detach_tap()
    }

    /// Assign and, for reverb `decay`, rebuild the impulse on this thread.
    pub fn set_param(&mut self, target: Target, key: &str, value: f32) -> Result<()> {
        self.assign(target, key, value)?;
        if target == Target::Stage(StageKind::Reverb) {
            self.chain.reverb_mut().rebuild();
        }
        Ok(())
    }

    fn assign(&mut self, target: Target, key: &str, value: f32) -> Result<()> {
        let assign = match target {
            Target::Formula(id) => return self.bus.voice_mut(id).set_param(key, value).map(|_| ()),
            Target::Stage(k) => self.chain.set_param(k, key, value),
            Target::Master => self.master.set_param(key, value),
        };
        match assign {
            Assign::Unknown => Err(Error::UnknownParam { target: target.to_string(), key: key.to_owned() }),
            _ => Ok(()),
        }
    }

    /// Formulas restart from their initial condition; stages drop their buffers.
    pub fn reset_target(&mut self, target: Target) -> Result<()> {
        match target {
            Target::Formula(id) => self.bus.voice_mut(id).reset(),
            Target::Stage(k) => {
                self.chain.stage_mut(k).clear();
                Ok(())
            }
            Target::Master => Err(Error::NotResettable(target.to_string())),
        }
    }

    /// Returns `false` when the stage was already in the requested state.
    pub fn set_stage_enabled(&mut self, kind: StageKind, on: bool) -> bool {
        self.chain.set_enabled(kind, on)
    }

    pub fn set_formula_enabled(&mut self, id: FormulaId, on: bool) {
        self.bus.voice_mut(id).set_enabled(on);
    }

    pub fn apply(&mut self, cmd: Command) -> Result<()> {
        match cmd {
            Command::SetParam { target, key, value } => self.set_param(target, key, value),
            Command::LoadImpulse(ir) => {
                self.install_impulse(ir);
                Ok(())
            }
            cmd => self.apply_cheap(cmd),
        }
    }

    /// Commands with no heavy work behind them.
    fn apply_cheap(&mut self, cmd: Command) -> Result<()> {
        match cmd {
            Command::SetParam { target, key, value } => self.assign(target, key, value),
            Command::LoadImpulse(_) => Ok(()),
            Command::Reset(target) => self.reset_target(target),
            Command::SetStageEnabled(kind, on) => {
                self.set_stage_enabled(kind, on);
                Ok(())
            }
            Command::SetFormulaEnabled(id, on) => {
                self.set_formula_enabled(id, on);
                Ok(())
            }
        }
    }

    /// Swap in a prebuilt reverb impulse. Returns the impulse that is no longer used.
    fn install_impulse(&mut self, ir: Arc<Impulse>) -> Arc<Impulse> {
        match self.chain.reverb_mut().install(ir) {
            Ok(old) => old,
            Err(refused) => {
                log::warn!("reverb impulse for {} Hz refused at {} Hz", refused.sample_rate(), self.sr);
                refused
            }
        }
    }

    /// Apply pending commands from the control side. Call at the top of every block.
    ///
    /// Only the newest impulse of a burst is installed, and replaced impulses go
    /// back through `rx` to be freed by the sender.
    pub fn drain_commands(&mut self, rx: &CommandReceiver) -> usize {
        let mut newest: Option<Arc<Impulse>> = None;
        // Commands were validated when built; nothing here can fail on lookup.
        let n = rx.drain(|cmd| match cmd {
            Command::LoadImpulse(ir) => {
                if let Some(older) = newest.replace(ir) {
                    rx.retire(older);
                }
            }
            cmd => {
                let _ = self.apply_cheap(cmd);
            }
        });
        if let Some(ir) = newest {
            let old = match self.chain.reverb_mut().install(ir) {
                Ok(old) | Err(old) => old,
            };
            rx.retire(old);
        }
        n
    }

    /// Render `out.len()` samples through bus, chain and master.
    pub fn process_block(&mut self, out: &mut [f32]) {
        for chunk in out.chunks_mut(MAX_BLOCK) {
            let bus = &mut self.block[..chunk.len()];
            self.bus.render(bus);
            for (o, &x) in chunk.iter_mut().zip(bus.iter()) {
                *o = self.master.process(self.chain.process(x));
            }
            self.master.flush_meter();
            self.faults += self.bus.recover_faults() as u64;
        }
    }

    fn set_sample_rate(&mut self, sr: f32) {
        let sr = sr.max(1.0);
        self.sr = sr;
        self.bus.set_sample_rate(sr);
        self.chain.set_sample_rate(sr);
        self.master.set_sample_rate(sr);
    }
}

impl Generator for Session {
    fn reset(&mut self, sr: f32) {
        if sr != self.sr {
            self.set_sample_rate(sr);
        }
    }

    fn next(&mut self) -> f32 {
        let mut one = [0.0];
        self.process_block(&mut one);
        one[0]
    }

    fn render(&mut self, out: &mut [f32]) {
        self.process_block(out);
    }
}

/// Every formula id, for listings.
pub fn formula_ids() -> impl Iterator<Item = FormulaId> {
    FormulaId::iter()
}
