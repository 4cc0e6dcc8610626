//! Control plane: typed commands and the lock-free queue that carries them to
//! the audio thread.
//!
//! Commands are validated when they are built, on the control side. By the time
//! the audio thread sees one, every name in it has been resolved, so applying it
//! cannot fail for lookup reasons. Parameter keys are the `&'static str` names
//! from the parameter tables.
//!
//! Both queues are fixed-capacity rings allocated up front. A reverb `decay`
//! change is turned into a prebuilt impulse by the sender, and impulses the
//! audio thread replaces travel back to be freed on the control side.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crossbeam::queue::ArrayQueue;

use crate::chain::StageKind;
use crate::effects::reverb::{Impulse, ImpulseSource};
use crate::error::{Error, Result};
use crate::formulas::FormulaId;
use crate::master::MASTER_PARAMS;
use crate::params::{static_name, ParamSpec};

/// Most commands applied at the start of one audio block.
pub const MAX_COMMANDS_PER_BLOCK: usize = 64;

/// Commands that can wait in the queue at once.
pub const QUEUE_CAPACITY: usize = 1024;

/// Something that owns parameters.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    Formula(FormulaId),
    Stage(StageKind),
    Master,
}

impl Target {
    pub fn params(self) -> &'static [ParamSpec] {
        match self {
            Target::Formula(id) => id.params(),
            Target::Stage(k) => k.params(),
            Target::Master => &MASTER_PARAMS,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Target::Formula(id) => id.name(),
            Target::Stage(k) => k.name(),
            Target::Master => "master",
        }
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "master" {
            return Ok(Target::Master);
        }
        if let Ok(id) = FormulaId::from_str(s) {
            return Ok(Target::Formula(id));
        }
        StageKind::from_str(s)
            .map(Target::Stage)
            .map_err(|_| Error::UnknownTarget(s.to_owned()))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    SetParam { target: Target, key: &'static str, value: f32 },
    Reset(Target),
    SetStageEnabled(StageKind, bool),
    SetFormulaEnabled(FormulaId, bool),
    /// Reverb impulse for a new `decay`, built off the audio thread.
    LoadImpulse(Arc<Impulse>),
}

impl Command {
    pub fn set_param(target: Target, key: &str, value: f32) -> Result<Self> {
        let key = static_name(target.params(), key)
            .ok_or_else(|| Error::UnknownParam { target: target.to_string(), key: key.to_owned() })?;
        Ok(Command::SetParam { target, key, value })
    }

    /// Stages can always be cleared; formulas only when they have resettable state.
    pub fn reset(target: Target) -> Result<Self> {
        match target {
            Target::Formula(id) if !id.is_resettable() => Err(Error::NotResettable(target.to_string())),
            Target::Master => Err(Error::NotResettable(target.to_string())),
            _ => Ok(Command::Reset(target)),
        }
    }

    pub fn enable(target: Target, on: bool) -> Result<Self> {
        match target {
            Target::Formula(id) => Ok(Command::SetFormulaEnabled(id, on)),
            Target::Stage(k) => Ok(Command::SetStageEnabled(k, on)),
            Target::Master => Err(Error::Parse("`master` cannot be enabled or disabled".into())),
        }
    }
}

/// Text form used by the console:
///
/// ```text
/// set <target> <key> <value>
/// reset <target>
/// enable <formula|stage>
/// disable <formula|stage>
/// gain <value>
/// ```
impl FromStr for Command {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let number = |s: &str| -> Result<f32> {
            s.parse::<f32>().map_err(|_| Error::Parse(format!("`{s}` is not a number")))
        };
        match words.as_slice() {
            ["set", target, key, value] => Command::set_param(target.parse()?, key, number(*value)?),
            ["reset", target] => Command::reset(target.parse()?),
            ["enable", target] => Command::enable(target.parse()?, true),
            ["disable", target] => Command::enable(target.parse()?, false),
            ["gain", value] => Command::set_param(Target::Master, "gain", number(*value)?),
            [] => Err(Error::Parse("empty command".into())),
            _ => Err(Error::Parse(format!("unrecognised command `{}`", line.trim()))),
        }
    }
}

/// Multi-producer queue feeding one audio thread.
#[derive(Debug)]
pub struct CommandQueue {
    queue: Arc<ArrayQueue<Command>>,
    retired: Arc<ArrayQueue<Arc<Impulse>>>,
    impulses: ImpulseSource,
}

impl CommandQueue {
    /// `impulses` must match the receiving session's reverb
    /// (see [`Session::command_queue`](crate::session::Session::command_queue)).
    pub fn new(impulses: ImpulseSource) -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(QUEUE_CAPACITY)),
            // Every retired impulse arrived in a queued command, so this never fills.
            retired: Arc::new(ArrayQueue::new(QUEUE_CAPACITY)),
            impulses,
        }
    }

    /// Handle for control threads.
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            queue: Arc::clone(&self.queue),
            retired: Arc::clone(&self.retired),
            impulses: self.impulses,
        }
    }

    /// Handle for the audio thread.
    pub fn receiver(&self) -> CommandReceiver {
        CommandReceiver { queue: Arc::clone(&self.queue), retired: Arc::clone(&self.retired) }
    }
}

#[derive(Clone, Debug)]
pub struct CommandSender {
    queue: Arc<ArrayQueue<Command>>,
    retired: Arc<ArrayQueue<Arc<Impulse>>>,
    impulses: ImpulseSource,
}

impl CommandSender {
    /// Enqueue an already validated command. Never blocks, but a reverb `decay`
    /// change builds its impulse here before it is queued.
    pub fn send(&self, command: Command) -> Result<()> {
        self.collect_retired();
        let command = match command {
            Command::SetParam { target: Target::Stage(StageKind::Reverb), key: "decay", value } => {
                Command::LoadImpulse(self.impulses.build(value))
            }
            other => other,
        };
        log::debug!("queued {command:?}");
        self.queue.push(command).map_err(|_| Error::QueueFull)
    }

    /// Free impulses the audio thread has swapped out. Returns how many.
    pub fn collect_retired(&self) -> usize {
        let mut n = 0;
        while self.retired.pop().is_some() {
            n += 1;
        }
        n
    }

    /// Parse and enqueue one console line.
    pub fn send_line(&self, line: &str) -> Result<Command> {
        let cmd = Command::from_str(line)?;
        self.send(cmd.clone())?;
        Ok(cmd)
    }

    pub fn set_param(&self, target: &str, key: &str, value: f32) -> Result<()> {
        self.send(Command::set_param(target.parse()?, key, value)?)
    }

    pub fn reset(&self, target: &str) -> Result<()> {
        self.send(Command::reset(target.parse()?)?)
    }

    pub fn set_stage_enabled(&self, stage: &str, on: bool) -> Result<()> {
        let k = StageKind::from_str(stage).map_err(|_| Error::UnknownStage(stage.to_owned()))?;
        self.send(Command::SetStageEnabled(k, on))
    }

    pub fn set_formula_enabled(&self, formula: &str, on: bool) -> Result<()> {
        let id = FormulaId::from_str(formula).map_err(|_| Error::UnknownFormula(formula.to_owned()))?;
        self.send(Command::SetFormulaEnabled(id, on))
    }
}

#[derive(Debug)]
pub struct CommandReceiver {
    queue: Arc<ArrayQueue<Command>>,
    retired: Arc<ArrayQueue<Arc<Impulse>>>,
}

impl CommandReceiver {
    /// Apply up to [`MAX_COMMANDS_PER_BLOCK`] pending commands. Returns how many ran.
    pub fn drain<F: FnMut(Command)>(&self, mut apply: F) -> usize {
        let mut n = 0;
        while n < MAX_COMMANDS_PER_BLOCK {
            match self.queue.pop() {
                Some(cmd) => {
                    apply(cmd);
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    /// Hand an impulse back to the control side instead of freeing it here.
    pub fn retire(&self, ir: Arc<Impulse>) {
        let _ = self.retired.push(ir);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> CommandQueue {
        CommandQueue::new(ImpulseSource { sr: 8000.0, seed: 1 })
    }

    #[test]
    fn targets_parse() {
        assert_eq!("fm".parse::<Target>().unwrap(), Target::Formula(FormulaId::Fm));
        assert_eq!("delay".parse::<Target>().unwrap(), Target::Stage(StageKind::Delay));
        assert_eq!("master".parse::<Target>().unwrap(), Target::Master);
        assert!(matches!("organ".parse::<Target>(), Err(Error::UnknownTarget(_))));
    }

    #[test]
    fn console_lines_parse() {
        assert_eq!(
            "set lorenz rho 30".parse::<Command>().unwrap(),
            Command::SetParam { target: Target::Formula(FormulaId::Lorenz), key: "rho", value: 30.0 }
        );
        assert_eq!("reset karplus".parse::<Command>().unwrap(), Command::Reset(Target::Formula(FormulaId::Karplus)));
        assert_eq!("enable reverb".parse::<Command>().unwrap(), Command::SetStageEnabled(StageKind::Reverb, true));
        assert_eq!("disable pink".parse::<Command>().unwrap(), Command::SetFormulaEnabled(FormulaId::Pink, false));
        assert_eq!(
            "gain 0.5".parse::<Command>().unwrap(),
            Command::SetParam { target: Target::Master, key: "gain", value: 0.5 }
        );
    }

    #[test]
    fn invalid_commands_are_rejected_before_queueing() {
        assert!(matches!("set fm cutoff 3".parse::<Command>(), Err(Error::UnknownParam { .. })));
        assert!(matches!("set fm fc loud".parse::<Command>(), Err(Error::Parse(_))));
        assert!(matches!("reset fm".parse::<Command>(), Err(Error::NotResettable(_))));
        assert!(matches!("reset master".parse::<Command>(), Err(Error::NotResettable(_))));
        assert!(matches!("enable master".parse::<Command>(), Err(Error::Parse(_))));
        assert!(matches!("".parse::<Command>(), Err(Error::Parse(_))));
        assert!(matches!("dance".parse::<Command>(), Err(Error::Parse(_))));

        let q = queue();
        let tx = q.sender();
        assert!(tx.set_param("fm", "nope", 1.0).is_err());
        assert!(matches!(tx.set_stage_enabled("fm", true), Err(Error::UnknownStage(_))));
        assert!(matches!(tx.set_formula_enabled("reverb", true), Err(Error::UnknownFormula(_))));
        assert_eq!(q.receiver().pending(), 0);
    }

    #[test]
    fn drain_is_bounded_per_block() {
        let q = queue();
        let tx = q.sender();
        let rx = q.receiver();
        for i in 0..100 {
            tx.set_param("master", "gain", i as f32 / 100.0).unwrap();
        }
        let mut seen = Vec::new();
        assert_eq!(rx.drain(|c| seen.push(c)), MAX_COMMANDS_PER_BLOCK);
        assert_eq!(rx.drain(|c| seen.push(c)), 36);
        assert_eq!(rx.drain(|c| seen.push(c)), 0);
        // FIFO order survives the split.
        assert_eq!(seen[64], Command::SetParam { target: Target::Master, key: "gain", value: 0.64 });
    }

    #[test]
    fn full_queue_refuses_instead_of_growing() {
        let q = queue();
        let tx = q.sender();
        for _ in 0..QUEUE_CAPACITY {
            tx.set_formula_enabled("fm", true).unwrap();
        }
        assert!(matches!(tx.set_formula_enabled("fm", false), Err(Error::QueueFull)));
        assert_eq!(q.receiver().pending(), QUEUE_CAPACITY);
    }

    #[test]
    fn reverb_decay_is_sent_as_a_prebuilt_impulse() {
        let q = queue();
        let tx = q.sender();
        let rx = q.receiver();
        tx.set_param("reverb", "decay", 0.5).unwrap();
        tx.set_param("reverb", "mix", 0.5).unwrap();

        let mut seen = Vec::new();
        rx.drain(|c| seen.push(c));
        match &seen[0] {
            Command::LoadImpulse(ir) => {
                assert_eq!(ir.decay(), 0.5);
                assert_eq!(ir.sample_rate(), 8000.0);
            }
            other => panic!("expected an impulse, got {other:?}"),
        }
        assert_eq!(seen[1], Command::SetParam { target: Target::Stage(StageKind::Reverb), key: "mix", value: 0.5 });

        for c in seen {
            if let Command::LoadImpulse(ir) = c {
                rx.retire(ir);
            }
        }
        assert_eq!(tx.collect_retired(), 1);
        assert_eq!(tx.collect_retired(), 0);
    }
}
