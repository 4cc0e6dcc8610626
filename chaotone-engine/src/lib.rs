//! Chaotone Engine: formula generators, effect stages, routing and control.
//!
//! Crate layout:
//! - [`graph`]    : `Generator` trait and `Engine<G>` wrapper
//! - [`params`]   : parameter tables and live parameter sets
//! - [`nodes`]    : phasors, LFOs, smoothers
//! - [`formulas`] : the 18 generator formulas
//! - [`voice`]    : one running formula with its own clock
//! - [`mixer`]    : mix bus over every voice
//! - [`effects`]  : filter, chorus, phaser, delay, reverb, limiter
//! - [`chain`]    : canonical stage order and routing
//! - [`master`]   : master gain, meter and recorder tap
//! - [`control`]  : typed commands and the lock-free command queue
//! - [`patch`]    : JSON patches
//! - [`session`]  : everything wired together
//!
//! Nothing on the per-sample path allocates or locks. Control threads reach the
//! audio thread only through the command queue; readers see the output through
//! [`MeterHandle`] and [`Tap`].

pub mod chain;
pub mod control;
pub mod effects;
pub mod error;
pub mod formulas;
pub mod graph;
pub mod master;
pub mod mixer;
pub mod nodes;
pub mod params;
pub mod patch;
pub mod session;
pub mod voice;

// Re-export some commonly used items to make downstream imports ergonomic.
pub use chain::{EffectsChain, StageKind, StageSet};
pub use control::{Command, CommandQueue, CommandReceiver, CommandSender, Target};
pub use error::{Error, Result};
pub use formulas::FormulaId;
pub use graph::{Engine, Generator};
pub use master::{MeterHandle, Tap, METER_CAPACITY};
pub use patch::{Patch, Slot};
pub use session::Session;
