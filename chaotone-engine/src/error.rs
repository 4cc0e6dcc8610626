//! Control-plane errors.
//!
//! Only the control layer (command parsing/validation, patch loading) returns
//! these. The per-sample path is infallible.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown formula `{0}`")]
    UnknownFormula(String),

    #[error("unknown effect stage `{0}`")]
    UnknownStage(String),

    #[error("unknown target `{0}` (expected a formula id, a stage id or `master`)")]
    UnknownTarget(String),

    #[error("`{target}` has no parameter `{key}`")]
    UnknownParam { target: String, key: String },

    #[error("`{0}` has no resettable state")]
    NotResettable(String),

    #[error("command queue is full")]
    QueueFull,

    #[error("cannot parse command: {0}")]
    Parse(String),

    #[error("patch is not valid JSON: {0}")]
    Patch(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
