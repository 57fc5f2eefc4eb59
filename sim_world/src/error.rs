//! Errors raised while loading or editing a world snapshot.

use thiserror::Error;

use crate::AgentId;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("unknown agent: {0}")]
    UnknownAgent(AgentId),

    #[error("position ({x}, {y}) is outside the {width}x{height} map")]
    OutOfBounds {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },

    #[error("snapshot decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("snapshot toml error: {0}")]
    TomlDecode(#[from] toml::de::Error),
}

pub type WorldResult<T> = Result<T, WorldError>;
