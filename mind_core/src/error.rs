use thiserror::Error;

use crate::atoms::AtomKeyError;

#[derive(Debug, Error)]
pub enum MindError {
    #[error("atom key error: {0}")]
    AtomKey(#[from] AtomKeyError),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("producer {name} aborted the tick: {reason}")]
    ProducerAborted { name: String, reason: String },
}

pub type MindResult<T> = Result<T, MindError>;

/// Failure reported by an orchestrator producer.
#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("producer {name} failed: {reason}")]
    Failed { name: String, reason: String },

    #[error("producer {name} panicked: {message}")]
    Panicked { name: String, message: String },

    #[error(transparent)]
    Mind(#[from] MindError),
}

impl ProducerError {
    pub fn failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
