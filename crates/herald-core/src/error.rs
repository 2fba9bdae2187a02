//! Error types for `herald-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown event type: {0:?}")]
  UnknownEventType(String),

  #[error("unknown severity: {0:?}")]
  UnknownSeverity(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
