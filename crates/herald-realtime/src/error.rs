//! Error type for `herald-realtime`.
//!
//! Storage failures never appear here: the realtime layer logs and swallows
//! them. These are the only failures a caller can observe.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The handshake carried no resolvable user; the socket was closed with
  /// policy-violation code 1008.
  #[error("unauthorized: no user could be resolved from the handshake")]
  Unauthorized,

  #[error("socket is not open")]
  NotOpen,

  #[error("{0} is not supported")]
  Unsupported(&'static str),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
