//! Server configuration errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid ws_path {0:?}: {1}")]
  WsPath(String, &'static str),

  #[error("invalid identity config: {0}")]
  Identity(String),

  #[error("invalid header name {0:?}")]
  HeaderName(String),
}
