//! Connection records — the durable bookkeeping side of a live socket.
//!
//! The in-memory registry is authoritative for delivery; these rows are a
//! best-effort mirror that outlives the process.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::UserId;

/// Opaque, process-unique identifier handed to a client on connect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
  /// A fresh `conn_<uuid>` identifier.
  pub fn generate() -> Self { Self(format!("conn_{}", Uuid::new_v4().simple())) }

  /// Wrap an identifier read back from storage.
  pub fn from_stored(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ConnectionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// One row of the `websocket_connections` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
  pub connection_id:   ConnectionId,
  pub user_id:         UserId,
  pub is_active:       bool,
  pub created_at:      DateTime<Utc>,
  /// Refreshed on client activity; the staleness sweep keys off this.
  pub last_seen_at:    DateTime<Utc>,
  pub disconnected_at: Option<DateTime<Utc>>,
}

impl ConnectionRecord {
  /// A freshly accepted, active connection.
  pub fn opened(connection_id: ConnectionId, user_id: UserId, at: DateTime<Utc>) -> Self {
    Self {
      connection_id,
      user_id,
      is_active: true,
      created_at: at,
      last_seen_at: at,
      disconnected_at: None,
    }
  }
}
