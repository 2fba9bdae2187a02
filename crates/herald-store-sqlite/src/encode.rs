//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-precision RFC 3339 strings so that string
//! comparison in SQL matches chronological order. Booleans are stored as
//! `0`/`1`; payloads as compact JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use herald_core::{
  connection::{ConnectionId, ConnectionRecord},
  event::{Event, EventId, EventType, Severity, UserId},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list shared by every event query; must match [`RawEvent::from_row`].
pub const EVENT_COLUMNS: &str = "id, event_type, severity, title, description, data_json,
   user_id, organization_id, ai_system_id, is_read, created_at, read_at";

/// Raw values read directly from a `realtime_events` row.
pub struct RawEvent {
  pub id:              i64,
  pub event_type:      String,
  pub severity:        String,
  pub title:           String,
  pub description:     String,
  pub data_json:       String,
  pub user_id:         Option<String>,
  pub organization_id: Option<String>,
  pub ai_system_id:    Option<String>,
  pub is_read:         bool,
  pub created_at:      String,
  pub read_at:         Option<String>,
}

impl RawEvent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:              row.get(0)?,
      event_type:      row.get(1)?,
      severity:        row.get(2)?,
      title:           row.get(3)?,
      description:     row.get(4)?,
      data_json:       row.get(5)?,
      user_id:         row.get(6)?,
      organization_id: row.get(7)?,
      ai_system_id:    row.get(8)?,
      is_read:         row.get(9)?,
      created_at:      row.get(10)?,
      read_at:         row.get(11)?,
    })
  }

  pub fn into_event(self) -> Result<Event> {
    Ok(Event {
      id:              EventId(self.id),
      event_type:      EventType::parse(&self.event_type)?,
      severity:        Severity::parse(&self.severity)?,
      title:           self.title,
      description:     self.description,
      data:            serde_json::from_str(&self.data_json)?,
      user_id:         self.user_id.map(UserId::from),
      organization_id: self.organization_id,
      ai_system_id:    self.ai_system_id,
      is_read:         self.is_read,
      created_at:      decode_dt(&self.created_at)?,
      read_at:         decode_opt_dt(self.read_at)?,
    })
  }
}

/// Column list for connection queries; must match [`RawConnection::from_row`].
pub const CONNECTION_COLUMNS: &str =
  "connection_id, user_id, is_active, created_at, last_seen_at, disconnected_at";

/// Raw values read directly from a `websocket_connections` row.
pub struct RawConnection {
  pub connection_id:   String,
  pub user_id:         String,
  pub is_active:       bool,
  pub created_at:      String,
  pub last_seen_at:    String,
  pub disconnected_at: Option<String>,
}

impl RawConnection {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      connection_id:   row.get(0)?,
      user_id:         row.get(1)?,
      is_active:       row.get(2)?,
      created_at:      row.get(3)?,
      last_seen_at:    row.get(4)?,
      disconnected_at: row.get(5)?,
    })
  }

  pub fn into_record(self) -> Result<ConnectionRecord> {
    Ok(ConnectionRecord {
      connection_id:   ConnectionId::from_stored(self.connection_id),
      user_id:         UserId::from(self.user_id),
      is_active:       self.is_active,
      created_at:      decode_dt(&self.created_at)?,
      last_seen_at:    decode_dt(&self.last_seen_at)?,
      disconnected_at: decode_opt_dt(self.disconnected_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone as _;

  use super::*;

  #[test]
  fn encoded_timestamps_sort_chronologically() {
    let early = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let late = early + chrono::TimeDelta::milliseconds(1);
    assert!(encode_dt(early) < encode_dt(late));
    assert_eq!(encode_dt(early).len(), encode_dt(late).len());
  }

  #[test]
  fn timestamps_roundtrip_at_micro_precision() {
    let at = Utc.with_ymd_and_hms(2024, 6, 30, 23, 59, 59).unwrap()
      + chrono::TimeDelta::microseconds(123_456);
    assert_eq!(decode_dt(&encode_dt(at)).unwrap(), at);
  }
}
