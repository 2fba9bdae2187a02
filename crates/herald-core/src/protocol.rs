//! JSON wire protocol spoken over the notification socket.
//!
//! Every frame is a JSON object with a `type` discriminant. Timestamps are
//! Unix epoch milliseconds.

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{
  connection::ConnectionId,
  event::{Event, EventType},
};

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 { Utc::now().timestamp_millis() }

/// Messages a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
  Ping {
    #[serde(default, deserialize_with = "lenient_millis")]
    timestamp: i64,
  },
  Subscribe {
    #[serde(rename = "eventType")]
    event_type: EventType,
  },
  Unsubscribe {
    #[serde(rename = "eventType")]
    event_type: EventType,
  },
}

/// Read a client timestamp without rejecting the frame. Fractions round up;
/// `null`, strings and other non-numbers read as 0.
fn lenient_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
  let value = Option::<Value>::deserialize(deserializer)?;
  Ok(match value {
    Some(Value::Number(n)) => match n.as_i64() {
      Some(i) => i,
      None => n.as_f64().map_or(0, |f| f.ceil() as i64),
    },
    _ => 0,
  })
}

/// Control messages the server sends. Event pushes use [`EventPush`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
  Connected {
    #[serde(rename = "connectionId")]
    connection_id: ConnectionId,
    timestamp:     i64,
  },
  Pong {
    timestamp: i64,
  },
  Subscribed {
    #[serde(rename = "eventType")]
    event_type: EventType,
    timestamp:  i64,
  },
  Unsubscribed {
    #[serde(rename = "eventType")]
    event_type: EventType,
    timestamp:  i64,
  },
}

/// A pushed event: `{"type": "<event_type>", "data": {...}, "timestamp": ...}`.
///
/// The `type` tag varies with the event, so this is not a [`ServerMessage`]
/// variant.
#[derive(Debug, Serialize)]
pub struct EventPush<'a> {
  #[serde(rename = "type")]
  pub event_type: EventType,
  pub data:       &'a Event,
  pub timestamp:  i64,
}

impl<'a> EventPush<'a> {
  pub fn new(event: &'a Event) -> Self {
    Self { event_type: event.event_type, data: event, timestamp: now_millis() }
  }
}
