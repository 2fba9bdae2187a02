//! Live tail of the notification socket.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use futures::{SinkExt, StreamExt};
use herald_core::{
  event::{Event, EventType},
  protocol::{ClientMessage, now_millis},
};
use serde::Deserialize;
use serde_json::Value;
use tokio_tungstenite::{
  connect_async,
  tungstenite::{
    Message,
    client::IntoClientRequest,
    http::{HeaderName, HeaderValue, header},
  },
};

use crate::client::ApiConfig;

const PING_EVERY: Duration = Duration::from_secs(30);

/// Any server frame. Control frames carry no `data`; pushes do.
#[derive(Debug, Deserialize)]
struct Incoming {
  #[serde(rename = "type")]
  kind:          String,
  #[serde(default)]
  data:          Option<Value>,
  #[serde(default, rename = "connectionId")]
  connection_id: Option<String>,
}

/// Connect, subscribe to `types`, and print every frame until the server
/// closes the socket or the user hits Ctrl-C.
pub async fn listen(config: &ApiConfig, types: &[EventType], raw: bool) -> Result<()> {
  let url = config.ws_url()?;
  let mut request = url
    .as_str()
    .into_client_request()
    .with_context(|| format!("invalid socket URL {url}"))?;

  let headers = request.headers_mut();
  headers.insert(
    HeaderName::try_from(config.user_header.as_str()).context("invalid user header name")?,
    HeaderValue::from_str(&config.user).context("invalid user id")?,
  );
  if let Some(token) = &config.token {
    headers.insert(
      header::AUTHORIZATION,
      HeaderValue::from_str(&format!("Bearer {token}")).context("invalid token")?,
    );
  }

  let (ws, _) = connect_async(request)
    .await
    .with_context(|| format!("failed to connect to {url}"))?;
  let (mut write, mut read) = ws.split();
  tracing::debug!(%url, "socket connected");

  for event_type in types {
    let msg = serde_json::to_string(&ClientMessage::Subscribe { event_type: *event_type })?;
    write.send(Message::text(msg)).await.context("failed to subscribe")?;
  }

  let mut ping = tokio::time::interval(PING_EVERY);
  ping.tick().await;

  loop {
    tokio::select! {
      _ = ping.tick() => {
        let msg = serde_json::to_string(&ClientMessage::Ping { timestamp: now_millis() })?;
        write.send(Message::text(msg)).await.context("failed to ping")?;
      }
      _ = tokio::signal::ctrl_c() => {
        write.send(Message::Close(None)).await.ok();
        return Ok(());
      }
      frame = read.next() => {
        let Some(frame) = frame else { return Ok(()) };
        match frame.context("socket read failed")? {
          Message::Text(text) => print_frame(text.as_str(), raw),
          Message::Close(Some(close)) => {
            let code = u16::from(close.code);
            if code == 1008 {
              return Err(anyhow!("server refused the connection: {}", close.reason.as_str()));
            }
            eprintln!("closed by server ({code}): {}", close.reason.as_str());
            return Ok(());
          }
          Message::Close(None) => return Ok(()),
          _ => {}
        }
      }
    }
  }
}

fn print_frame(text: &str, raw: bool) {
  if raw {
    println!("{text}");
    return;
  }
  let incoming: Incoming = match serde_json::from_str(text) {
    Ok(i) => i,
    Err(e) => {
      tracing::warn!(error = %e, "unparseable frame from server");
      return;
    }
  };

  match (incoming.kind.as_str(), incoming.data) {
    ("connected", _) => {
      eprintln!("connected as {}", incoming.connection_id.unwrap_or_default());
    }
    ("pong", _) => {}
    ("subscribed" | "unsubscribed", _) => tracing::debug!(frame = text, "subscription ack"),
    (_, Some(data)) => match serde_json::from_value::<Event>(data) {
      Ok(event) => println!("{}", crate::format_event(&event)),
      Err(e) => tracing::warn!(error = %e, "push did not contain an event"),
    },
    (kind, None) => tracing::debug!(kind, "ignoring frame"),
  }
}
