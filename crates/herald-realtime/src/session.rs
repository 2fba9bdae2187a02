//! Per-socket message handling, independent of any WebSocket library.
//!
//! A transport calls [`accept`] once the handshake completes and
//! [`handle_text`] for every inbound text frame.

use herald_core::{
  connection::ConnectionId,
  event::UserId,
  protocol::{ClientMessage, ServerMessage, now_millis},
  store::NotificationStore,
};

use crate::{Result, registry::ConnectionRegistry, socket::SocketHandle};

/// Register `socket` for `user_id` and greet it with `connected`.
pub async fn accept<S: NotificationStore>(
  registry: &ConnectionRegistry<S>,
  user_id: Option<UserId>,
  socket: &SocketHandle,
) -> Result<ConnectionId> {
  let connection_id = registry.register(user_id, socket.clone()).await?;
  send_message(socket, &ServerMessage::Connected {
    connection_id: connection_id.clone(),
    timestamp:     now_millis(),
  })?;
  Ok(connection_id)
}

/// Serialise `message` and enqueue it. Returns whether the socket took it.
pub fn send_message(socket: &SocketHandle, message: &ServerMessage) -> Result<bool> {
  let text = serde_json::to_string(message)?;
  Ok(socket.send_text(text))
}

/// Handle one inbound text frame and send the reply, if any.
///
/// Any frame counts as activity. Malformed frames are logged and dropped;
/// they never close the socket.
pub async fn handle_text<S: NotificationStore>(
  registry: &ConnectionRegistry<S>,
  socket: &SocketHandle,
  text: &str,
) -> Option<ServerMessage> {
  registry.touch(socket).await;

  let message = match serde_json::from_str::<ClientMessage>(text) {
    Ok(m) => m,
    Err(e) => {
      tracing::warn!(socket = ?socket.id(), error = %e, "ignoring malformed client message");
      return None;
    }
  };

  let reply = match message {
    ClientMessage::Ping { timestamp } => {
      // Never answer with a time earlier than the client's own.
      ServerMessage::Pong { timestamp: now_millis().max(timestamp) }
    }
    ClientMessage::Subscribe { event_type } => {
      if !registry.subscribe(socket, event_type).await {
        return None;
      }
      ServerMessage::Subscribed { event_type, timestamp: now_millis() }
    }
    ClientMessage::Unsubscribe { event_type } => {
      if !registry.unsubscribe(socket, event_type).await {
        return None;
      }
      ServerMessage::Unsubscribed { event_type, timestamp: now_millis() }
    }
  };

  if let Err(e) = send_message(socket, &reply) {
    tracing::error!(error = %e, "failed to serialise reply");
  }
  Some(reply)
}

#[cfg(test)]
mod tests {
  use herald_core::event::EventType;
  use serde_json::Value;
  use tokio::sync::mpsc::UnboundedReceiver;

  use super::*;
  use crate::{
    Error,
    socket::{Frame, POLICY_VIOLATION},
    testing::sqlite_registry,
  };

  fn next_json(rx: &mut UnboundedReceiver<Frame>) -> Value {
    match rx.try_recv().unwrap() {
      Frame::Text(t) => serde_json::from_str(&t).unwrap(),
      other => panic!("expected text, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn accept_sends_connected_with_the_registered_id() {
    let registry = sqlite_registry().await;
    let (socket, mut rx) = SocketHandle::open();

    let id = accept(&registry, Some(UserId::from("u1")), &socket).await.unwrap();
    let hello = next_json(&mut rx);
    assert_eq!(hello["type"], "connected");
    assert_eq!(hello["connectionId"], id.as_str());
    assert!(hello["timestamp"].as_i64().unwrap() > 0);
  }

  #[tokio::test]
  async fn accept_without_user_closes_with_policy_violation() {
    let registry = sqlite_registry().await;
    let (socket, mut rx) = SocketHandle::open();

    let result = accept(&registry, None, &socket).await;
    assert!(matches!(result, Err(Error::Unauthorized)));
    assert!(matches!(rx.try_recv().unwrap(), Frame::Close { code: POLICY_VIOLATION, .. }));
    assert!(rx.try_recv().is_err());
  }

  #[tokio::test]
  async fn ping_gets_pong_not_before_client_time() {
    let registry = sqlite_registry().await;
    let (socket, mut rx) = SocketHandle::open();
    accept(&registry, Some(UserId::from("u1")), &socket).await.unwrap();
    next_json(&mut rx);

    let before = now_millis();
    handle_text(&registry, &socket, r#"{"type":"ping","timestamp":1}"#).await;
    let pong = next_json(&mut rx);
    assert_eq!(pong["type"], "pong");
    assert!(pong["timestamp"].as_i64().unwrap() >= before);

    let future = now_millis() + 60_000;
    let reply = handle_text(&registry, &socket, &format!(r#"{{"type":"ping","timestamp":{future}}}"#))
      .await;
    assert_eq!(reply, Some(ServerMessage::Pong { timestamp: future }));
  }

  #[tokio::test]
  async fn every_ping_shape_gets_exactly_one_pong() {
    let registry = sqlite_registry().await;
    let (socket, mut rx) = SocketHandle::open();
    accept(&registry, Some(UserId::from("u1")), &socket).await.unwrap();
    next_json(&mut rx);

    let before = now_millis();
    for ping in [
      r#"{"type":"ping","timestamp":1700000000000}"#,
      r#"{"type":"ping","timestamp":1700000000000.5}"#,
      r#"{"type":"ping","timestamp":null}"#,
      r#"{"type":"ping","timestamp":"1700000000000"}"#,
      r#"{"type":"ping"}"#,
    ] {
      let reply = handle_text(&registry, &socket, ping).await;
      assert!(matches!(reply, Some(ServerMessage::Pong { .. })), "no pong for {ping}");
      let pong = next_json(&mut rx);
      assert_eq!(pong["type"], "pong");
      assert!(pong["timestamp"].as_i64().unwrap() >= before);
      assert!(rx.try_recv().is_err());
    }

    let ahead = now_millis() + 60_000;
    let reply =
      handle_text(&registry, &socket, &format!(r#"{{"type":"ping","timestamp":{ahead}.4}}"#)).await;
    assert_eq!(reply, Some(ServerMessage::Pong { timestamp: ahead + 1 }));
  }

  #[tokio::test]
  async fn subscribe_and_unsubscribe_are_acknowledged() {
    let registry = sqlite_registry().await;
    let (socket, mut rx) = SocketHandle::open();
    accept(&registry, Some(UserId::from("u1")), &socket).await.unwrap();
    next_json(&mut rx);

    handle_text(&registry, &socket, r#"{"type":"subscribe","eventType":"risk_alert"}"#).await;
    let ack = next_json(&mut rx);
    assert_eq!(ack["type"], "subscribed");
    assert_eq!(ack["eventType"], "risk_alert");
    assert!(
      registry
        .subscriptions(&socket)
        .await
        .unwrap()
        .contains(&EventType::RiskAlert)
    );

    handle_text(&registry, &socket, r#"{"type":"unsubscribe","eventType":"risk_alert"}"#).await;
    assert_eq!(next_json(&mut rx)["type"], "unsubscribed");
    assert!(registry.subscriptions(&socket).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn malformed_frames_are_ignored_and_socket_stays_open() {
    let registry = sqlite_registry().await;
    let (socket, mut rx) = SocketHandle::open();
    accept(&registry, Some(UserId::from("u1")), &socket).await.unwrap();
    next_json(&mut rx);

    for junk in [
      "not json",
      r#"{"type":"shout"}"#,
      r#"{"type":"subscribe","eventType":"nonsense"}"#,
      r#"{"no_type":true}"#,
    ] {
      assert_eq!(handle_text(&registry, &socket, junk).await, None);
    }
    assert!(rx.try_recv().is_err());
    assert!(socket.is_open());
    assert!(registry.is_online(&UserId::from("u1")).await);
  }

  #[tokio::test]
  async fn subscribe_from_unregistered_socket_gets_no_reply() {
    let registry = sqlite_registry().await;
    let (socket, mut rx) = SocketHandle::open();

    let reply =
      handle_text(&registry, &socket, r#"{"type":"subscribe","eventType":"audit_result"}"#).await;
    assert_eq!(reply, None);
    assert!(rx.try_recv().is_err());
  }
}
