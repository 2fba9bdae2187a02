//! The notification socket.
//!
//! Each upgraded socket gets a [`SocketHandle`] and two halves: a writer task
//! that drains the handle's frame queue onto the wire, and a reader loop that
//! feeds inbound text to the session handler. Either half ending tears the
//! socket down and unregisters it.

use axum::{
  extract::{
    State,
    ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
  },
  response::Response,
};
use futures::{
  SinkExt, StreamExt,
  stream::{SplitSink, SplitStream},
};
use herald_core::{event::UserId, store::NotificationStore};
use herald_realtime::{ConnectionRegistry, Frame, ReadyState, SocketHandle, session};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::{AppState, auth::Identity};

/// `GET <ws_path>` — upgrade, then hand the socket to the registry.
pub async fn upgrade<S>(
  ws: WebSocketUpgrade,
  State(state): State<AppState<S>>,
  Identity(user_id): Identity,
) -> Response
where
  S: NotificationStore + 'static,
{
  ws.on_upgrade(move |socket| serve_socket(state, user_id, socket))
}

async fn serve_socket<S>(state: AppState<S>, user_id: Option<UserId>, socket: WebSocket)
where
  S: NotificationStore + 'static,
{
  let registry = state.broadcaster.registry().clone();
  let (handle, frames) = SocketHandle::new();
  let (sink, stream) = socket.split();
  handle.advance(ReadyState::Open);

  let writer = tokio::spawn(write_frames(sink, frames));

  match session::accept(&registry, user_id, &handle).await {
    Ok(connection_id) => {
      read_frames(&registry, &handle, stream).await;
      tracing::debug!(connection_id = %connection_id, "socket reader finished");
    }
    Err(e) => {
      tracing::debug!(error = %e, "socket refused");
    }
  }

  registry.unregister(&handle).await;
  // Dropping the last sender lets the writer drain what is queued and stop.
  drop(handle);
  if let Err(e) = writer.await {
    tracing::warn!(error = %e, "socket writer task failed");
  }
}

async fn read_frames<S>(
  registry: &ConnectionRegistry<S>,
  handle: &SocketHandle,
  mut stream: SplitStream<WebSocket>,
) where
  S: NotificationStore + 'static,
{
  while let Some(result) = stream.next().await {
    match result {
      Ok(Message::Text(text)) => {
        session::handle_text(registry, handle, text.as_str()).await;
      }
      Ok(Message::Binary(_)) => {
        tracing::warn!(socket = ?handle.id(), "ignoring binary frame");
      }
      Ok(Message::Ping(_) | Message::Pong(_)) => registry.touch(handle).await,
      Ok(Message::Close(_)) => {
        handle.advance(ReadyState::Closing);
        break;
      }
      Err(e) => {
        tracing::debug!(socket = ?handle.id(), error = %e, "socket read error");
        break;
      }
    }
  }
}

async fn write_frames(
  mut sink: SplitSink<WebSocket, Message>,
  mut frames: UnboundedReceiver<Frame>,
) {
  while let Some(frame) = frames.recv().await {
    match frame {
      Frame::Text(text) => {
        if let Err(e) = sink.send(Message::Text(text.into())).await {
          tracing::debug!(error = %e, "socket write failed");
          break;
        }
      }
      Frame::Close { code, reason } => {
        let close = CloseFrame { code, reason: reason.into() };
        if let Err(e) = sink.send(Message::Close(Some(close))).await {
          tracing::debug!(error = %e, "failed to send close frame");
        }
        break;
      }
    }
  }
}
