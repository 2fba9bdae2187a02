//! Transport-neutral handle to one live socket.
//!
//! A [`SocketHandle`] owns the sending half of an unbounded [`Frame`] queue and
//! a shared ready-state cell. The transport drains the queue in its own writer
//! task, so enqueueing never blocks and one slow socket never holds up another.

use std::sync::{
  Arc,
  atomic::{AtomicU8, AtomicU64, Ordering},
};

use tokio::sync::mpsc;

/// Close code for a normal, server-initiated closure.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close code for a refused handshake.
pub const POLICY_VIOLATION: u16 = 1008;

static NEXT_SOCKET_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique key for a socket in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(u64);

impl SocketId {
  fn next() -> Self { Self(NEXT_SOCKET_ID.fetch_add(1, Ordering::Relaxed)) }
}

/// WebSocket ready states. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ReadyState {
  Connecting = 0,
  Open       = 1,
  Closing    = 2,
  Closed     = 3,
}

impl ReadyState {
  fn from_u8(v: u8) -> Self {
    match v {
      0 => Self::Connecting,
      1 => Self::Open,
      2 => Self::Closing,
      _ => Self::Closed,
    }
  }
}

/// An outbound frame waiting for the transport's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
  Text(String),
  Close { code: u16, reason: String },
}

/// Cheaply cloneable handle to one socket.
#[derive(Debug, Clone)]
pub struct SocketHandle {
  id:    SocketId,
  state: Arc<AtomicU8>,
  tx:    mpsc::UnboundedSender<Frame>,
}

impl SocketHandle {
  /// A handle in `Connecting` state plus the queue its transport drains.
  pub fn new() -> (Self, mpsc::UnboundedReceiver<Frame>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = Self {
      id: SocketId::next(),
      state: Arc::new(AtomicU8::new(ReadyState::Connecting as u8)),
      tx,
    };
    (handle, rx)
  }

  /// A handle for a socket whose handshake already completed.
  pub fn open() -> (Self, mpsc::UnboundedReceiver<Frame>) {
    let (handle, rx) = Self::new();
    handle.advance(ReadyState::Open);
    (handle, rx)
  }

  pub fn id(&self) -> SocketId { self.id }

  pub fn state(&self) -> ReadyState { ReadyState::from_u8(self.state.load(Ordering::Acquire)) }

  pub fn is_open(&self) -> bool { self.state() == ReadyState::Open }

  /// Move to `next` unless the socket is already at or past it.
  pub fn advance(&self, next: ReadyState) {
    self.state.fetch_max(next as u8, Ordering::AcqRel);
  }

  /// Enqueue a text frame. Returns `false`, without error, when the socket is
  /// not open or its writer is gone.
  pub fn send_text(&self, text: impl Into<String>) -> bool {
    if !self.is_open() {
      return false;
    }
    self.tx.send(Frame::Text(text.into())).is_ok()
  }

  /// Start a server-initiated close. Returns `false` if a close is already
  /// under way.
  pub fn close(&self, code: u16, reason: impl Into<String>) -> bool {
    let previous = self
      .state
      .fetch_max(ReadyState::Closing as u8, Ordering::AcqRel);
    if ReadyState::from_u8(previous) >= ReadyState::Closing {
      return false;
    }
    self
      .tx
      .send(Frame::Close { code, reason: reason.into() })
      .is_ok()
  }
}
