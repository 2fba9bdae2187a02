//! The `NotificationStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `herald-store-sqlite`).
//! The realtime layer and the HTTP surfaces depend on this abstraction, not on
//! any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  connection::{ConnectionId, ConnectionRecord},
  event::{Event, EventId, NewEvent, UserId},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// A window into a newest-first event listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
  pub limit:  u32,
  pub offset: u32,
}

impl Page {
  pub const DEFAULT_LIMIT: u32 = 50;
  pub const MAX_LIMIT: u32 = 200;

  /// Clamp `limit` into `1..=MAX_LIMIT`.
  pub fn new(limit: u32, offset: u32) -> Self {
    Self { limit: limit.clamp(1, Self::MAX_LIMIT), offset }
  }
}

impl Default for Page {
  fn default() -> Self { Self::new(Self::DEFAULT_LIMIT, 0) }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Durable storage for connection bookkeeping and notification events.
///
/// Event rows are immutable except for the read flag, which only ever moves
/// from unread to read. All listings are ordered newest first.
///
/// All methods return `Send` futures so the trait can be used from spawned
/// tokio tasks and axum handlers.
pub trait NotificationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Connections ───────────────────────────────────────────────────────

  /// Insert a connection row.
  fn record_connection(
    &self,
    record: ConnectionRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Mark a connection inactive and stamp `disconnected_at`.
  ///
  /// Returns `false` if the row was missing or already inactive.
  fn deactivate_connection(
    &self,
    id: ConnectionId,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Refresh `last_seen_at`. A row previously swept inactive is revived,
  /// since activity proves the socket is still open.
  fn touch_connection(
    &self,
    id: ConnectionId,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Mark inactive every active row whose `last_seen_at` is before `cutoff`.
  /// Returns the number of rows changed.
  fn deactivate_stale_connections(
    &self,
    cutoff: DateTime<Utc>,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Active connection rows for a user, newest first.
  fn active_connections(
    &self,
    user_id: UserId,
  ) -> impl Future<Output = Result<Vec<ConnectionRecord>, Self::Error>> + Send + '_;

  // ── Events — writes ───────────────────────────────────────────────────

  /// Persist a new event; the store assigns `id` and `created_at`.
  fn insert_event(
    &self,
    input: NewEvent,
  ) -> impl Future<Output = Result<Event, Self::Error>> + Send + '_;

  /// Flip an event to read. Idempotent: an already-read event keeps its
  /// original `read_at`. Returns `None` if the event does not exist.
  fn mark_event_read(
    &self,
    id: EventId,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Event>, Self::Error>> + Send + '_;

  /// Mark every unread event of a user as read. Returns the number changed.
  fn mark_all_read(
    &self,
    user_id: UserId,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Events — reads ────────────────────────────────────────────────────

  fn get_event(
    &self,
    id: EventId,
  ) -> impl Future<Output = Result<Option<Event>, Self::Error>> + Send + '_;

  /// Unread events for a user, newest first.
  fn unread_events(
    &self,
    user_id: UserId,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + '_;

  fn count_unread(
    &self,
    user_id: UserId,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// All events for a user, newest first, windowed by `page`.
  fn events_for_user(
    &self,
    user_id: UserId,
    page: Page,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + '_;
}
