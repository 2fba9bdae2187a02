//! Shared fixtures for this crate's unit tests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use herald_core::{
  connection::{ConnectionId, ConnectionRecord},
  event::{Event, EventId, NewEvent, UserId},
  store::{NotificationStore, Page},
};
use herald_store_sqlite::SqliteStore;
use thiserror::Error;

use crate::{ConnectionRegistry, EventBroadcaster};

pub async fn sqlite_registry() -> ConnectionRegistry<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  ConnectionRegistry::new(Arc::new(store))
}

pub async fn sqlite_broadcaster() -> EventBroadcaster<SqliteStore> {
  EventBroadcaster::new(sqlite_registry().await)
}

#[derive(Debug, Error)]
#[error("storage offline")]
pub struct Offline;

/// A store whose every call fails.
pub struct FailingStore;

impl NotificationStore for FailingStore {
  type Error = Offline;

  async fn record_connection(&self, _: ConnectionRecord) -> Result<(), Offline> { Err(Offline) }
  async fn deactivate_connection(&self, _: ConnectionId, _: DateTime<Utc>) -> Result<bool, Offline> { Err(Offline) }
  async fn touch_connection(&self, _: ConnectionId, _: DateTime<Utc>) -> Result<(), Offline> { Err(Offline) }
  async fn deactivate_stale_connections(&self, _: DateTime<Utc>, _: DateTime<Utc>) -> Result<u64, Offline> { Err(Offline) }
  async fn active_connections(&self, _: UserId) -> Result<Vec<ConnectionRecord>, Offline> { Err(Offline) }
  async fn insert_event(&self, _: NewEvent) -> Result<Event, Offline> { Err(Offline) }
  async fn mark_event_read(&self, _: EventId, _: DateTime<Utc>) -> Result<Option<Event>, Offline> { Err(Offline) }
  async fn mark_all_read(&self, _: UserId, _: DateTime<Utc>) -> Result<u64, Offline> { Err(Offline) }
  async fn get_event(&self, _: EventId) -> Result<Option<Event>, Offline> { Err(Offline) }
  async fn unread_events(&self, _: UserId) -> Result<Vec<Event>, Offline> { Err(Offline) }
  async fn count_unread(&self, _: UserId) -> Result<u64, Offline> { Err(Offline) }
  async fn events_for_user(&self, _: UserId, _: Page) -> Result<Vec<Event>, Offline> { Err(Offline) }
}
