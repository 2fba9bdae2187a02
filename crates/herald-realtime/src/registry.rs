//! [`ConnectionRegistry`] — which open sockets belong to which user.
//!
//! The in-memory maps are authoritative for live delivery. Every mutation is
//! mirrored to the [`NotificationStore`] on a best-effort basis: storage
//! failures are logged and swallowed, so the durable rows may briefly disagree
//! with memory until the next sweep.

use std::{
  collections::{HashMap, HashSet},
  sync::Arc,
};

use chrono::{TimeDelta, Utc};
use herald_core::{
  connection::{ConnectionId, ConnectionRecord},
  event::{EventType, UserId},
  store::NotificationStore,
};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::{
  Error, Result,
  socket::{POLICY_VIOLATION, SocketHandle, SocketId},
};

// ─── Maps ────────────────────────────────────────────────────────────────────

struct SocketEntry {
  handle:        SocketHandle,
  user_id:       UserId,
  connection_id: ConnectionId,
  subscriptions: HashSet<EventType>,
}

#[derive(Default)]
struct Maps {
  /// user → that user's open sockets. No entry is ever left empty.
  users:   HashMap<UserId, HashSet<SocketId>>,
  /// socket → owner and metadata.
  sockets: HashMap<SocketId, SocketEntry>,
}

impl Maps {
  fn handles_for(&self, user_id: &UserId) -> impl Iterator<Item = &SocketEntry> {
    self
      .users
      .get(user_id)
      .into_iter()
      .flatten()
      .filter_map(|id| self.sockets.get(id))
  }
}

/// Snapshot of the registry's size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
  pub users:   usize,
  pub sockets: usize,
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// Process-local registry of live sockets.
///
/// Construct one per process and hand clones to whatever accepts sockets and
/// whatever broadcasts. Cloning is cheap; clones share the same maps.
pub struct ConnectionRegistry<S> {
  store: Arc<S>,
  maps:  Arc<RwLock<Maps>>,
}

impl<S> Clone for ConnectionRegistry<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), maps: Arc::clone(&self.maps) }
  }
}

impl<S: NotificationStore> ConnectionRegistry<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store, maps: Arc::new(RwLock::new(Maps::default())) }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  // ── Lifecycle ─────────────────────────────────────────────────────────────

  /// Admit an open socket for `user_id`.
  ///
  /// With no user the socket is closed with code 1008 and nothing is
  /// recorded. A socket that is not open is refused without closing it.
  pub async fn register(
    &self,
    user_id: Option<UserId>,
    socket: SocketHandle,
  ) -> Result<ConnectionId> {
    let Some(user_id) = user_id else {
      socket.close(POLICY_VIOLATION, "unauthorized");
      return Err(Error::Unauthorized);
    };
    if !socket.is_open() {
      return Err(Error::NotOpen);
    }

    let connection_id = ConnectionId::generate();
    {
      let mut maps = self.maps.write().await;
      maps.users.entry(user_id.clone()).or_default().insert(socket.id());
      maps.sockets.insert(socket.id(), SocketEntry {
        handle:        socket,
        user_id:       user_id.clone(),
        connection_id: connection_id.clone(),
        subscriptions: HashSet::new(),
      });
    }

    tracing::info!(
      user_id = %user_id,
      connection_id = %connection_id,
      "websocket connection registered"
    );

    let record = ConnectionRecord::opened(connection_id.clone(), user_id, Utc::now());
    if let Err(e) = self.store.record_connection(record).await {
      tracing::error!(
        connection_id = %connection_id,
        error = %e,
        "failed to persist connection"
      );
    }

    Ok(connection_id)
  }

  /// Forget a socket. Safe to call any number of times; only the first call
  /// touches storage. Returns whether the socket was registered.
  pub async fn unregister(&self, socket: &SocketHandle) -> bool {
    socket.advance(crate::ReadyState::Closed);

    let removed = {
      let mut maps = self.maps.write().await;
      let entry = maps.sockets.remove(&socket.id());
      if let Some(entry) = &entry
        && let Some(set) = maps.users.get_mut(&entry.user_id)
      {
        set.remove(&socket.id());
        if set.is_empty() {
          maps.users.remove(&entry.user_id);
        }
      }
      entry
    };

    let Some(entry) = removed else {
      return false;
    };

    tracing::info!(
      user_id = %entry.user_id,
      connection_id = %entry.connection_id,
      "websocket connection unregistered"
    );

    if let Err(e) = self
      .store
      .deactivate_connection(entry.connection_id.clone(), Utc::now())
      .await
    {
      tracing::error!(
        connection_id = %entry.connection_id,
        error = %e,
        "failed to mark connection inactive"
      );
    }
    true
  }

  // ── Subscriptions ─────────────────────────────────────────────────────────

  /// Add `event_type` to the socket's subscriptions. Unknown sockets are
  /// ignored; returns whether the socket was known.
  pub async fn subscribe(&self, socket: &SocketHandle, event_type: EventType) -> bool {
    let mut maps = self.maps.write().await;
    match maps.sockets.get_mut(&socket.id()) {
      Some(entry) => {
        entry.subscriptions.insert(event_type);
        true
      }
      None => false,
    }
  }

  pub async fn unsubscribe(&self, socket: &SocketHandle, event_type: EventType) -> bool {
    let mut maps = self.maps.write().await;
    match maps.sockets.get_mut(&socket.id()) {
      Some(entry) => {
        entry.subscriptions.remove(&event_type);
        true
      }
      None => false,
    }
  }

  pub async fn subscriptions(&self, socket: &SocketHandle) -> Option<HashSet<EventType>> {
    let maps = self.maps.read().await;
    maps.sockets.get(&socket.id()).map(|e| e.subscriptions.clone())
  }

  // ── Liveness ──────────────────────────────────────────────────────────────

  /// Refresh the durable `last_seen_at` for the socket's connection.
  pub async fn touch(&self, socket: &SocketHandle) {
    let Some(connection_id) = self.connection_id(socket).await else {
      return;
    };
    if let Err(e) = self.store.touch_connection(connection_id.clone(), Utc::now()).await {
      tracing::warn!(
        connection_id = %connection_id,
        error = %e,
        "failed to refresh connection heartbeat"
      );
    }
  }

  /// Mark durable rows inactive after `stale_after` of silence. Live sockets
  /// are left alone. Returns the number of rows changed.
  pub async fn sweep_stale(&self, stale_after: TimeDelta) -> u64 {
    let now = Utc::now();
    match self
      .store
      .deactivate_stale_connections(now - stale_after, now)
      .await
    {
      Ok(0) => 0,
      Ok(n) => {
        tracing::info!(swept = n, "marked stale connections inactive");
        n
      }
      Err(e) => {
        tracing::error!(error = %e, "stale connection sweep failed");
        0
      }
    }
  }

  /// Close every registered socket, e.g. on shutdown. Sockets are
  /// unregistered by their own transport once the close completes.
  pub async fn close_all(&self, code: u16, reason: &str) -> usize {
    let maps = self.maps.read().await;
    maps
      .sockets
      .values()
      .filter(|e| e.handle.close(code, reason))
      .count()
  }

  // ── Lookup ────────────────────────────────────────────────────────────────

  pub async fn connection_id(&self, socket: &SocketHandle) -> Option<ConnectionId> {
    let maps = self.maps.read().await;
    maps.sockets.get(&socket.id()).map(|e| e.connection_id.clone())
  }

  /// Every socket currently registered for `user_id`.
  pub async fn sockets_for(&self, user_id: &UserId) -> Vec<SocketHandle> {
    let maps = self.maps.read().await;
    maps.handles_for(user_id).map(|e| e.handle.clone()).collect()
  }

  /// Sockets for `user_id` that want `event_type`: those subscribed to it,
  /// plus those with no subscriptions at all.
  pub async fn subscribers_for(
    &self,
    user_id: &UserId,
    event_type: EventType,
  ) -> Vec<SocketHandle> {
    let maps = self.maps.read().await;
    maps
      .handles_for(user_id)
      .filter(|e| e.subscriptions.is_empty() || e.subscriptions.contains(&event_type))
      .map(|e| e.handle.clone())
      .collect()
  }

  pub async fn all_sockets(&self) -> Vec<SocketHandle> {
    let maps = self.maps.read().await;
    maps.sockets.values().map(|e| e.handle.clone()).collect()
  }

  pub async fn is_online(&self, user_id: &UserId) -> bool {
    self.maps.read().await.users.contains_key(user_id)
  }

  pub async fn stats(&self) -> RegistryStats {
    let maps = self.maps.read().await;
    RegistryStats { users: maps.users.len(), sockets: maps.sockets.len() }
  }
}
