//! Handlers for connection bookkeeping and live registry stats.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/connections` | `?userId`; durable rows still marked active |
//! | `GET`  | `/stats` | Live users and sockets in this process |

use axum::{
  Json,
  extract::{Query, State},
};
use herald_core::{connection::ConnectionRecord, store::NotificationStore};
use herald_realtime::{EventBroadcaster, RegistryStats};

use crate::{error::ApiError, events::UserQuery};

/// `GET /connections?userId=<id>`
pub async fn active<S>(
  State(broadcaster): State<EventBroadcaster<S>>,
  Query(query): Query<UserQuery>,
) -> Result<Json<Vec<ConnectionRecord>>, ApiError>
where
  S: NotificationStore + 'static,
{
  let rows = broadcaster
    .store()
    .active_connections(query.user()?)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(rows))
}

/// `GET /stats`
pub async fn stats<S>(State(broadcaster): State<EventBroadcaster<S>>) -> Json<RegistryStats>
where
  S: NotificationStore + 'static,
{
  Json(broadcaster.registry().stats().await)
}
