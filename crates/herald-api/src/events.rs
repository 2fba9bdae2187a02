//! Handlers for `/events` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/events` | Body: [`EventInput`]; 201 + stored event, 503 if not stored |
//! | `GET`  | `/events` | `?userId` required; optional `limit` (≤ 200), `offset` |
//! | `GET`  | `/events/unread` | `?userId`; newest first |
//! | `GET`  | `/events/unread/count` | `?userId`; `{"count": n}` |
//! | `GET`  | `/events/{id}` | 404 if not found |
//! | `POST` | `/events/{id}/read` | Idempotent; 404 if not found |
//! | `POST` | `/events/read-all` | `?userId`; `{"updated": n}` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use herald_core::{
  event::{Event, EventId, EventInput, UserId},
  store::{NotificationStore, Page},
};
use herald_realtime::EventBroadcaster;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

// ─── Query types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
  pub user_id: String,
}

impl UserQuery {
  pub fn user(&self) -> Result<UserId, ApiError> {
    let id = self.user_id.trim();
    if id.is_empty() {
      return Err(ApiError::BadRequest("userId must not be empty".into()));
    }
    Ok(UserId::from(id))
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
  pub user_id: String,
  pub limit:   Option<u32>,
  #[serde(default)]
  pub offset:  u32,
}

#[derive(Debug, Serialize)]
pub struct CountBody {
  pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct UpdatedBody {
  pub updated: u64,
}

// ─── Record ───────────────────────────────────────────────────────────────────

/// `POST /events` — persists, then pushes to the target user's sockets.
pub async fn create<S>(
  State(broadcaster): State<EventBroadcaster<S>>,
  Json(input): Json<EventInput>,
) -> Result<impl IntoResponse, ApiError>
where
  S: NotificationStore + 'static,
{
  if input.title.trim().is_empty() {
    return Err(ApiError::BadRequest("title must not be empty".into()));
  }
  let event = broadcaster
    .record(input)
    .await
    .ok_or_else(|| ApiError::Unavailable("event could not be stored".into()))?;
  Ok((StatusCode::CREATED, Json(event)))
}

// ─── Pull queries ─────────────────────────────────────────────────────────────

/// `GET /events?userId=<id>[&limit=<n>][&offset=<n>]`
pub async fn list<S>(
  State(broadcaster): State<EventBroadcaster<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Event>>, ApiError>
where
  S: NotificationStore + 'static,
{
  let user = UserQuery { user_id: params.user_id }.user()?;
  let limit = params.limit.unwrap_or(Page::DEFAULT_LIMIT);
  let events = broadcaster
    .paginated_for(&user, limit, params.offset)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(events))
}

/// `GET /events/unread?userId=<id>`
pub async fn unread<S>(
  State(broadcaster): State<EventBroadcaster<S>>,
  Query(query): Query<UserQuery>,
) -> Result<Json<Vec<Event>>, ApiError>
where
  S: NotificationStore + 'static,
{
  let events = broadcaster
    .unread_for(&query.user()?)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(events))
}

/// `GET /events/unread/count?userId=<id>`
pub async fn unread_count<S>(
  State(broadcaster): State<EventBroadcaster<S>>,
  Query(query): Query<UserQuery>,
) -> Result<Json<CountBody>, ApiError>
where
  S: NotificationStore + 'static,
{
  let count = broadcaster
    .unread_count(&query.user()?)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(CountBody { count }))
}

/// `GET /events/{id}`
pub async fn get_one<S>(
  State(broadcaster): State<EventBroadcaster<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Event>, ApiError>
where
  S: NotificationStore + 'static,
{
  let event = broadcaster
    .get(EventId(id))
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("event {id} not found")))?;
  Ok(Json(event))
}

// ─── Read state ───────────────────────────────────────────────────────────────

/// `POST /events/{id}/read`
pub async fn mark_read<S>(
  State(broadcaster): State<EventBroadcaster<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Event>, ApiError>
where
  S: NotificationStore + 'static,
{
  let event = broadcaster
    .try_mark_read(EventId(id))
    .await
    .map_err(|e| {
      tracing::error!(event_id = id, error = %e, "failed to mark event read");
      ApiError::Unavailable(format!("event {id} could not be marked read"))
    })?
    .ok_or_else(|| ApiError::NotFound(format!("event {id} not found")))?;
  Ok(Json(event))
}

/// `POST /events/read-all?userId=<id>`
pub async fn mark_all_read<S>(
  State(broadcaster): State<EventBroadcaster<S>>,
  Query(query): Query<UserQuery>,
) -> Result<Json<UpdatedBody>, ApiError>
where
  S: NotificationStore + 'static,
{
  let updated = broadcaster.mark_all_read(&query.user()?).await;
  Ok(Json(UpdatedBody { updated }))
}
