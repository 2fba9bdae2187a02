//! `POST /broadcast/organization/{id}`.
//!
//! Organization fan-out has no member directory behind it yet, so this always
//! answers 501.

use axum::{
  Json,
  extract::{Path, State},
};
use herald_core::store::NotificationStore;
use herald_realtime::EventBroadcaster;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct DeliveredBody {
  pub delivered: usize,
}

pub async fn organization<S>(
  State(broadcaster): State<EventBroadcaster<S>>,
  Path(organization_id): Path<String>,
  Json(message): Json<Value>,
) -> Result<Json<DeliveredBody>, ApiError>
where
  S: NotificationStore + 'static,
{
  let delivered = broadcaster.to_organization(&organization_id, &message).await?;
  Ok(Json(DeliveredBody { delivered }))
}
