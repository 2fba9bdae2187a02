//! JSON REST API for Herald.
//!
//! Exposes an axum [`Router`] backed by an [`EventBroadcaster`] over any
//! [`NotificationStore`]. Identity, TLS and transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", herald_api::api_router(broadcaster.clone()))
//! ```

pub mod broadcast;
pub mod connections;
pub mod error;
pub mod events;

use axum::{
  Router,
  routing::{get, post},
};
use herald_core::store::NotificationStore;
use herald_realtime::EventBroadcaster;

pub use error::ApiError;

/// Build a fully-materialised API router for `broadcaster`.
///
/// State is applied before returning, so the result nests into a parent
/// `Router<()>`.
pub fn api_router<S>(broadcaster: EventBroadcaster<S>) -> Router<()>
where
  S: NotificationStore + 'static,
{
  Router::new()
    // Events
    .route("/events", get(events::list::<S>).post(events::create::<S>))
    .route("/events/unread", get(events::unread::<S>))
    .route("/events/unread/count", get(events::unread_count::<S>))
    .route("/events/read-all", post(events::mark_all_read::<S>))
    .route("/events/{id}", get(events::get_one::<S>))
    .route("/events/{id}/read", post(events::mark_read::<S>))
    // Connections
    .route("/connections", get(connections::active::<S>))
    .route("/stats", get(connections::stats::<S>))
    // Broadcast
    .route("/broadcast/organization/{id}", post(broadcast::organization::<S>))
    .with_state(broadcaster)
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use chrono::{DateTime, Utc};
  use herald_core::{
    connection::{ConnectionId, ConnectionRecord},
    event::{Event, EventId, NewEvent, UserId},
    store::Page,
  };
  use herald_realtime::{ConnectionRegistry, Frame, SocketHandle};
  use herald_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  use super::*;

  async fn broadcaster() -> EventBroadcaster<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    EventBroadcaster::new(ConnectionRegistry::new(Arc::new(store)))
  }

  async fn call(
    b: &EventBroadcaster<SqliteStore>,
    method: &str,
    uri: &str,
    body: Option<Value>,
  ) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
      Some(v) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    api_router(b.clone()).oneshot(builder.body(body).unwrap()).await.unwrap()
  }

  async fn json_body(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  fn risk_input(user: &str, title: &str) -> Value {
    json!({
      "payload": {
        "eventType": "risk_alert",
        "data": { "category": "bias", "riskLevel": "high", "score": 77.5 }
      },
      "title": title,
      "description": "threshold crossed",
      "target": { "userId": user }
    })
  }

  async fn create(b: &EventBroadcaster<SqliteStore>, user: &str, title: &str) -> Value {
    let resp = call(b, "POST", "/events", Some(risk_input(user, title))).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    json_body(resp).await
  }

  // ── Record ───────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_returns_201_and_pushes_to_open_socket() {
    let b = broadcaster().await;
    let (socket, mut rx) = SocketHandle::open();
    b.registry().register(Some(UserId::from("u1")), socket).await.unwrap();

    let event = create(&b, "u1", "Bias risk").await;
    assert_eq!(event["eventType"], "risk_alert");
    assert_eq!(event["severity"], "warning");
    assert_eq!(event["isRead"], false);
    assert_eq!(event["data"]["riskLevel"], "high");

    let Frame::Text(text) = rx.try_recv().unwrap() else { panic!("expected text frame") };
    let push: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(push["type"], "risk_alert");
    assert_eq!(push["data"]["id"], event["id"]);
  }

  #[tokio::test]
  async fn create_honours_explicit_severity() {
    let b = broadcaster().await;
    let mut input = risk_input("u1", "Escalated");
    input["severity"] = json!("critical");
    let resp = call(&b, "POST", "/events", Some(input)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(json_body(resp).await["severity"], "critical");
  }

  #[tokio::test]
  async fn create_rejects_unknown_event_type() {
    let b = broadcaster().await;
    let body = json!({
      "payload": { "eventType": "gossip", "data": {} },
      "title": "nope"
    });
    let resp = call(&b, "POST", "/events", Some(body)).await;
    assert!(resp.status().is_client_error());
  }

  #[tokio::test]
  async fn create_rejects_blank_title() {
    let b = broadcaster().await;
    let resp = call(&b, "POST", "/events", Some(risk_input("u1", "  "))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  // ── Pull ─────────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn unread_list_and_count() {
    let b = broadcaster().await;
    create(&b, "u1", "first").await;
    create(&b, "u1", "second").await;
    create(&b, "u2", "elsewhere").await;

    let resp = call(&b, "GET", "/events/unread?userId=u1", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let list = json_body(resp).await;
    let titles: Vec<_> = list.as_array().unwrap().iter().map(|e| e["title"].clone()).collect();
    assert_eq!(titles, vec![json!("second"), json!("first")]);

    let resp = call(&b, "GET", "/events/unread/count?userId=u1", None).await;
    assert_eq!(json_body(resp).await, json!({ "count": 2 }));
  }

  #[tokio::test]
  async fn missing_user_id_is_rejected() {
    let b = broadcaster().await;
    let resp = call(&b, "GET", "/events/unread", None).await;
    assert!(resp.status().is_client_error());

    let resp = call(&b, "GET", "/events/unread?userId=", None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn paginated_listing_respects_limit_and_offset() {
    let b = broadcaster().await;
    for i in 0..5 {
      create(&b, "u1", &format!("e{i}")).await;
    }

    let resp = call(&b, "GET", "/events?userId=u1&limit=2&offset=1", None).await;
    let page = json_body(resp).await;
    let titles: Vec<_> = page.as_array().unwrap().iter().map(|e| e["title"].clone()).collect();
    assert_eq!(titles, vec![json!("e3"), json!("e2")]);

    let resp = call(&b, "GET", "/events?userId=u1", None).await;
    assert_eq!(json_body(resp).await.as_array().unwrap().len(), 5);
  }

  #[tokio::test]
  async fn get_one_and_404() {
    let b = broadcaster().await;
    let event = create(&b, "u1", "hello").await;
    let id = event["id"].as_i64().unwrap();

    let resp = call(&b, "GET", &format!("/events/{id}"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["title"], "hello");

    let resp = call(&b, "GET", "/events/9999", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(json_body(resp).await["error"].is_string());
  }

  // ── Read state ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn mark_read_is_idempotent_over_http() {
    let b = broadcaster().await;
    let id = create(&b, "u1", "x").await["id"].as_i64().unwrap();

    let first = json_body(call(&b, "POST", &format!("/events/{id}/read"), None).await).await;
    let second = json_body(call(&b, "POST", &format!("/events/{id}/read"), None).await).await;
    assert_eq!(first["isRead"], true);
    assert_eq!(first["readAt"], second["readAt"]);

    let resp = call(&b, "POST", "/events/424242/read", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  /// Reads pass through; marking an event read always fails.
  struct ReadsOnly(SqliteStore);

  #[derive(Debug, thiserror::Error)]
  enum ReadsOnlyError {
    #[error(transparent)]
    Sqlite(#[from] herald_store_sqlite::Error),
    #[error("database is read-only")]
    Refused,
  }

  impl NotificationStore for ReadsOnly {
    type Error = ReadsOnlyError;

    async fn record_connection(&self, r: ConnectionRecord) -> Result<(), ReadsOnlyError> {
      Ok(self.0.record_connection(r).await?)
    }
    async fn deactivate_connection(&self, id: ConnectionId, at: DateTime<Utc>) -> Result<bool, ReadsOnlyError> {
      Ok(self.0.deactivate_connection(id, at).await?)
    }
    async fn touch_connection(&self, id: ConnectionId, at: DateTime<Utc>) -> Result<(), ReadsOnlyError> {
      Ok(self.0.touch_connection(id, at).await?)
    }
    async fn deactivate_stale_connections(&self, cutoff: DateTime<Utc>, at: DateTime<Utc>) -> Result<u64, ReadsOnlyError> {
      Ok(self.0.deactivate_stale_connections(cutoff, at).await?)
    }
    async fn active_connections(&self, user: UserId) -> Result<Vec<ConnectionRecord>, ReadsOnlyError> {
      Ok(self.0.active_connections(user).await?)
    }
    async fn insert_event(&self, input: NewEvent) -> Result<Event, ReadsOnlyError> {
      Ok(self.0.insert_event(input).await?)
    }
    async fn mark_event_read(&self, _: EventId, _: DateTime<Utc>) -> Result<Option<Event>, ReadsOnlyError> {
      Err(ReadsOnlyError::Refused)
    }
    async fn mark_all_read(&self, user: UserId, at: DateTime<Utc>) -> Result<u64, ReadsOnlyError> {
      Ok(self.0.mark_all_read(user, at).await?)
    }
    async fn get_event(&self, id: EventId) -> Result<Option<Event>, ReadsOnlyError> {
      Ok(self.0.get_event(id).await?)
    }
    async fn unread_events(&self, user: UserId) -> Result<Vec<Event>, ReadsOnlyError> {
      Ok(self.0.unread_events(user).await?)
    }
    async fn count_unread(&self, user: UserId) -> Result<u64, ReadsOnlyError> {
      Ok(self.0.count_unread(user).await?)
    }
    async fn events_for_user(&self, user: UserId, page: Page) -> Result<Vec<Event>, ReadsOnlyError> {
      Ok(self.0.events_for_user(user, page).await?)
    }
  }

  #[tokio::test]
  async fn failed_mark_read_is_503_not_404() {
    let store = ReadsOnly(SqliteStore::open_in_memory().await.unwrap());
    let b = EventBroadcaster::new(ConnectionRegistry::new(Arc::new(store)));
    let request = |method: &str, uri: &str, body: Option<Value>| {
      let mut builder = Request::builder().method(method).uri(uri);
      let body = match body {
        Some(v) => {
          builder = builder.header(header::CONTENT_TYPE, "application/json");
          Body::from(v.to_string())
        }
        None => Body::empty(),
      };
      builder.body(body).unwrap()
    };

    let resp = api_router(b.clone())
      .oneshot(request("POST", "/events", Some(risk_input("u1", "x"))))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let id = json_body(resp).await["id"].as_i64().unwrap();

    let resp = api_router(b.clone())
      .oneshot(request("POST", &format!("/events/{id}/read"), None))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(json_body(resp).await["error"].is_string());
    assert_eq!(b.unread_count(&UserId::from("u1")).await.unwrap(), 1);
  }

  #[tokio::test]
  async fn read_all_reports_updated_count() {
    let b = broadcaster().await;
    create(&b, "u1", "a").await;
    create(&b, "u1", "b").await;

    let resp = call(&b, "POST", "/events/read-all?userId=u1", None).await;
    assert_eq!(json_body(resp).await, json!({ "updated": 2 }));

    let resp = call(&b, "GET", "/events/unread/count?userId=u1", None).await;
    assert_eq!(json_body(resp).await, json!({ "count": 0 }));
  }

  // ── Connections and stats ────────────────────────────────────────────────────

  #[tokio::test]
  async fn connections_and_stats_reflect_registry() {
    let b = broadcaster().await;
    let (socket, _rx) = SocketHandle::open();
    let id = b.registry().register(Some(UserId::from("u1")), socket.clone()).await.unwrap();

    let rows = json_body(call(&b, "GET", "/connections?userId=u1", None).await).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["connectionId"], id.as_str());
    assert_eq!(rows[0]["isActive"], true);

    let stats = json_body(call(&b, "GET", "/stats", None).await).await;
    assert_eq!(stats, json!({ "users": 1, "sockets": 1 }));

    b.registry().unregister(&socket).await;
    let rows = json_body(call(&b, "GET", "/connections?userId=u1", None).await).await;
    assert!(rows.as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn organization_broadcast_is_not_implemented() {
    let b = broadcaster().await;
    let resp = call(
      &b,
      "POST",
      "/broadcast/organization/org-1",
      Some(json!({ "type": "notice" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
  }
}
