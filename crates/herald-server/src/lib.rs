//! HTTP and WebSocket front end for Herald.
//!
//! Serves the notification socket at a configurable path, the JSON API under
//! `/api`, and a `/health` probe, all backed by one [`EventBroadcaster`].

pub mod auth;
pub mod error;
pub mod handlers;

pub use error::Error;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{Router, routing::get};
use chrono::TimeDelta;
use herald_core::store::NotificationStore;
use herald_realtime::{DeliveryPolicy, EventBroadcaster, SweepConfig};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{IdentityConfig, IdentityResolver};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `HERALD_*` environment variables. Every field has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  pub store_path:          PathBuf,
  pub ws_path:             String,
  pub sweep_interval_secs: u64,
  pub stale_after_secs:    u64,
  pub delivery:            DeliveryPolicy,
  pub identity:            IdentityConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                "127.0.0.1".to_owned(),
      port:                8080,
      store_path:          PathBuf::from("herald.db"),
      ws_path:             "/ws".to_owned(),
      sweep_interval_secs: 30,
      stale_after_secs:    300,
      delivery:            DeliveryPolicy::default(),
      identity:            IdentityConfig::default(),
    }
  }
}

impl ServerConfig {
  pub fn sweep(&self) -> SweepConfig {
    SweepConfig {
      interval:    Duration::from_secs(self.sweep_interval_secs.max(1)),
      stale_after: TimeDelta::seconds(i64::try_from(self.stale_after_secs).unwrap_or(i64::MAX)),
    }
  }

  /// Reject settings that would produce a broken router.
  pub fn validate(&self) -> Result<(), Error> {
    let path = self.ws_path.as_str();
    if !path.starts_with('/') {
      return Err(Error::WsPath(path.to_owned(), "must start with '/'"));
    }
    if path == "/" || path == "/health" || path == "/api" || path.starts_with("/api/") {
      return Err(Error::WsPath(path.to_owned(), "clashes with a built-in route"));
    }
    Ok(())
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through the socket and health handlers.
pub struct AppState<S> {
  pub broadcaster: EventBroadcaster<S>,
  pub identity:    Arc<dyn IdentityResolver>,
  pub config:      Arc<ServerConfig>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      broadcaster: self.broadcaster.clone(),
      identity:    Arc::clone(&self.identity),
      config:      Arc::clone(&self.config),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: NotificationStore + 'static,
{
  let api = herald_api::api_router(state.broadcaster.clone());
  let ws_path = state.config.ws_path.clone();

  Router::new()
    .route(&ws_path, get(handlers::ws::upgrade::<S>))
    .route("/health", get(handlers::health))
    .with_state(state)
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use herald_realtime::ConnectionRegistry;
  use herald_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  use super::*;

  async fn make_state() -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let config = ServerConfig::default();
    AppState {
      broadcaster: EventBroadcaster::new(ConnectionRegistry::new(Arc::new(store))),
      identity:    config.identity.build().unwrap(),
      config:      Arc::new(config),
    }
  }

  async fn get_status(state: AppState<SqliteStore>, uri: &str) -> StatusCode {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    router(state).oneshot(req).await.unwrap().status()
  }

  #[tokio::test]
  async fn health_is_ok() {
    assert_eq!(get_status(make_state().await, "/health").await, StatusCode::OK);
  }

  #[tokio::test]
  async fn api_is_nested() {
    assert_eq!(get_status(make_state().await, "/api/stats").await, StatusCode::OK);
  }

  #[tokio::test]
  async fn plain_get_on_socket_path_is_refused() {
    let status = get_status(make_state().await, "/ws").await;
    assert!(status.is_client_error(), "status: {status}");
  }

  #[test]
  fn config_defaults() {
    let cfg = ServerConfig::default();
    assert_eq!(cfg.ws_path, "/ws");
    assert_eq!(cfg.sweep(), SweepConfig::default());
    assert_eq!(cfg.delivery, DeliveryPolicy::All);
    assert!(cfg.validate().is_ok());
  }

  #[test]
  fn config_from_partial_toml_keeps_defaults() {
    let settings = config::Config::builder()
      .add_source(config::File::from_str(
        r#"
          port = 9000
          delivery = "subscribed"

          [identity]
          mode = "token"
          tokens = [{ token = "abc", user_id = "u1" }]
        "#,
        config::FileFormat::Toml,
      ))
      .build()
      .unwrap();
    let cfg: ServerConfig = settings.try_deserialize().unwrap();

    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.delivery, DeliveryPolicy::Subscribed);
    assert!(matches!(cfg.identity, IdentityConfig::Token { ref tokens } if tokens.len() == 1));
  }

  #[test]
  fn ws_path_must_be_absolute_and_free() {
    for bad in ["ws", "/", "/health", "/api", "/api/ws"] {
      let cfg = ServerConfig { ws_path: bad.into(), ..ServerConfig::default() };
      assert!(matches!(cfg.validate(), Err(Error::WsPath(..))), "{bad} accepted");
    }
    let cfg = ServerConfig { ws_path: "/realtime".into(), ..ServerConfig::default() };
    assert!(cfg.validate().is_ok());
  }
}
