//! herald-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `HERALD_*` environment variables, opens the SQLite store, and serves the
//! notification socket plus the JSON API over HTTP.
//!
//! Nested keys use a double underscore, e.g. `HERALD_IDENTITY__MODE=token`.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use herald_realtime::{ConnectionRegistry, EventBroadcaster, socket::NORMAL_CLOSURE, spawn_sweeper};
use herald_server::{AppState, ServerConfig};
use herald_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Herald realtime notification server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml", env = "HERALD_CONFIG")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("HERALD")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  server_cfg.validate().context("invalid configuration")?;

  let identity = server_cfg
    .identity
    .build()
    .context("failed to build identity resolver")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let registry = ConnectionRegistry::new(Arc::new(store));
  let broadcaster = EventBroadcaster::new(registry.clone()).with_policy(server_cfg.delivery);
  let sweeper = spawn_sweeper(registry.clone(), server_cfg.sweep());

  let state = AppState {
    broadcaster,
    identity,
    config: Arc::new(server_cfg.clone()),
  };

  let app = herald_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!(
    ws_path = %server_cfg.ws_path,
    delivery = ?server_cfg.delivery,
    "Listening on http://{address}"
  );
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal(registry))
    .await
    .context("server error")?;

  sweeper.abort();
  Ok(())
}

/// Resolve on Ctrl-C or SIGTERM, after closing every live socket.
async fn shutdown_signal(registry: ConnectionRegistry<SqliteStore>) {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut signal) => {
        signal.recv().await;
      }
      Err(e) => {
        tracing::error!(error = %e, "failed to listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    () = ctrl_c => {},
    () = terminate => {},
  }

  let closed = registry.close_all(NORMAL_CLOSURE, "server shutting down").await;
  tracing::info!(closed, "shutting down");
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
