//! `herald` — command-line client for a Herald notification server.
//!
//! # Usage
//!
//! ```text
//! herald --user alice listen --subscribe risk_alert
//! herald --user alice unread
//! herald --user alice emit risk_alert --title "Bias drift" \
//!   --data '{"category":"bias","riskLevel":"high"}'
//! herald --config ~/.config/herald/cli.toml read-all
//! ```

mod client;
mod stream;

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use herald_core::event::{
  Event, EventId, EventInput, EventPayload, EventTarget, EventType, Severity,
};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "herald", about = "Command-line client for Herald notifications")]
struct Args {
  /// Path to a TOML config file (url, user, token, user_header, ws_path).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the Herald server (default: http://localhost:8080).
  #[arg(long, env = "HERALD_URL")]
  url: Option<String>,

  /// User to act as.
  #[arg(short, long, env = "HERALD_USER")]
  user: Option<String>,

  /// Bearer token, for servers in token identity mode.
  #[arg(long, env = "HERALD_TOKEN")]
  token: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Tail live notifications.
  Listen {
    /// Only receive these event types (server must use subscribed delivery).
    #[arg(short, long, value_parser = parse_event_type)]
    subscribe: Vec<EventType>,
    /// Print frames as raw JSON.
    #[arg(long)]
    raw: bool,
  },
  /// List unread events, newest first.
  Unread,
  /// Show the unread count.
  Count,
  /// List events, read or not, newest first.
  Events {
    #[arg(long, default_value_t = 20)]
    limit:  u32,
    #[arg(long, default_value_t = 0)]
    offset: u32,
  },
  /// Mark one event read.
  Read { id: i64 },
  /// Mark every unread event read.
  ReadAll,
  /// Record an event and push it to the target user.
  Emit {
    #[arg(value_parser = parse_event_type)]
    event_type:  EventType,
    #[arg(long)]
    title:       String,
    #[arg(long, default_value = "")]
    description: String,
    /// JSON payload for the event type.
    #[arg(long, default_value = "{}")]
    data:        String,
    #[arg(long, value_parser = parse_severity)]
    severity:    Option<Severity>,
    /// Target user; defaults to `--user`.
    #[arg(long)]
    to:          Option<String>,
  },
  /// Live connection stats.
  Stats,
}

fn parse_event_type(s: &str) -> Result<EventType, String> {
  EventType::parse(s).map_err(|e| e.to_string())
}

fn parse_severity(s: &str) -> Result<Severity, String> {
  Severity::parse(s).map_err(|e| e.to_string())
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:         String,
  #[serde(default)]
  user:        String,
  #[serde(default)]
  token:       Option<String>,
  #[serde(default)]
  user_header: Option<String>,
  #[serde(default)]
  ws_path:     Option<String>,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let user = args
    .user
    .or_else(|| (!file_cfg.user.is_empty()).then(|| file_cfg.user.clone()))
    .ok_or_else(|| anyhow!("no user given; pass --user or set it in the config file"))?;

  let api_config = ApiConfig {
    base_url: args
      .url
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://localhost:8080".to_string()),
    ws_path: file_cfg.ws_path.unwrap_or_else(|| "/ws".to_string()),
    user,
    user_header: file_cfg.user_header.unwrap_or_else(|| "x-user-id".to_string()),
    token: args.token.or(file_cfg.token),
  };

  let client = ApiClient::new(api_config)?;
  run(&client, args.command).await
}

async fn run(client: &ApiClient, command: Command) -> Result<()> {
  match command {
    Command::Listen { subscribe, raw } => {
      stream::listen(client.config(), &subscribe, raw).await?;
    }
    Command::Unread => print_events(&client.unread().await?),
    Command::Count => println!("{}", client.unread_count().await?),
    Command::Events { limit, offset } => print_events(&client.events(limit, offset).await?),
    Command::Read { id } => {
      let event = client.mark_read(EventId(id)).await?;
      println!("{}", format_event(&event));
    }
    Command::ReadAll => {
      let updated = client.mark_all_read().await?;
      println!("marked {updated} event(s) read");
    }
    Command::Emit { event_type, title, description, data, severity, to } => {
      let data = serde_json::from_str(&data).context("--data is not valid JSON")?;
      let payload = EventPayload::from_parts(event_type, data)
        .with_context(|| format!("--data does not fit a {event_type} payload"))?;
      let target = EventTarget::user(to.unwrap_or_else(|| client.config().user.clone()));
      let mut input = EventInput::new(payload, title, description).with_target(target);
      if let Some(severity) = severity {
        input = input.with_severity(severity);
      }
      let event = client.emit(&input).await?;
      println!("{}", format_event(&event));
    }
    Command::Stats => {
      let stats = client.stats().await?;
      println!("{}", serde_json::to_string_pretty(&stats)?);
    }
  }
  Ok(())
}

// ─── Output ───────────────────────────────────────────────────────────────────

fn print_events(events: &[Event]) {
  if events.is_empty() {
    println!("(none)");
  }
  for event in events {
    println!("{}", format_event(event));
  }
}

/// One line per event: `#id  time  [severity] type  title`.
pub(crate) fn format_event(event: &Event) -> String {
  let marker = if event.is_read { ' ' } else { '*' };
  format!(
    "{marker} #{:<6} {}  [{:<8}] {:<20} {}",
    event.id,
    event.created_at.format("%Y-%m-%d %H:%M"),
    event.severity.as_ref(),
    event.event_type.as_ref(),
    event.title,
  )
}

#[cfg(test)]
mod tests {
  use clap::CommandFactory as _;

  use super::*;

  #[test]
  fn cli_definition_is_consistent() { Args::command().debug_assert(); }

  #[test]
  fn emit_parses_type_and_severity() {
    let args = Args::try_parse_from([
      "herald", "--user", "u1", "emit", "risk_alert", "--title", "t", "--severity", "critical",
    ])
    .unwrap();
    match args.command {
      Command::Emit { event_type, severity, .. } => {
        assert_eq!(event_type, EventType::RiskAlert);
        assert_eq!(severity, Some(Severity::Critical));
      }
      other => panic!("unexpected command: {other:?}"),
    }
  }

  #[test]
  fn unknown_event_type_is_rejected() {
    let result = Args::try_parse_from(["herald", "emit", "gossip", "--title", "t"]);
    assert!(result.is_err());
  }
}
