//! Background task that marks silent connection rows inactive.

use std::time::Duration;

use chrono::TimeDelta;
use herald_core::store::NotificationStore;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::registry::ConnectionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepConfig {
  /// Time between sweeps.
  pub interval:    Duration,
  /// Rows silent for longer than this are marked inactive.
  pub stale_after: TimeDelta,
}

impl Default for SweepConfig {
  fn default() -> Self {
    Self { interval: Duration::from_secs(30), stale_after: TimeDelta::minutes(5) }
  }
}

/// Spawn the sweep loop. It runs until the returned handle is aborted.
pub fn spawn_sweeper<S>(registry: ConnectionRegistry<S>, config: SweepConfig) -> JoinHandle<()>
where
  S: NotificationStore + 'static,
{
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    tracing::debug!(
      interval_secs = config.interval.as_secs(),
      stale_after_secs = config.stale_after.num_seconds(),
      "connection sweeper started"
    );

    loop {
      ticker.tick().await;
      registry.sweep_stale(config.stale_after).await;
    }
  })
}
