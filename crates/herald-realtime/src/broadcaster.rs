//! [`EventBroadcaster`] — record events durably, then push them live.
//!
//! An event is stored before it is pushed. Pushes are best effort: each socket
//! send is an independent enqueue, and a dead socket is skipped.

use chrono::Utc;
use herald_core::{
  event::{
    AuditResult, CertificationIssued, ComplianceUpdate, CouncilDecision, EnforcementAction,
    Event, EventId, EventInput, EventPayload, EventTarget, FrameworkUpdate, RiskAlert, UserId,
    WatchdogReport,
  },
  protocol::EventPush,
  store::{NotificationStore, Page},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, registry::ConnectionRegistry, socket::SocketHandle};

/// Whether socket subscriptions narrow event pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryPolicy {
  /// Push every event to every open socket of the target user.
  #[default]
  All,
  /// Sockets that subscribed to anything only get the types they asked for.
  /// Sockets with no subscriptions still get everything.
  Subscribed,
}

pub struct EventBroadcaster<S> {
  registry: ConnectionRegistry<S>,
  policy:   DeliveryPolicy,
}

impl<S> Clone for EventBroadcaster<S> {
  fn clone(&self) -> Self {
    Self { registry: self.registry.clone(), policy: self.policy }
  }
}

/// Enqueue `text` on each socket; returns how many accepted it.
fn deliver(sockets: &[SocketHandle], text: &str) -> usize {
  sockets.iter().filter(|socket| socket.send_text(text)).count()
}

impl<S: NotificationStore> EventBroadcaster<S> {
  pub fn new(registry: ConnectionRegistry<S>) -> Self {
    Self { registry, policy: DeliveryPolicy::default() }
  }

  pub fn with_policy(mut self, policy: DeliveryPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn policy(&self) -> DeliveryPolicy { self.policy }

  pub fn registry(&self) -> &ConnectionRegistry<S> { &self.registry }

  pub fn store(&self) -> &S { self.registry.store() }

  // ── Recording ─────────────────────────────────────────────────────────────

  /// Persist `input`, then push it to the target user's open sockets.
  ///
  /// Returns `None` if the event could not be stored; the failure is logged
  /// and nothing is pushed.
  pub async fn record(&self, input: EventInput) -> Option<Event> {
    let event_type = input.event_type();
    if input.target.is_untargeted() {
      tracing::debug!(%event_type, "recording untargeted event; it will not be pushed");
    }

    let new_event = match input.into_new_event() {
      Ok(e) => e,
      Err(e) => {
        tracing::error!(%event_type, error = %e, "failed to encode event payload");
        return None;
      }
    };

    let event = match self.store().insert_event(new_event).await {
      Ok(e) => e,
      Err(e) => {
        tracing::error!(%event_type, error = %e, "failed to persist event");
        return None;
      }
    };

    if let Some(user_id) = &event.user_id {
      let delivered = self.push_event(user_id, &event).await;
      tracing::debug!(
        event_id = %event.id,
        %event_type,
        user_id = %user_id,
        delivered,
        "event recorded"
      );
    }

    Some(event)
  }

  async fn push_event(&self, user_id: &UserId, event: &Event) -> usize {
    let text = match serde_json::to_string(&EventPush::new(event)) {
      Ok(t) => t,
      Err(e) => {
        tracing::error!(event_id = %event.id, error = %e, "failed to serialise push");
        return 0;
      }
    };

    let sockets = match self.policy {
      DeliveryPolicy::All => self.registry.sockets_for(user_id).await,
      DeliveryPolicy::Subscribed => {
        self.registry.subscribers_for(user_id, event.event_type).await
      }
    };
    deliver(&sockets, &text)
  }

  // ── Typed entry points ────────────────────────────────────────────────────

  pub async fn compliance_update(
    &self,
    target: EventTarget,
    title: impl Into<String>,
    description: impl Into<String>,
    update: ComplianceUpdate,
  ) -> Option<Event> {
    let payload = EventPayload::ComplianceUpdate(update);
    self.record(EventInput::new(payload, title, description).with_target(target)).await
  }

  pub async fn enforcement_action(
    &self,
    target: EventTarget,
    title: impl Into<String>,
    description: impl Into<String>,
    action: EnforcementAction,
  ) -> Option<Event> {
    let payload = EventPayload::EnforcementAction(action);
    self.record(EventInput::new(payload, title, description).with_target(target)).await
  }

  pub async fn audit_result(
    &self,
    target: EventTarget,
    title: impl Into<String>,
    description: impl Into<String>,
    result: AuditResult,
  ) -> Option<Event> {
    let payload = EventPayload::AuditResult(result);
    self.record(EventInput::new(payload, title, description).with_target(target)).await
  }

  pub async fn risk_alert(
    &self,
    target: EventTarget,
    title: impl Into<String>,
    description: impl Into<String>,
    alert: RiskAlert,
  ) -> Option<Event> {
    let payload = EventPayload::RiskAlert(alert);
    self.record(EventInput::new(payload, title, description).with_target(target)).await
  }

  pub async fn certification_issued(
    &self,
    target: EventTarget,
    title: impl Into<String>,
    description: impl Into<String>,
    certification: CertificationIssued,
  ) -> Option<Event> {
    let payload = EventPayload::CertificationIssued(certification);
    self.record(EventInput::new(payload, title, description).with_target(target)).await
  }

  pub async fn framework_update(
    &self,
    target: EventTarget,
    title: impl Into<String>,
    description: impl Into<String>,
    update: FrameworkUpdate,
  ) -> Option<Event> {
    let payload = EventPayload::FrameworkUpdate(update);
    self.record(EventInput::new(payload, title, description).with_target(target)).await
  }

  pub async fn council_decision(
    &self,
    target: EventTarget,
    title: impl Into<String>,
    description: impl Into<String>,
    decision: CouncilDecision,
  ) -> Option<Event> {
    let payload = EventPayload::CouncilDecision(decision);
    self.record(EventInput::new(payload, title, description).with_target(target)).await
  }

  pub async fn watchdog_report(
    &self,
    target: EventTarget,
    title: impl Into<String>,
    description: impl Into<String>,
    report: WatchdogReport,
  ) -> Option<Event> {
    let payload = EventPayload::WatchdogReport(report);
    self.record(EventInput::new(payload, title, description).with_target(target)).await
  }

  // ── Read state ────────────────────────────────────────────────────────────

  /// Mark an event read. Idempotent. Ownership checks are the caller's job.
  ///
  /// Returns `None` if the event is missing or the update failed (logged).
  pub async fn mark_read(&self, id: EventId) -> Option<Event> {
    match self.try_mark_read(id).await {
      Ok(event) => event,
      Err(e) => {
        tracing::error!(event_id = %id, error = %e, "failed to mark event read");
        None
      }
    }
  }

  /// Like [`mark_read`](Self::mark_read), but a storage failure is returned
  /// instead of being read as a missing event.
  pub async fn try_mark_read(&self, id: EventId) -> Result<Option<Event>, S::Error> {
    self.store().mark_event_read(id, Utc::now()).await
  }

  /// Mark all of a user's unread events read; returns how many changed.
  pub async fn mark_all_read(&self, user_id: &UserId) -> u64 {
    match self.store().mark_all_read(user_id.clone(), Utc::now()).await {
      Ok(n) => n,
      Err(e) => {
        tracing::error!(user_id = %user_id, error = %e, "failed to mark events read");
        0
      }
    }
  }

  // ── Pull queries ──────────────────────────────────────────────────────────

  pub async fn unread_for(&self, user_id: &UserId) -> Result<Vec<Event>, S::Error> {
    self.store().unread_events(user_id.clone()).await
  }

  pub async fn paginated_for(
    &self,
    user_id: &UserId,
    limit: u32,
    offset: u32,
  ) -> Result<Vec<Event>, S::Error> {
    self.store().events_for_user(user_id.clone(), Page::new(limit, offset)).await
  }

  pub async fn unread_count(&self, user_id: &UserId) -> Result<u64, S::Error> {
    self.store().count_unread(user_id.clone()).await
  }

  pub async fn get(&self, id: EventId) -> Result<Option<Event>, S::Error> {
    self.store().get_event(id).await
  }

  // ── Transport broadcasts ──────────────────────────────────────────────────

  /// Push `message` to every open socket of one user.
  pub async fn to_user<M: Serialize>(&self, user_id: &UserId, message: &M) -> Result<usize> {
    let text = serde_json::to_string(message)?;
    let sockets = self.registry.sockets_for(user_id).await;
    Ok(deliver(&sockets, &text))
  }

  /// Push `message` to several users, one user at a time.
  pub async fn to_users<M: Serialize>(&self, user_ids: &[UserId], message: &M) -> Result<usize> {
    let text = serde_json::to_string(message)?;
    let mut delivered = 0;
    for user_id in user_ids {
      let sockets = self.registry.sockets_for(user_id).await;
      delivered += deliver(&sockets, &text);
    }
    Ok(delivered)
  }

  /// Push `message` to every open socket in this process.
  pub async fn to_all<M: Serialize>(&self, message: &M) -> Result<usize> {
    let text = serde_json::to_string(message)?;
    let sockets = self.registry.all_sockets().await;
    Ok(deliver(&sockets, &text))
  }

  /// Organization fan-out needs a member directory this service does not
  /// have; always fails with [`Error::Unsupported`].
  pub async fn to_organization<M: Serialize>(
    &self,
    organization_id: &str,
    _message: &M,
  ) -> Result<usize> {
    tracing::warn!(organization_id, "organization broadcast requested but not supported");
    Err(Error::Unsupported("organization broadcast"))
  }
}
