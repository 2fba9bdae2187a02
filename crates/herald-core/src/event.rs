//! Event types — durable notification records and their typed inputs.
//!
//! An event is immutable once stored, apart from the one-way unread → read
//! transition. Callers build an [`EventInput`] from a strongly typed
//! [`EventPayload`]; the payload is flattened to opaque JSON at the storage
//! boundary.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::{Error, Result};

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// Storage-assigned event identifier.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EventId(pub i64);

impl fmt::Display for EventId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

/// Opaque identifier of an application user.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for UserId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for UserId {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<String> for UserId {
  fn from(s: String) -> Self { Self(s) }
}

// ─── Classification ──────────────────────────────────────────────────────────

/// The fixed set of event kinds the service knows how to deliver.
///
/// The snake_case spelling is used on the wire, in the `type` field of pushed
/// messages, and in the `event_type` column.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventType {
  ComplianceUpdate,
  EnforcementAction,
  AuditResult,
  RiskAlert,
  CertificationIssued,
  FrameworkUpdate,
  CouncilDecision,
  WatchdogReport,
}

impl EventType {
  /// Severity applied when the caller does not pick one.
  pub fn default_severity(self) -> Severity {
    match self {
      Self::EnforcementAction => Severity::Critical,
      Self::RiskAlert | Self::WatchdogReport => Severity::Warning,
      Self::ComplianceUpdate
      | Self::AuditResult
      | Self::CertificationIssued
      | Self::FrameworkUpdate
      | Self::CouncilDecision => Severity::Info,
    }
  }

  /// Parse the snake_case discriminant stored in the database.
  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s).map_err(|_| Error::UnknownEventType(s.to_owned()))
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
  #[default]
  Info,
  Warning,
  Critical,
}

impl Severity {
  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s).map_err(|_| Error::UnknownSeverity(s.to_owned()))
  }
}

// ─── Typed payloads ──────────────────────────────────────────────────────────

/// A compliance score changed for a framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceUpdate {
  pub framework:      String,
  pub score:          f64,
  #[serde(default)]
  pub previous_score: Option<f64>,
  /// Free-form status label, e.g. `"compliant"` or `"at_risk"`.
  pub status:         String,
}

/// A regulator or internal body took action against a system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnforcementAction {
  pub action:   String,
  pub reason:   String,
  #[serde(default)]
  pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
  pub audit_id: String,
  pub passed:   bool,
  #[serde(default)]
  pub score:    Option<f64>,
  #[serde(default)]
  pub findings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAlert {
  pub category:       String,
  /// Free-form level label, e.g. `"high"`.
  pub risk_level:     String,
  #[serde(default)]
  pub score:          Option<f64>,
  #[serde(default)]
  pub recommendation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificationIssued {
  pub certification_id: String,
  pub framework:        String,
  #[serde(default)]
  pub expires_at:       Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameworkUpdate {
  pub framework: String,
  pub version:   String,
  #[serde(default)]
  pub summary:   String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouncilDecision {
  pub decision_id:   String,
  pub outcome:       String,
  #[serde(default)]
  pub votes_for:     u32,
  #[serde(default)]
  pub votes_against: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchdogReport {
  pub report_id: String,
  pub category:  String,
  pub status:    String,
}

/// The typed body of an event. The variant fixes the [`EventType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
  ComplianceUpdate(ComplianceUpdate),
  EnforcementAction(EnforcementAction),
  AuditResult(AuditResult),
  RiskAlert(RiskAlert),
  CertificationIssued(CertificationIssued),
  FrameworkUpdate(FrameworkUpdate),
  CouncilDecision(CouncilDecision),
  WatchdogReport(WatchdogReport),
}

impl EventPayload {
  /// Must agree with the serde tags above.
  pub fn event_type(&self) -> EventType {
    match self {
      Self::ComplianceUpdate(_) => EventType::ComplianceUpdate,
      Self::EnforcementAction(_) => EventType::EnforcementAction,
      Self::AuditResult(_) => EventType::AuditResult,
      Self::RiskAlert(_) => EventType::RiskAlert,
      Self::CertificationIssued(_) => EventType::CertificationIssued,
      Self::FrameworkUpdate(_) => EventType::FrameworkUpdate,
      Self::CouncilDecision(_) => EventType::CouncilDecision,
      Self::WatchdogReport(_) => EventType::WatchdogReport,
    }
  }

  /// Serialise the inner payload only (no tag).
  pub fn to_data(&self) -> Result<serde_json::Value> {
    let value = match self {
      Self::ComplianceUpdate(v) => serde_json::to_value(v)?,
      Self::EnforcementAction(v) => serde_json::to_value(v)?,
      Self::AuditResult(v) => serde_json::to_value(v)?,
      Self::RiskAlert(v) => serde_json::to_value(v)?,
      Self::CertificationIssued(v) => serde_json::to_value(v)?,
      Self::FrameworkUpdate(v) => serde_json::to_value(v)?,
      Self::CouncilDecision(v) => serde_json::to_value(v)?,
      Self::WatchdogReport(v) => serde_json::to_value(v)?,
    };
    Ok(value)
  }

  /// Rebuild a payload from a discriminant and its inner JSON.
  pub fn from_parts(event_type: EventType, data: serde_json::Value) -> Result<Self> {
    let wrapped = serde_json::json!({ "eventType": event_type, "data": data });
    Ok(serde_json::from_value(wrapped)?)
  }
}

// ─── Targeting ───────────────────────────────────────────────────────────────

/// Who an event is about. Only `user_id` drives live delivery; the other
/// fields are stored for later querying.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTarget {
  #[serde(default)]
  pub user_id:         Option<UserId>,
  #[serde(default)]
  pub organization_id: Option<String>,
  #[serde(default)]
  pub ai_system_id:    Option<String>,
}

impl EventTarget {
  pub fn user(user_id: impl Into<UserId>) -> Self {
    Self { user_id: Some(user_id.into()), ..Self::default() }
  }

  pub fn is_untargeted(&self) -> bool {
    self.user_id.is_none()
      && self.organization_id.is_none()
      && self.ai_system_id.is_none()
  }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// What application callers hand to the broadcaster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
  pub payload:     EventPayload,
  /// Defaults to [`EventType::default_severity`] when absent.
  #[serde(default)]
  pub severity:    Option<Severity>,
  pub title:       String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub target:      EventTarget,
}

impl EventInput {
  pub fn new(
    payload: EventPayload,
    title: impl Into<String>,
    description: impl Into<String>,
  ) -> Self {
    Self {
      payload,
      severity: None,
      title: title.into(),
      description: description.into(),
      target: EventTarget::default(),
    }
  }

  pub fn with_severity(mut self, severity: Severity) -> Self {
    self.severity = Some(severity);
    self
  }

  pub fn with_target(mut self, target: EventTarget) -> Self {
    self.target = target;
    self
  }

  pub fn event_type(&self) -> EventType { self.payload.event_type() }

  /// Resolve defaults and flatten the payload for storage.
  pub fn into_new_event(self) -> Result<NewEvent> {
    let event_type = self.payload.event_type();
    Ok(NewEvent {
      event_type,
      severity: self
        .severity
        .unwrap_or_else(|| event_type.default_severity()),
      title: self.title,
      description: self.description,
      data: self.payload.to_data()?,
      target: self.target,
    })
  }
}

/// The storage-level shape of an event before an id is assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
  pub event_type:  EventType,
  pub severity:    Severity,
  pub title:       String,
  pub description: String,
  pub data:        serde_json::Value,
  pub target:      EventTarget,
}

// ─── Stored event ────────────────────────────────────────────────────────────

/// A persisted event, as returned by the store and pushed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
  pub id:              EventId,
  pub event_type:      EventType,
  pub severity:        Severity,
  pub title:           String,
  pub description:     String,
  pub data:            serde_json::Value,
  pub user_id:         Option<UserId>,
  pub organization_id: Option<String>,
  pub ai_system_id:    Option<String>,
  pub is_read:         bool,
  pub created_at:      DateTime<Utc>,
  pub read_at:         Option<DateTime<Utc>>,
}

impl Event {
  /// Recover the typed payload from the stored JSON.
  pub fn payload(&self) -> Result<EventPayload> {
    EventPayload::from_parts(self.event_type, self.data.clone())
  }
}
