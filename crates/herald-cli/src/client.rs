//! Async HTTP client wrapping the Herald JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use herald_core::event::{Event, EventId, EventInput};
use reqwest::{Client, Response};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

/// Connection settings shared by the HTTP client and the socket listener.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url:    String,
  pub ws_path:     String,
  pub user:        String,
  pub user_header: String,
  pub token:       Option<String>,
}

impl ApiConfig {
  /// `http(s)://host` → `ws(s)://host<ws_path>`.
  pub fn ws_url(&self) -> Result<String> {
    let base = self.base_url.trim_end_matches('/');
    let rest = if let Some(rest) = base.strip_prefix("https://") {
      format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
      format!("ws://{rest}")
    } else {
      return Err(anyhow!("base URL must start with http:// or https://: {base}"));
    };
    Ok(format!("{rest}{}", self.ws_path))
  }
}

#[derive(Deserialize)]
struct CountBody {
  count: u64,
}

#[derive(Deserialize)]
struct UpdatedBody {
  updated: u64,
}

/// Async HTTP client for the Herald JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  pub fn config(&self) -> &ApiConfig { &self.config }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    let req = req.header(self.config.user_header.as_str(), self.config.user.as_str());
    match &self.config.token {
      Some(token) => req.bearer_auth(token),
      None => req,
    }
  }

  fn user_query(&self) -> [(&'static str, &str); 1] { [("userId", self.config.user.as_str())] }

  async fn decode<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(anyhow!("{what} → {status}: {body}"));
    }
    resp.json().await.with_context(|| format!("deserialising {what}"))
  }

  // ── Events ────────────────────────────────────────────────────────────────

  /// `GET /api/events/unread?userId=<id>`
  pub async fn unread(&self) -> Result<Vec<Event>> {
    let resp = self
      .auth(self.client.get(self.url("/events/unread")))
      .query(&self.user_query())
      .send()
      .await
      .context("GET /events/unread failed")?;
    Self::decode(resp, "GET /events/unread").await
  }

  /// `GET /api/events/unread/count?userId=<id>`
  pub async fn unread_count(&self) -> Result<u64> {
    let resp = self
      .auth(self.client.get(self.url("/events/unread/count")))
      .query(&self.user_query())
      .send()
      .await
      .context("GET /events/unread/count failed")?;
    let body: CountBody = Self::decode(resp, "GET /events/unread/count").await?;
    Ok(body.count)
  }

  /// `GET /api/events?userId=<id>&limit=<n>&offset=<n>`
  pub async fn events(&self, limit: u32, offset: u32) -> Result<Vec<Event>> {
    let resp = self
      .auth(self.client.get(self.url("/events")))
      .query(&self.user_query())
      .query(&[("limit", limit), ("offset", offset)])
      .send()
      .await
      .context("GET /events failed")?;
    Self::decode(resp, "GET /events").await
  }

  /// `POST /api/events/<id>/read`
  pub async fn mark_read(&self, id: EventId) -> Result<Event> {
    let resp = self
      .auth(self.client.post(self.url(&format!("/events/{id}/read"))))
      .send()
      .await
      .with_context(|| format!("POST /events/{id}/read failed"))?;
    Self::decode(resp, "POST /events/{id}/read").await
  }

  /// `POST /api/events/read-all?userId=<id>`
  pub async fn mark_all_read(&self) -> Result<u64> {
    let resp = self
      .auth(self.client.post(self.url("/events/read-all")))
      .query(&self.user_query())
      .send()
      .await
      .context("POST /events/read-all failed")?;
    let body: UpdatedBody = Self::decode(resp, "POST /events/read-all").await?;
    Ok(body.updated)
  }

  /// `POST /api/events`
  pub async fn emit(&self, input: &EventInput) -> Result<Event> {
    let resp = self
      .auth(self.client.post(self.url("/events")))
      .json(input)
      .send()
      .await
      .context("POST /events failed")?;
    Self::decode(resp, "POST /events").await
  }

  // ── Stats ─────────────────────────────────────────────────────────────────

  /// `GET /api/stats`
  pub async fn stats(&self) -> Result<Value> {
    let resp = self
      .auth(self.client.get(self.url("/stats")))
      .send()
      .await
      .context("GET /stats failed")?;
    Self::decode(resp, "GET /stats").await
  }
}
