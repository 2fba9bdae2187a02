//! Handshake identity resolution and the [`Identity`] extractor.
//!
//! Resolving nobody is not a rejection here: the socket is still upgraded and
//! the registry closes it with 1008, so clients see a proper close frame.

use std::{collections::HashMap, sync::Arc};

use axum::{
  extract::{FromRequestParts, Query},
  http::{HeaderMap, HeaderName, Uri, header, request::Parts},
};
use herald_core::event::UserId;
use serde::Deserialize;

use crate::{AppState, error::Error};

/// Maps a WebSocket handshake to the user it belongs to.
pub trait IdentityResolver: Send + Sync {
  fn resolve(&self, headers: &HeaderMap, uri: &Uri) -> Option<UserId>;
}

// ─── Header mode ──────────────────────────────────────────────────────────────

/// Trusts a header set by an upstream gateway.
pub struct HeaderIdentity {
  header: HeaderName,
}

impl HeaderIdentity {
  pub fn new(header: HeaderName) -> Self { Self { header } }
}

impl IdentityResolver for HeaderIdentity {
  fn resolve(&self, headers: &HeaderMap, _uri: &Uri) -> Option<UserId> {
    let value = headers.get(&self.header)?.to_str().ok()?.trim();
    (!value.is_empty()).then(|| UserId::from(value))
  }
}

// ─── Token mode ───────────────────────────────────────────────────────────────

/// Static bearer tokens from configuration.
///
/// The token is read from `Authorization: Bearer <t>`, falling back to the
/// `token` query parameter for browser clients that cannot set headers.
pub struct TokenIdentity {
  tokens: HashMap<String, UserId>,
}

#[derive(Deserialize)]
struct TokenQuery {
  token: Option<String>,
}

impl TokenIdentity {
  pub fn new(tokens: impl IntoIterator<Item = (String, UserId)>) -> Self {
    Self { tokens: tokens.into_iter().collect() }
  }

  fn bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(|t| t.trim().to_owned())
  }

  fn query(uri: &Uri) -> Option<String> {
    Query::<TokenQuery>::try_from_uri(uri).ok()?.0.token
  }
}

impl IdentityResolver for TokenIdentity {
  fn resolve(&self, headers: &HeaderMap, uri: &Uri) -> Option<UserId> {
    let token = Self::bearer(headers).or_else(|| Self::query(uri))?;
    self.tokens.get(&token).cloned()
  }
}

// ─── Configuration ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenEntry {
  pub token:   String,
  pub user_id: String,
}

/// `[identity]` table of the server config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum IdentityConfig {
  Header {
    #[serde(default = "default_header")]
    header: String,
  },
  Token {
    #[serde(default)]
    tokens: Vec<TokenEntry>,
  },
}

fn default_header() -> String { "x-user-id".to_owned() }

impl Default for IdentityConfig {
  fn default() -> Self { Self::Header { header: default_header() } }
}

impl IdentityConfig {
  pub fn build(&self) -> Result<Arc<dyn IdentityResolver>, Error> {
    match self {
      IdentityConfig::Header { header } => {
        let name = HeaderName::try_from(header.as_str())
          .map_err(|_| Error::HeaderName(header.clone()))?;
        Ok(Arc::new(HeaderIdentity::new(name)))
      }
      IdentityConfig::Token { tokens } => {
        if tokens.is_empty() {
          return Err(Error::Identity("token mode needs at least one token".into()));
        }
        let pairs = tokens
          .iter()
          .map(|t| (t.token.clone(), UserId::from(t.user_id.as_str())));
        Ok(Arc::new(TokenIdentity::new(pairs)))
      }
    }
  }
}

// ─── Extractor ────────────────────────────────────────────────────────────────

/// The user resolved from the request, if any. Never rejects.
pub struct Identity(pub Option<UserId>);

impl<S> FromRequestParts<AppState<S>> for Identity
where
  S: Send + Sync,
{
  type Rejection = std::convert::Infallible;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    Ok(Identity(state.identity.resolve(&parts.headers, &parts.uri)))
  }
}

#[cfg(test)]
mod tests {
  use axum::http::{HeaderValue, Request};

  use super::*;

  fn parts(uri: &str, headers: &[(&str, &str)]) -> (HeaderMap, Uri) {
    let mut builder = Request::builder().uri(uri);
    for (k, v) in headers {
      builder = builder.header(*k, *v);
    }
    let (parts, _) = builder.body(()).unwrap().into_parts();
    (parts.headers, parts.uri)
  }

  fn token_identity() -> Arc<dyn IdentityResolver> {
    IdentityConfig::Token {
      tokens: vec![TokenEntry { token: "s3cret".into(), user_id: "u1".into() }],
    }
    .build()
    .unwrap()
  }

  #[test]
  fn header_mode_reads_configured_header() {
    let resolver = IdentityConfig::default().build().unwrap();
    let (h, u) = parts("/ws", &[("x-user-id", "alice")]);
    assert_eq!(resolver.resolve(&h, &u), Some(UserId::from("alice")));
  }

  #[test]
  fn header_mode_rejects_missing_or_blank_header() {
    let resolver = IdentityConfig::default().build().unwrap();
    let (h, u) = parts("/ws", &[]);
    assert_eq!(resolver.resolve(&h, &u), None);
    let (h, u) = parts("/ws", &[("x-user-id", "   ")]);
    assert_eq!(resolver.resolve(&h, &u), None);
  }

  #[test]
  fn custom_header_name() {
    let resolver = IdentityConfig::Header { header: "X-Forwarded-User".into() }
      .build()
      .unwrap();
    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-user", HeaderValue::from_static("bob"));
    assert_eq!(resolver.resolve(&headers, &Uri::from_static("/ws")), Some(UserId::from("bob")));
  }

  #[test]
  fn invalid_header_name_is_a_config_error() {
    let result = IdentityConfig::Header { header: "not a header".into() }.build();
    assert!(matches!(result, Err(Error::HeaderName(_))));
  }

  #[test]
  fn token_mode_accepts_bearer_header() {
    let (h, u) = parts("/ws", &[("authorization", "Bearer s3cret")]);
    assert_eq!(token_identity().resolve(&h, &u), Some(UserId::from("u1")));
  }

  #[test]
  fn token_mode_accepts_query_parameter() {
    let (h, u) = parts("/ws?token=s3cret", &[]);
    assert_eq!(token_identity().resolve(&h, &u), Some(UserId::from("u1")));
  }

  #[test]
  fn token_mode_rejects_unknown_token() {
    let (h, u) = parts("/ws?token=nope", &[("authorization", "Bearer wrong")]);
    assert_eq!(token_identity().resolve(&h, &u), None);
    let (h, u) = parts("/ws", &[("authorization", "Basic s3cret")]);
    assert_eq!(token_identity().resolve(&h, &u), None);
  }

  #[test]
  fn token_mode_without_tokens_is_refused() {
    let result = IdentityConfig::Token { tokens: vec![] }.build();
    assert!(matches!(result, Err(Error::Identity(_))));
  }
}
