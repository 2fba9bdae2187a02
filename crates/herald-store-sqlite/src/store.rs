//! [`SqliteStore`] — the SQLite implementation of [`NotificationStore`].

use std::path::Path;

use chrono::{DateTime, SubsecRound as _, Utc};
use rusqlite::OptionalExtension as _;

use herald_core::{
  connection::{ConnectionId, ConnectionRecord},
  event::{Event, EventId, NewEvent, UserId},
  store::{NotificationStore, Page},
};

use crate::{
  Result,
  encode::{CONNECTION_COLUMNS, EVENT_COLUMNS, RawConnection, RawEvent, encode_dt},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Herald store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a `SELECT <EVENT_COLUMNS> ...` tail with a single user parameter.
  async fn select_events(
    &self,
    tail: &'static str,
    user_id: UserId,
    page: Option<Page>,
  ) -> Result<Vec<Event>> {
    let user = user_id.as_str().to_owned();

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM realtime_events {tail}");
        let mut stmt = conn.prepare(&sql)?;
        let rows = match page {
          Some(p) => stmt
            .query_map(
              rusqlite::params![user, i64::from(p.limit), i64::from(p.offset)],
              RawEvent::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?,
          None => stmt
            .query_map(rusqlite::params![user], RawEvent::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }
}

/// Timestamps are stored at microsecond precision; stamp at that precision so
/// returned values match what a later read yields.
fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

// ─── NotificationStore impl ──────────────────────────────────────────────────

impl NotificationStore for SqliteStore {
  type Error = crate::Error;

  // ── Connections ───────────────────────────────────────────────────────────

  async fn record_connection(&self, record: ConnectionRecord) -> Result<()> {
    let id_str       = record.connection_id.as_str().to_owned();
    let user_str     = record.user_id.as_str().to_owned();
    let created_str  = encode_dt(record.created_at);
    let seen_str     = encode_dt(record.last_seen_at);
    let gone_str     = record.disconnected_at.map(encode_dt);
    let is_active    = record.is_active;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO websocket_connections (
             connection_id, user_id, is_active, created_at, last_seen_at, disconnected_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, user_str, is_active, created_str, seen_str, gone_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn deactivate_connection(&self, id: ConnectionId, at: DateTime<Utc>) -> Result<bool> {
    let id_str = id.as_str().to_owned();
    let at_str = encode_dt(at);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE websocket_connections
              SET is_active = 0, disconnected_at = ?2
            WHERE connection_id = ?1 AND is_active = 1",
          rusqlite::params![id_str, at_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  async fn touch_connection(&self, id: ConnectionId, at: DateTime<Utc>) -> Result<()> {
    let id_str = id.as_str().to_owned();
    let at_str = encode_dt(at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE websocket_connections
              SET last_seen_at = ?2, is_active = 1, disconnected_at = NULL
            WHERE connection_id = ?1",
          rusqlite::params![id_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn deactivate_stale_connections(
    &self,
    cutoff: DateTime<Utc>,
    at:     DateTime<Utc>,
  ) -> Result<u64> {
    let cutoff_str = encode_dt(cutoff);
    let at_str     = encode_dt(at);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE websocket_connections
              SET is_active = 0, disconnected_at = ?2
            WHERE is_active = 1 AND last_seen_at < ?1",
          rusqlite::params![cutoff_str, at_str],
        )?)
      })
      .await?;

    Ok(changed as u64)
  }

  async fn active_connections(&self, user_id: UserId) -> Result<Vec<ConnectionRecord>> {
    let user = user_id.as_str().to_owned();

    let raws: Vec<RawConnection> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {CONNECTION_COLUMNS} FROM websocket_connections
            WHERE user_id = ?1 AND is_active = 1
            ORDER BY created_at DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![user], RawConnection::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawConnection::into_record).collect()
  }

  // ── Events — writes ───────────────────────────────────────────────────────

  async fn insert_event(&self, input: NewEvent) -> Result<Event> {
    let created_at = now();

    let type_str   = input.event_type.as_ref().to_owned();
    let sev_str    = input.severity.as_ref().to_owned();
    let title      = input.title.clone();
    let desc       = input.description.clone();
    let data_str   = input.data.to_string();
    let user_str   = input.target.user_id.as_ref().map(|u| u.as_str().to_owned());
    let org_str    = input.target.organization_id.clone();
    let system_str = input.target.ai_system_id.clone();
    let at_str     = encode_dt(created_at);

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO realtime_events (
             event_type, severity, title, description, data_json,
             user_id, organization_id, ai_system_id, is_read, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9)",
          rusqlite::params![
            type_str, sev_str, title, desc, data_str, user_str, org_str, system_str, at_str,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Event {
      id:              EventId(id),
      event_type:      input.event_type,
      severity:        input.severity,
      title:           input.title,
      description:     input.description,
      data:            input.data,
      user_id:         input.target.user_id,
      organization_id: input.target.organization_id,
      ai_system_id:    input.target.ai_system_id,
      is_read:         false,
      created_at,
      read_at:         None,
    })
  }

  async fn mark_event_read(&self, id: EventId, at: DateTime<Utc>) -> Result<Option<Event>> {
    let at_str = encode_dt(at);

    let raw: Option<RawEvent> = self
      .conn
      .call(move |conn| {
        // The `is_read = 0` guard keeps the first read_at on repeat calls.
        conn.execute(
          "UPDATE realtime_events SET is_read = 1, read_at = ?2
            WHERE id = ?1 AND is_read = 0",
          rusqlite::params![id.0, at_str],
        )?;
        let sql = format!("SELECT {EVENT_COLUMNS} FROM realtime_events WHERE id = ?1");
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id.0], RawEvent::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawEvent::into_event).transpose()
  }

  async fn mark_all_read(&self, user_id: UserId, at: DateTime<Utc>) -> Result<u64> {
    let user   = user_id.as_str().to_owned();
    let at_str = encode_dt(at);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE realtime_events SET is_read = 1, read_at = ?2
            WHERE user_id = ?1 AND is_read = 0",
          rusqlite::params![user, at_str],
        )?)
      })
      .await?;

    Ok(changed as u64)
  }

  // ── Events — reads ────────────────────────────────────────────────────────

  async fn get_event(&self, id: EventId) -> Result<Option<Event>> {
    let raw: Option<RawEvent> = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM realtime_events WHERE id = ?1");
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id.0], RawEvent::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawEvent::into_event).transpose()
  }

  async fn unread_events(&self, user_id: UserId) -> Result<Vec<Event>> {
    self
      .select_events(
        "WHERE user_id = ?1 AND is_read = 0 ORDER BY created_at DESC, id DESC",
        user_id,
        None,
      )
      .await
  }

  async fn count_unread(&self, user_id: UserId) -> Result<u64> {
    let user = user_id.as_str().to_owned();

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM realtime_events WHERE user_id = ?1 AND is_read = 0",
          rusqlite::params![user],
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(count.max(0) as u64)
  }

  async fn events_for_user(&self, user_id: UserId, page: Page) -> Result<Vec<Event>> {
    self
      .select_events(
        "WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
        user_id,
        Some(page),
      )
      .await
  }
}
