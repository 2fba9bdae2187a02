//! SQL schema for the Herald SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS websocket_connections (
    connection_id   TEXT PRIMARY KEY,
    user_id         TEXT NOT NULL,
    is_active       INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL,   -- RFC 3339 UTC, fixed precision
    last_seen_at    TEXT NOT NULL,
    disconnected_at TEXT
);

-- Rows are never deleted. Only is_read/read_at change, and only once.
CREATE TABLE IF NOT EXISTS realtime_events (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type      TEXT NOT NULL,
    severity        TEXT NOT NULL DEFAULT 'info',
    title           TEXT NOT NULL,
    description     TEXT NOT NULL DEFAULT '',
    data_json       TEXT NOT NULL DEFAULT '{}',
    user_id         TEXT,
    organization_id TEXT,
    ai_system_id    TEXT,
    is_read         INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL,
    read_at         TEXT
);

CREATE INDEX IF NOT EXISTS connections_user_idx   ON websocket_connections(user_id, is_active);
CREATE INDEX IF NOT EXISTS connections_seen_idx   ON websocket_connections(is_active, last_seen_at);
CREATE INDEX IF NOT EXISTS events_user_unread_idx ON realtime_events(user_id, is_read);
CREATE INDEX IF NOT EXISTS events_created_idx     ON realtime_events(created_at);

PRAGMA user_version = 1;
";
