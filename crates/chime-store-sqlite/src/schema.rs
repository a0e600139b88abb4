//! SQL schema for the chime SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision for future migrations.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Templates are never updated or deleted.
CREATE TABLE IF NOT EXISTS templates (
    template_id TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    kind        TEXT NOT NULL,   -- 'registration' | 'reminder' | 'prompt'
    body        TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS subscribers (
    phone_number TEXT PRIMARY KEY,   -- canonical national form
    name         TEXT NOT NULL,
    verified     INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS subscriptions (
    subscription_id   TEXT PRIMARY KEY,
    phone_number      TEXT NOT NULL,
    template_id       TEXT NOT NULL REFERENCES templates(template_id),
    next_trigger_time TEXT NOT NULL,   -- fixed-width RFC 3339 UTC
    frequency         TEXT,            -- NULL for one-shot
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

-- The message log is strictly append-only.
CREATE TABLE IF NOT EXISTS communications (
    comms_id    TEXT PRIMARY KEY,
    template_id TEXT REFERENCES templates(template_id),
    from_phone  TEXT NOT NULL,
    to_phone    TEXT NOT NULL,
    body        TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS journal_entries (
    journal_id   TEXT PRIMARY KEY,
    comms_id     TEXT REFERENCES communications(comms_id),
    phone_number TEXT NOT NULL,
    prompt       TEXT NOT NULL,
    entry        TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS templates_kind_idx          ON templates(kind, name);
CREATE INDEX IF NOT EXISTS subscriptions_due_idx       ON subscriptions(next_trigger_time);
CREATE INDEX IF NOT EXISTS subscriptions_phone_idx     ON subscriptions(phone_number);
CREATE INDEX IF NOT EXISTS communications_to_idx       ON communications(to_phone, created_at);
CREATE INDEX IF NOT EXISTS journal_entries_phone_idx   ON journal_entries(phone_number, created_at);

PRAGMA user_version = 1;
";
