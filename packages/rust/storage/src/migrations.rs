//! SQL migration definitions for the Sitetrail database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: nodes, edges, transitions, nav_settings",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per normalized location
CREATE TABLE IF NOT EXISTS nodes (
    url         TEXT PRIMARY KEY,
    title       TEXT NOT NULL DEFAULT '',
    first_seen  TEXT NOT NULL,
    last_seen   TEXT NOT NULL,
    visit_count INTEGER NOT NULL DEFAULT 1
);

-- Direct transition counts
CREATE TABLE IF NOT EXISTS edges (
    from_url TEXT NOT NULL,
    to_url   TEXT NOT NULL,
    count    INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (from_url, to_url)
);

-- Append-only transition ledger; seq preserves insertion order
CREATE TABLE IF NOT EXISTS transitions (
    seq             INTEGER PRIMARY KEY AUTOINCREMENT,
    from_url        TEXT NOT NULL,
    to_url          TEXT NOT NULL,
    at              TEXT NOT NULL,
    nesting_enabled INTEGER NOT NULL,
    back_steps      INTEGER NOT NULL CHECK (back_steps >= 1)
);

CREATE INDEX IF NOT EXISTS idx_transitions_at ON transitions(at);

-- Singleton navigation settings record
CREATE TABLE IF NOT EXISTS nav_settings (
    id              INTEGER PRIMARY KEY CHECK (id = 1),
    nesting_enabled INTEGER NOT NULL,
    back_steps      INTEGER NOT NULL CHECK (back_steps >= 1),
    updated_at      TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
