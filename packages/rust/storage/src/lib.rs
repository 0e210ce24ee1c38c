//! libSQL storage layer for the navigation graph (offline, local file).
//!
//! The [`Storage`] struct wraps a libSQL database holding graph nodes, edge
//! counts, the transition ledger, and the navigation settings record.
//!
//! **Access rules:**
//! - Recorder (CLI `record`/`import`/`serve`): read-write via [`Storage::open`]
//! - Viewers (`graph`, `tree`): may use [`Storage::open_readonly`]
//!
//! The transition ledger is append-only here too: [`Storage::save_graph`]
//! only inserts ledger entries beyond what is already stored, and only
//! [`Storage::clear_graph`] ever deletes them.

mod migrations;

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use sitetrail_shared::{Graph, NavSettings, Node, Result, SitetrailError, Transition};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| SitetrailError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| SitetrailError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| SitetrailError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| SitetrailError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| SitetrailError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    SitetrailError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(SitetrailError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Graph operations
    // -----------------------------------------------------------------------

    /// Load the whole graph. Returns the empty graph if nothing is stored.
    pub async fn load_graph(&self) -> Result<Graph> {
        let mut graph = Graph::default();

        let mut rows = self
            .conn
            .query(
                "SELECT url, title, first_seen, last_seen, visit_count FROM nodes ORDER BY url",
                params![],
            )
            .await
            .map_err(|e| SitetrailError::Storage(e.to_string()))?;
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let node = row_to_node(&row)?;
            graph.nodes.insert(node.url.clone(), node);
        }

        let mut rows = self
            .conn
            .query("SELECT from_url, to_url, count FROM edges", params![])
            .await
            .map_err(|e| SitetrailError::Storage(e.to_string()))?;
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let from: String = row.get(0).map_err(storage_err)?;
            let to: String = row.get(1).map_err(storage_err)?;
            let count: i64 = row.get(2).map_err(storage_err)?;
            graph
                .edges
                .entry(from)
                .or_insert_with(BTreeMap::new)
                .insert(to, count.max(0) as u64);
        }

        let mut rows = self
            .conn
            .query(
                "SELECT from_url, to_url, at, nesting_enabled, back_steps
                 FROM transitions ORDER BY seq",
                params![],
            )
            .await
            .map_err(|e| SitetrailError::Storage(e.to_string()))?;
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            graph.transitions.push(row_to_transition(&row)?);
        }

        tracing::debug!(
            nodes = graph.nodes.len(),
            transitions = graph.transitions.len(),
            "graph loaded"
        );
        Ok(graph)
    }

    /// Persist `graph` in a single transaction.
    ///
    /// Nodes and edge counts are upserted. Ledger entries past the stored
    /// length are appended; a graph whose ledger is shorter than the stored
    /// one is rejected, since stored transitions are never rewritten.
    pub async fn save_graph(&self, graph: &Graph) -> Result<()> {
        self.check_writable()?;

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| SitetrailError::Storage(e.to_string()))?;

        match write_graph(&tx, graph).await {
            Ok(appended) => {
                tx.commit()
                    .await
                    .map_err(|e| SitetrailError::Storage(e.to_string()))?;
                tracing::debug!(
                    nodes = graph.nodes.len(),
                    appended_transitions = appended,
                    "graph saved"
                );
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Delete all nodes, edges, and transitions.
    pub async fn clear_graph(&self) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute_batch(
                "BEGIN;
                 DELETE FROM transitions;
                 DELETE FROM edges;
                 DELETE FROM nodes;
                 COMMIT;",
            )
            .await
            .map_err(|e| SitetrailError::Storage(e.to_string()))?;
        tracing::info!("graph cleared");
        Ok(())
    }

    /// Number of ledger entries currently stored.
    pub async fn transition_count(&self) -> Result<usize> {
        count_transitions(&self.conn).await
    }

    // -----------------------------------------------------------------------
    // Settings operations
    // -----------------------------------------------------------------------

    /// Load the stored navigation settings, if a record exists.
    pub async fn load_settings(&self) -> Result<Option<NavSettings>> {
        let mut rows = self
            .conn
            .query(
                "SELECT nesting_enabled, back_steps FROM nav_settings WHERE id = 1",
                params![],
            )
            .await
            .map_err(|e| SitetrailError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let nesting: i64 = row.get(0).map_err(storage_err)?;
                let back_steps: i64 = row.get(1).map_err(storage_err)?;
                Ok(Some(
                    NavSettings {
                        nesting_enabled: nesting != 0,
                        back_steps: u32::try_from(back_steps).unwrap_or(1),
                    }
                    .clamped(),
                ))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(SitetrailError::Storage(e.to_string())),
        }
    }

    /// Replace the stored navigation settings. `back_steps` is clamped to >= 1.
    pub async fn save_settings(&self, settings: &NavSettings) -> Result<NavSettings> {
        self.check_writable()?;
        let settings = settings.clamped();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO nav_settings (id, nesting_enabled, back_steps, updated_at)
                 VALUES (1, ?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                   nesting_enabled = excluded.nesting_enabled,
                   back_steps = excluded.back_steps,
                   updated_at = excluded.updated_at",
                params![
                    i64::from(settings.nesting_enabled),
                    i64::from(settings.back_steps),
                    now.as_str()
                ],
            )
            .await
            .map_err(|e| SitetrailError::Storage(e.to_string()))?;
        Ok(settings)
    }
}

/// Write nodes, edges, and new ledger entries. Returns how many transitions were appended.
async fn write_graph(conn: &Connection, graph: &Graph) -> Result<usize> {
    for node in graph.nodes.values() {
        conn.execute(
            "INSERT INTO nodes (url, title, first_seen, last_seen, visit_count)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(url) DO UPDATE SET
               title = excluded.title,
               first_seen = excluded.first_seen,
               last_seen = excluded.last_seen,
               visit_count = excluded.visit_count",
            params![
                node.url.as_str(),
                node.title.as_str(),
                node.first_seen.to_rfc3339(),
                node.last_seen.to_rfc3339(),
                node.visit_count as i64,
            ],
        )
        .await
        .map_err(storage_err)?;
    }

    for (from, targets) in &graph.edges {
        for (to, count) in targets {
            conn.execute(
                "INSERT INTO edges (from_url, to_url, count) VALUES (?1, ?2, ?3)
                 ON CONFLICT(from_url, to_url) DO UPDATE SET count = excluded.count",
                params![from.as_str(), to.as_str(), *count as i64],
            )
            .await
            .map_err(storage_err)?;
        }
    }

    let stored = count_transitions(conn).await?;
    if stored > graph.transitions.len() {
        return Err(SitetrailError::validation(format!(
            "refusing to truncate transition ledger: {stored} stored, {} supplied",
            graph.transitions.len()
        )));
    }

    let pending = &graph.transitions[stored..];
    for t in pending {
        conn.execute(
            "INSERT INTO transitions (from_url, to_url, at, nesting_enabled, back_steps)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                t.from.as_str(),
                t.to.as_str(),
                t.at.to_rfc3339(),
                i64::from(t.nesting_enabled),
                i64::from(t.back_steps.max(1)),
            ],
        )
        .await
        .map_err(storage_err)?;
    }

    Ok(pending.len())
}

async fn count_transitions(conn: &Connection) -> Result<usize> {
    let mut rows = conn
        .query("SELECT COUNT(*) FROM transitions", params![])
        .await
        .map_err(storage_err)?;
    match rows.next().await.map_err(storage_err)? {
        Some(row) => {
            let n: i64 = row.get(0).map_err(storage_err)?;
            Ok(n.max(0) as usize)
        }
        None => Ok(0),
    }
}

fn storage_err(e: libsql::Error) -> SitetrailError {
    SitetrailError::Storage(e.to_string())
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SitetrailError::Storage(format!("invalid date '{s}': {e}")))
}

/// Convert a database row to a [`Node`].
fn row_to_node(row: &libsql::Row) -> Result<Node> {
    let first_seen: String = row.get(2).map_err(storage_err)?;
    let last_seen: String = row.get(3).map_err(storage_err)?;
    Ok(Node {
        url: row.get::<String>(0).map_err(storage_err)?,
        title: row.get::<String>(1).unwrap_or_default(),
        first_seen: parse_timestamp(&first_seen)?,
        last_seen: parse_timestamp(&last_seen)?,
        visit_count: row.get::<i64>(4).map(|v| v.max(1) as u64).unwrap_or(1),
    })
}

/// Convert a database row to a [`Transition`].
fn row_to_transition(row: &libsql::Row) -> Result<Transition> {
    let at: String = row.get(2).map_err(storage_err)?;
    let nesting: i64 = row.get(3).map_err(storage_err)?;
    let back_steps: i64 = row.get(4).map_err(storage_err)?;
    Ok(Transition {
        from: row.get::<String>(0).map_err(storage_err)?,
        to: row.get::<String>(1).map_err(storage_err)?,
        at: parse_timestamp(&at)?,
        nesting_enabled: nesting != 0,
        back_steps: u32::try_from(back_steps).unwrap_or(1).max(1),
    })
}
