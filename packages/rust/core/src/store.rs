//! Navigation graph store.
//!
//! [`NavGraphStore`] owns the current graph and is the single writer for it:
//! `ingest`, `reset`, and `update_settings` take `&mut self`, so events are
//! applied strictly one at a time. Every successful ingest is persisted
//! through a [`GraphBackend`] before it returns.
//!
//! An ingest either applies completely or not at all: the event is merged
//! into a copy of the graph, and the copy replaces the cached graph only
//! after the backend accepted it.

use std::future::Future;

use chrono::{DateTime, Utc};
use sitetrail_shared::{Forest, Graph, GraphStats, IngestEvent, NavSettings, Result, SitetrailError};
use sitetrail_storage::Storage;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::ingest::{self, IngestOutcome};
use crate::tree;

// ---------------------------------------------------------------------------
// GraphBackend
// ---------------------------------------------------------------------------

/// Durable home of the graph and the navigation settings.
pub trait GraphBackend {
    /// Load the persisted graph; the empty graph if nothing was stored.
    fn fetch_graph(&self) -> impl Future<Output = Result<Graph>>;

    /// Persist `graph`, replacing what was stored.
    fn persist_graph(&self, graph: &Graph) -> impl Future<Output = Result<()>>;

    /// Delete the persisted graph.
    fn erase_graph(&self) -> impl Future<Output = Result<()>>;

    /// Load the settings record, if one was ever written.
    fn fetch_settings(&self) -> impl Future<Output = Result<Option<NavSettings>>>;

    /// Replace the settings record. Returns the stored (clamped) value.
    fn persist_settings(
        &self,
        settings: &NavSettings,
    ) -> impl Future<Output = Result<NavSettings>>;
}

impl GraphBackend for Storage {
    async fn fetch_graph(&self) -> Result<Graph> {
        self.load_graph().await
    }

    async fn persist_graph(&self, graph: &Graph) -> Result<()> {
        self.save_graph(graph).await
    }

    async fn erase_graph(&self) -> Result<()> {
        self.clear_graph().await
    }

    async fn fetch_settings(&self) -> Result<Option<NavSettings>> {
        self.load_settings().await
    }

    async fn persist_settings(&self, settings: &NavSettings) -> Result<NavSettings> {
        self.save_settings(settings).await
    }
}

/// In-memory backend. Useful for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    graph: Mutex<Graph>,
    settings: Mutex<Option<NavSettings>>,
    unavailable: std::sync::atomic::AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an unreachable store: every later call fails.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable
            .store(unavailable, std::sync::atomic::Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(SitetrailError::storage("memory backend is unavailable"));
        }
        Ok(())
    }
}

impl GraphBackend for MemoryBackend {
    async fn fetch_graph(&self) -> Result<Graph> {
        self.check_available()?;
        Ok(self.graph.lock().await.clone())
    }

    async fn persist_graph(&self, graph: &Graph) -> Result<()> {
        self.check_available()?;
        *self.graph.lock().await = graph.clone();
        Ok(())
    }

    async fn erase_graph(&self) -> Result<()> {
        self.check_available()?;
        *self.graph.lock().await = Graph::default();
        Ok(())
    }

    async fn fetch_settings(&self) -> Result<Option<NavSettings>> {
        self.check_available()?;
        Ok(*self.settings.lock().await)
    }

    async fn persist_settings(&self, settings: &NavSettings) -> Result<NavSettings> {
        self.check_available()?;
        let settings = settings.clamped();
        *self.settings.lock().await = Some(settings);
        Ok(settings)
    }
}

// ---------------------------------------------------------------------------
// NavGraphStore
// ---------------------------------------------------------------------------

/// Single-writer owner of the navigation graph.
pub struct NavGraphStore<B> {
    backend: B,
    graph: Graph,
    /// Settings written on first read when no record exists yet.
    initial_settings: NavSettings,
}

impl<B: GraphBackend> NavGraphStore<B> {
    /// Load the persisted graph from `backend`.
    pub async fn open(backend: B) -> Result<Self> {
        let graph = backend.fetch_graph().await?;
        debug!(stats = ?graph.stats(), "navigation graph store opened");
        Ok(Self {
            backend,
            graph,
            initial_settings: NavSettings::default(),
        })
    }

    /// Settings used to initialize the record on first read.
    pub fn with_initial_settings(mut self, settings: NavSettings) -> Self {
        self.initial_settings = settings.clamped();
        self
    }

    /// Record one navigation event at time `now` and persist the result.
    ///
    /// An empty or unparseable target is a silent no-op. A storage failure is
    /// returned and leaves the in-memory graph untouched.
    #[instrument(skip_all, fields(to = %event.to))]
    pub async fn ingest(&mut self, event: &IngestEvent, now: DateTime<Utc>) -> Result<IngestOutcome> {
        if ingest::target_key(&event.to).is_none() {
            debug!("ignoring event without a usable target");
            return Ok(IngestOutcome::Skipped);
        }

        // Settings are only snapshotted into ledger entries.
        let settings = if ingest::records_transition(event) {
            self.settings().await?
        } else {
            self.initial_settings
        };
        let mut next = self.graph.clone();
        let outcome = ingest::apply(&mut next, event, settings, now);

        self.backend.persist_graph(&next).await?;
        self.graph = next;

        if let IngestOutcome::Recorded {
            key,
            created,
            transition,
        } = &outcome
        {
            debug!(%key, created, transition, "navigation recorded");
        }
        Ok(outcome)
    }

    /// Current graph as last persisted by this store.
    pub fn snapshot(&self) -> &Graph {
        &self.graph
    }

    /// Read the graph back from durable storage.
    pub async fn read(&self) -> Result<Graph> {
        self.backend.fetch_graph().await
    }

    /// Irreversibly clear nodes, edges, and transitions.
    pub async fn reset(&mut self) -> Result<()> {
        self.backend.erase_graph().await?;
        self.graph = Graph::default();
        info!("navigation graph reset");
        Ok(())
    }

    /// Current navigation settings, initializing the record on first read.
    pub async fn settings(&self) -> Result<NavSettings> {
        match self.backend.fetch_settings().await? {
            Some(settings) => Ok(settings.clamped()),
            None => {
                debug!(settings = ?self.initial_settings, "initializing navigation settings");
                self.backend.persist_settings(&self.initial_settings).await
            }
        }
    }

    /// Replace the navigation settings. Only later transitions see the change.
    pub async fn update_settings(&mut self, settings: NavSettings) -> Result<NavSettings> {
        let stored = self.backend.persist_settings(&settings.clamped()).await?;
        info!(
            nesting_enabled = stored.nesting_enabled,
            back_steps = stored.back_steps,
            "navigation settings updated"
        );
        Ok(stored)
    }

    /// Node, edge, and transition counts.
    pub fn stats(&self) -> GraphStats {
        self.graph.stats()
    }

    /// Reconstruct the sitemap forest from the current graph.
    pub fn tree(&self) -> Forest {
        tree::build(&self.graph)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
