//! Navigation graph recording and sitemap reconstruction for Sitetrail.
//!
//! This crate turns route-change events into a persisted navigation graph
//! ([`store::NavGraphStore`]) and rebuilds a hierarchical sitemap from the
//! recorded transitions ([`tree::build`]).

pub mod ingest;
pub mod normalize;
pub mod outline;
pub mod relay;
pub mod store;
pub mod title;
pub mod tree;

pub use ingest::IngestOutcome;
pub use outline::OutlineEntry;
pub use relay::{RelayRequest, RelayResponse, RelayStatus};
pub use store::{GraphBackend, MemoryBackend, NavGraphStore};
