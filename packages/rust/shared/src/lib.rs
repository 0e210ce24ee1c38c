//! Shared types, error model, and configuration for Sitetrail.
//!
//! This crate is the foundation depended on by all other Sitetrail crates.
//! It provides:
//! - [`SitetrailError`], the unified error type
//! - Domain types ([`Graph`], [`Node`], [`Transition`], [`NavSettings`], [`Forest`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DEFAULT_LABEL_WIDTH, DisplayConfig, NavigationConfig, StorageConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, SitetrailError};
pub use types::{EdgeCounts, Forest, Graph, GraphStats, IngestEvent, NavSettings, Node, Transition};
