//! Sitetrail CLI: record SPA navigation and rebuild its sitemap.
//!
//! Feeds route-change events into the navigation graph store and renders the
//! reconstructed page hierarchy as an outline.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
