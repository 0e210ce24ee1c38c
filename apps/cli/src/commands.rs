//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use sitetrail_core::{IngestOutcome, NavGraphStore, outline, relay};
use sitetrail_shared::{AppConfig, IngestEvent, NavSettings, init_config, load_config};
use sitetrail_storage::Storage;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Sitetrail: reconstruct a sitemap from how people navigate an SPA.
#[derive(Parser)]
#[command(
    name = "sitetrail",
    version,
    about = "Record single-page-app navigation and rebuild its sitemap.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Database path (overrides `[storage] database_path`).
    #[arg(long, global = true, env = "SITETRAIL_DB")]
    pub db: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Outline output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum TreeFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Record a single navigation event.
    Record {
        /// Location navigated to.
        #[arg(long)]
        to: String,

        /// Location navigated from.
        #[arg(long)]
        from: Option<String>,

        /// Document title at the destination.
        #[arg(long, default_value = "")]
        title: String,
    },

    /// Import navigation events from a JSON-lines file.
    Import {
        /// File with one `{from, to, title}` object per line.
        file: PathBuf,
    },

    /// Serve relay requests: JSON lines on stdin, responses on stdout.
    Serve,

    /// Print the recorded navigation graph.
    Graph {
        /// Print only node, edge, and transition counts.
        #[arg(long)]
        stats: bool,
    },

    /// Print the reconstructed sitemap.
    Tree {
        /// Output format: text or json.
        #[arg(long, default_value = "text")]
        format: TreeFormat,
    },

    /// Delete all recorded navigation.
    Reset {
        /// Confirm the reset.
        #[arg(long)]
        yes: bool,
    },

    /// Navigation settings management.
    Settings {
        /// Settings subcommand.
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Settings subcommands.
#[derive(Subcommand)]
pub(crate) enum SettingsAction {
    /// Show the stored navigation settings.
    Show,
    /// Change navigation settings for future transitions.
    Set {
        /// Nest destinations under their source page.
        #[arg(long, action = clap::ArgAction::Set)]
        nesting: Option<bool>,

        /// Levels to climb when nesting is off (minimum 1).
        #[arg(long)]
        back_steps: Option<u32>,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "sitetrail=info",
        1 => "sitetrail=debug",
        _ => "sitetrail=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let db = cli.db.as_deref();
    match cli.command {
        Command::Record { to, from, title } => {
            cmd_record(db, &IngestEvent::new(from.as_deref(), &to, &title)).await
        }
        Command::Import { file } => cmd_import(db, &file).await,
        Command::Serve => cmd_serve(db).await,
        Command::Graph { stats } => cmd_graph(db, stats).await,
        Command::Tree { format } => cmd_tree(db, format).await,
        Command::Reset { yes } => cmd_reset(db, yes).await,
        Command::Settings { action } => match action {
            SettingsAction::Show => cmd_settings_show(db).await,
            SettingsAction::Set {
                nesting,
                back_steps,
            } => cmd_settings_set(db, nesting, back_steps).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Store setup
// ---------------------------------------------------------------------------

/// Open the store read-write, seeding settings from `[navigation]`.
async fn open_store(db: Option<&Path>) -> Result<(AppConfig, NavGraphStore<Storage>)> {
    let config = load_config()?;
    let path = config.database_path(db)?;
    let storage = Storage::open(&path).await?;
    let store = NavGraphStore::open(storage)
        .await?
        .with_initial_settings(NavSettings::from(&config.navigation));
    Ok((config, store))
}

/// Open the store for inspection. An existing database is opened read-only.
async fn open_store_readonly(db: Option<&Path>) -> Result<(AppConfig, NavGraphStore<Storage>)> {
    let config = load_config()?;
    let path = config.database_path(db)?;
    if !path.exists() {
        return open_store(db).await;
    }
    let storage = Storage::open_readonly(&path).await?;
    let store = NavGraphStore::open(storage).await?;
    Ok((config, store))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_record(db: Option<&Path>, event: &IngestEvent) -> Result<()> {
    let (_, mut store) = open_store(db).await?;
    match store.ingest(event, Utc::now()).await? {
        IngestOutcome::Skipped => {
            println!("Skipped: '{}' is not a usable location.", event.to);
        }
        IngestOutcome::Recorded { key, created, .. } => {
            let visits = store
                .snapshot()
                .nodes
                .get(&key)
                .map(|n| n.visit_count)
                .unwrap_or_default();
            let verb = if created { "Added" } else { "Visited" };
            println!("{verb} {key} (visits: {visits})");
        }
    }
    Ok(())
}

async fn cmd_import(db: Option<&Path>, file: &Path) -> Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| eyre!("cannot read '{}': {e}", file.display()))?;
    let (_, mut store) = open_store(db).await?;

    info!(file = %file.display(), "importing navigation events");
    let progress = CliProgress::new()?;
    let mut recorded = 0usize;
    let mut skipped = 0usize;

    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: IngestEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = idx + 1, error = %e, "skipping malformed event");
                skipped += 1;
                continue;
            }
        };
        progress.set(format!("Recording [{}] {}", idx + 1, event.to));
        match store.ingest(&event, Utc::now()).await? {
            IngestOutcome::Skipped => skipped += 1,
            IngestOutcome::Recorded { .. } => recorded += 1,
        }
    }
    progress.finish();

    let stats = store.stats();
    println!();
    println!("  Import complete!");
    println!("  Recorded:    {recorded}");
    println!("  Skipped:     {skipped}");
    println!("  Nodes:       {}", stats.nodes);
    println!("  Transitions: {}", store.backend().transition_count().await?);
    println!();
    Ok(())
}

async fn cmd_serve(db: Option<&Path>) -> Result<()> {
    let (_, mut store) = open_store(db).await?;
    info!("relay listening on stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = relay::handle_line(&mut store, &line, Utc::now()).await;
        let mut out = serde_json::to_string(&response)?;
        out.push('\n');
        stdout.write_all(out.as_bytes()).await?;
        stdout.flush().await?;
    }

    info!("relay input closed");
    Ok(())
}

async fn cmd_graph(db: Option<&Path>, stats_only: bool) -> Result<()> {
    let (_, store) = open_store_readonly(db).await?;
    if stats_only {
        let stats = store.stats();
        println!("Nodes:       {}", stats.nodes);
        println!("Edges:       {}", stats.edges);
        println!("Transitions: {}", stats.transitions);
    } else {
        println!("{}", serde_json::to_string_pretty(store.snapshot())?);
    }
    Ok(())
}

async fn cmd_tree(db: Option<&Path>, format: TreeFormat) -> Result<()> {
    let (config, store) = open_store_readonly(db).await?;
    let forest = store.tree();
    let entries = outline::entries(&forest, &store.snapshot().nodes, config.display.label_width);

    match format {
        TreeFormat::Text if entries.is_empty() => println!("No navigation recorded yet."),
        TreeFormat::Text => print!("{}", outline::render_text(&entries)),
        TreeFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
    }
    Ok(())
}

async fn cmd_reset(db: Option<&Path>, yes: bool) -> Result<()> {
    if !yes {
        return Err(eyre!(
            "reset deletes every recorded node and transition; pass --yes to confirm"
        ));
    }
    let (_, mut store) = open_store(db).await?;
    store.reset().await?;
    println!("Navigation graph cleared.");
    Ok(())
}

async fn cmd_settings_show(db: Option<&Path>) -> Result<()> {
    let (_, store) = open_store(db).await?;
    let settings = store.settings().await?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

async fn cmd_settings_set(
    db: Option<&Path>,
    nesting: Option<bool>,
    back_steps: Option<u32>,
) -> Result<()> {
    if nesting.is_none() && back_steps.is_none() {
        return Err(eyre!("nothing to change: pass --nesting and/or --back-steps"));
    }
    let (_, mut store) = open_store(db).await?;
    let current = store.settings().await?;
    let next = NavSettings {
        nesting_enabled: nesting.unwrap_or(current.nesting_enabled),
        back_steps: back_steps.unwrap_or(current.back_steps),
    };
    let stored = store.update_settings(next).await?;
    println!("{}", serde_json::to_string_pretty(&stored)?);
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Import progress spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Result<Self> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")?
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Ok(Self { spinner })
    }

    fn set(&self, msg: String) {
        self.spinner.set_message(msg);
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}
