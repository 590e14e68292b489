//! # Knowledge Harness CLI (`kh`)
//!
//! ## Usage
//!
//! ```bash
//! kh --config ./config/kh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kh init` | Create the SQLite database and schema |
//! | `kh extract <platform>` | Run an extractor (`react`, `docs`, or `all`) |
//! | `kh search "<query>"` | Substring search over stored assets |
//! | `kh get <id>` | Print one asset and its relationships |
//! | `kh remove <id>` | Delete an asset |
//! | `kh status [platform]` | Store health and last-run summaries |
//! | `kh serve` | Start the HTTP server |
//!
//! Logs go to stderr (`RUST_LOG`, default `knowledge_harness=info`);
//! command output goes to stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use knowledge_harness::config::{self, Config};
use knowledge_harness::controller::{ExtractionController, RunStatus};
use knowledge_harness::extractor::{build_extractors, SourceExtractor};
use knowledge_harness::models::{ContentType, SearchFilters};
use knowledge_harness::store::{ContentStore, SqliteStore};
use knowledge_harness::{get, migrate, search, server, status};

/// Knowledge Harness CLI: extract component and document content into a
/// searchable graph store.
#[derive(Parser)]
#[command(
    name = "kh",
    about = "Knowledge Harness: extract UI component and document content into a searchable store",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Run one extraction pass and record it in the ledger.
    Extract {
        /// Platform key (`react`, `docs`) or `all`.
        platform: String,
    },

    /// Search stored assets by case-sensitive substring.
    Search {
        query: String,

        /// Only assets from this source tag (e.g. `react_component`).
        #[arg(long)]
        source: Option<String>,

        /// Only assets of this type (`blog-post`, `operational-data`, `asset`, `configuration`).
        #[arg(long = "type")]
        content_type: Option<ContentType>,

        /// Maximum number of results; 0 means unlimited.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Print an asset by id.
    Get { id: String },

    /// Delete an asset and its relationships.
    Remove { id: String },

    /// Show store health and extraction summaries.
    Status {
        /// Limit the ledger section to one platform.
        platform: Option<String>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("knowledge_harness=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    if let Commands::Serve = cli.command {
        return server::run_server(&cfg).await;
    }

    let store = Arc::new(SqliteStore::open(&cfg.store));
    let outcome = run_command(cli.command, &cfg, store.clone()).await;
    store.manager().release().await;
    outcome
}

async fn run_command(command: Commands, cfg: &Config, store: Arc<SqliteStore>) -> Result<()> {
    match command {
        Commands::Init => {
            let pool = store.manager().acquire().await?;
            migrate::run_migrations(&pool).await?;
            println!("Database initialized successfully.");
        }
        Commands::Extract { platform } => {
            run_extract(cfg, store, &platform).await?;
        }
        Commands::Search {
            query,
            source,
            content_type,
            limit,
        } => {
            let filters = SearchFilters {
                source,
                content_type,
                limit: Some(limit),
            };
            search::run_search(store.as_ref(), &query, &filters).await?;
        }
        Commands::Get { id } => {
            get::run_get(store.as_ref(), &id).await?;
        }
        Commands::Remove { id } => {
            get::run_remove(store.as_ref(), &id).await?;
        }
        Commands::Status { platform } => {
            let platforms = match platform {
                Some(p) => vec![p],
                None => build_extractors(cfg)
                    .iter()
                    .map(|e| e.platform().to_string())
                    .collect(),
            };
            status::run_status(store.as_ref(), &platforms).await?;
        }
        Commands::Serve => unreachable!("handled before the store is opened"),
    }
    Ok(())
}

async fn run_extract(cfg: &Config, store: Arc<SqliteStore>, platform: &str) -> Result<()> {
    let configured = build_extractors(cfg);
    let selected: Vec<Arc<dyn SourceExtractor>> = if platform == "all" {
        configured.clone()
    } else {
        configured
            .iter()
            .filter(|e| e.platform() == platform)
            .cloned()
            .collect()
    };

    if selected.is_empty() {
        let names: Vec<&str> = configured.iter().map(|e| e.platform()).collect();
        bail!(
            "no extractor configured for platform: '{}'. Configured: {}",
            platform,
            if names.is_empty() {
                "none".to_string()
            } else {
                names.join(", ")
            }
        );
    }

    let mut failed = Vec::new();
    for extractor in selected {
        let name = extractor.platform().to_string();
        let store: Arc<dyn ContentStore> = store.clone();
        let outcome = ExtractionController::new(extractor, store).run().await;
        let result = &outcome.result;

        println!("extract {}", name);
        println!("  total files: {}", result.total_files);
        println!("  processed: {}", result.processed_files);
        println!("  extracted: {}", result.extracted_components);
        println!("  errors: {}", result.errors.len());
        for e in &result.errors {
            println!("    {}", e);
        }
        println!("  duration: {}ms", result.duration);

        if outcome.status == RunStatus::Failed {
            println!("failed");
            failed.push(name);
        } else {
            println!("ok");
        }
    }

    if !failed.is_empty() {
        bail!("extraction failed for: {}", failed.join(", "));
    }
    Ok(())
}
