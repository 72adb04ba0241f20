//! # kb CLI
//!
//! The `kb` binary drives the knowledge-base index and the URL review queue.
//!
//! ## Usage
//!
//! ```bash
//! kb [--config ./kb.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kb list` | List knowledge bases under the configured root |
//! | `kb search "<query>"` | Refresh the index, then run a semantic search |
//! | `kb reindex [kb]` | Refresh the index for one or all knowledge bases |
//! | `kb url suggest <url> <kb> --reason "..."` | Queue a URL for review |
//! | `kb url pending` | Show URLs awaiting review |
//! | `kb url approve <id>` | Fetch, store, and index a suggested URL |
//! | `kb url reject <id>` | Drop a suggested URL |
//! | `kb url add <url> <kb>` | Fetch, store, and index a URL without review |
//!
//! Settings come from the optional TOML file and the environment
//! (`KNOWLEDGE_BASES_ROOT_DIR`, `EMBEDDING_PROVIDER`, ...). Logs go to
//! stderr; set `RUST_LOG` to change the level.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use kb_index::config::{self, Config};
use kb_index::embedding::create_embedder;
use kb_index::index_manager::{IndexHandle, IndexManager, LazyIndexHandle};
use kb_index::ingest::{HttpFetcher, UrlIngestor};
use kb_index::knowledge_base::list_knowledge_bases;
use kb_index::render;

/// kb: incremental semantic search over local knowledge bases.
#[derive(Parser)]
#[command(name = "kb", version, about)]
struct Cli {
    /// Optional configuration file (TOML). Environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List knowledge bases.
    List,

    /// Search the index after bringing it up to date.
    Search {
        query: String,

        /// Only refresh this knowledge base before searching.
        #[arg(long)]
        kb: Option<String>,

        /// Maximum number of results.
        #[arg(long, default_value_t = 10)]
        k: usize,

        /// Maximum distance for a result to be returned.
        #[arg(long)]
        threshold: Option<f32>,
    },

    /// Refresh the index for one or all knowledge bases.
    Reindex { kb: Option<String> },

    /// Manage URL suggestions.
    Url {
        #[command(subcommand)]
        action: UrlAction,
    },
}

#[derive(Subcommand)]
enum UrlAction {
    /// Queue a URL for review.
    Suggest {
        url: String,
        kb: String,
        #[arg(long, default_value = "")]
        reason: String,
    },
    /// List URLs awaiting review.
    Pending,
    /// Approve a suggested URL: fetch, store, and index it.
    Approve { id: String },
    /// Reject a suggested URL.
    Reject { id: String },
    /// Fetch, store, and index a URL without review.
    Add { url: String, kb: String },
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kb_index=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_manager(cfg: &Config) -> kb_index::Result<IndexManager> {
    let embedder = Arc::new(create_embedder(&cfg.embedding)?);
    Ok(IndexManager::from_config(cfg, embedder))
}

async fn open_index(cfg: &Config) -> anyhow::Result<IndexHandle> {
    let mut manager = build_manager(cfg)?;
    manager.initialize().await?;
    Ok(IndexHandle::new(manager))
}

/// The index is only opened when a command actually reindexes.
fn ingestor(cfg: &Config) -> anyhow::Result<UrlIngestor> {
    let fetcher = HttpFetcher::new(Duration::from_secs(cfg.ingest.fetch_timeout_secs))?;
    let index_cfg = cfg.clone();
    let index = LazyIndexHandle::new(move || build_manager(&index_cfg));
    Ok(UrlIngestor::from_config(
        cfg,
        Arc::new(fetcher),
        Arc::new(index),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::List => {
            let names = list_knowledge_bases(&cfg.paths.knowledge_bases_root)?;
            if names.is_empty() {
                println!(
                    "No knowledge bases under {}",
                    cfg.paths.knowledge_bases_root.display()
                );
            }
            for name in names {
                println!("{}", name);
            }
        }
        Commands::Search {
            query,
            kb,
            k,
            threshold,
        } => {
            let index = open_index(&cfg).await?;
            let mut manager = index.lock().await;
            manager.update_index(kb.as_deref()).await?;
            let matches = manager.similarity_search(&query, k, threshold).await?;
            println!("{}", render::search_results(&matches));
        }
        Commands::Reindex { kb } => {
            let index = open_index(&cfg).await?;
            let report = index.lock().await.update_index(kb.as_deref()).await?;
            println!("reindex {}", kb.as_deref().unwrap_or("(all)"));
            println!("{}", render::update_report(&report));
            println!("ok");
        }
        Commands::Url { action } => {
            let ingest = ingestor(&cfg)?;
            match action {
                UrlAction::Suggest { url, kb, reason } => {
                    let request = ingest.suggest(&url, &kb, &reason).await?;
                    println!("suggested {} for '{}' (id {})", request.url, kb, request.id);
                }
                UrlAction::Pending => {
                    let pending = ingest.list_pending().await?;
                    println!("{}", render::pending_requests(&pending));
                }
                UrlAction::Approve { id } => {
                    let doc = ingest.approve(&id).await?;
                    println!("approved {} → {}", doc.url, doc.path.display());
                }
                UrlAction::Reject { id } => {
                    let request = ingest.reject(&id).await?;
                    println!("rejected {}", request.url);
                }
                UrlAction::Add { url, kb } => {
                    let doc = ingest.add_direct(&url, &kb).await?;
                    println!("added \"{}\" → {}", doc.title, doc.path.display());
                }
            }
        }
    }

    Ok(())
}
