//! # release-index CLI (`rix`)
//!
//! The `rix` binary drives the index and reconciliation batch jobs.
//!
//! ## Usage
//!
//! ```bash
//! rix --config ./config/rix.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rix init` | Create the SQLite database and run schema migrations |
//! | `rix sources` | List metadata sources and whether they are usable |
//! | `rix sync <releases\|predb> [batch_size]` | Bulk-copy a table into the search index |
//! | `rix search <releases\|predb> "<query>"` | Search the index |
//! | `rix reindex <releases\|predb> <id>` | Push one row's current state to the index |
//! | `rix movies process` | Reconcile pending movie releases |
//! | `rix movies reset` | Return failed lookups to pending |
//! | `rix movies show <imdb_id>` | Print a consolidated movie record |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! rix init --config ./config/rix.toml
//!
//! # Rebuild the predb index in batches of 5000
//! rix sync predb 5000
//!
//! # Full predb documents matching a title or file name
//! rix search predb "Coraline.2009" --full
//!
//! # Reconcile up to 50 releases with JSON progress on stderr
//! rix movies process --limit 50 --progress json
//! ```

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use release_index::config::{self, Config};
use release_index::images::FsImageCache;
use release_index::index::ElasticIndex;
use release_index::models::Namespace;
use release_index::progress::ProgressMode;
use release_index::providers::{self, LocalProvider};
use release_index::reconcile::{EngineSettings, ProviderSet, ReconciliationEngine};
use release_index::{db, migrate, movie_store, search, sources, sync};

/// release-index CLI: search indexing and movie metadata reconciliation.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/rix.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "rix",
    about = "Search indexing and movie metadata reconciliation for a release indexer",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rix.toml")]
    config: PathBuf,

    /// Progress output on stderr. Defaults to `human` on a terminal and
    /// `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the releases, release_files,
    /// predb and movie_info tables. Safe to run repeatedly.
    Init,

    /// List metadata sources and their status.
    Sources,

    /// Bulk-copy a table into its search index namespace.
    ///
    /// Rows are read in ascending id order in batches; one progress mark is
    /// printed per row and a completion line at the end.
    Sync {
        /// Namespace to rebuild.
        #[arg(value_enum)]
        namespace: Namespace,

        /// Rows per batch. Defaults to `[sync] batch_size`.
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        batch_size: Option<u32>,
    },

    /// Search a namespace and print matching ids.
    Search {
        #[arg(value_enum)]
        namespace: Namespace,

        /// Free-text query. Operator characters are escaped.
        query: String,

        /// Maximum number of release ids.
        #[arg(long, default_value = "100")]
        limit: usize,

        /// Match release search names only.
        #[arg(long)]
        titles: bool,

        /// Print full predb documents (title or file name match).
        #[arg(long)]
        full: bool,
    },

    /// Push the current database state of one row to the index.
    Reindex {
        #[arg(value_enum)]
        namespace: Namespace,

        id: i64,
    },

    /// Movie metadata reconciliation.
    Movies {
        #[command(subcommand)]
        action: MoviesAction,
    },
}

#[derive(Subcommand)]
enum MoviesAction {
    /// Reconcile pending releases in the movie category range.
    ///
    /// Resolved releases are re-indexed so the catalog id is searchable.
    Process {
        /// Maximum releases to process. Defaults to `[reconcile] limit`.
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Return releases to the pending state.
    ///
    /// Without `--release`, every release that ended `no_candidate` or
    /// `unresolved` is reset.
    Reset {
        #[arg(long)]
        release: Option<i64>,
    },

    /// Print the consolidated record for a catalog id as JSON.
    Show {
        /// Catalog id, with or without the `tt` prefix.
        imdb_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Sync {
            namespace,
            batch_size,
        } => {
            run_sync(&cfg, namespace, batch_size, progress).await?;
        }
        Commands::Search {
            namespace,
            query,
            limit,
            titles,
            full,
        } => {
            run_search(&cfg, namespace, &query, limit, titles, full).await?;
        }
        Commands::Reindex { namespace, id } => {
            let pool = db::connect_existing(&cfg).await?;
            let index = ElasticIndex::new(&cfg.index)?;
            if !sync::reindex(&pool, &index, namespace, id).await? {
                bail!("No {} row with id {}", namespace, id);
            }
            println!("Reindexed {} {}", namespace, id);
        }
        Commands::Movies { action } => match action {
            MoviesAction::Process { limit } => {
                run_movies_process(&cfg, limit, progress).await?;
            }
            MoviesAction::Reset { release } => {
                let pool = db::connect_existing(&cfg).await?;
                let n = movie_store::reset_status(&pool, release).await?;
                println!("Reset {} release(s) to pending", n);
            }
            MoviesAction::Show { imdb_id } => {
                let pool = db::connect_existing(&cfg).await?;
                let id = imdb_id.trim_start_matches("tt");
                match movie_store::get_movie(&pool, id).await? {
                    Some(movie) => println!("{}", serde_json::to_string_pretty(&movie)?),
                    None => bail!("No movie record for tt{}", id),
                }
            }
        },
    }

    Ok(())
}

async fn run_sync(
    cfg: &Config,
    ns: Namespace,
    batch_size: Option<u32>,
    progress: ProgressMode,
) -> Result<()> {
    let pool = db::connect_existing(cfg).await?;
    let index = ElasticIndex::new(&cfg.index)?;
    let batch_size = batch_size.unwrap_or(cfg.sync.batch_size);
    let reporter = progress.reporter();

    let stats = sync::bulk_sync(&pool, &index, ns, batch_size, reporter.as_ref()).await?;
    println!(
        "sync {}: {} rows, {} indexed in {} batches",
        ns, stats.total, stats.indexed, stats.batches
    );
    Ok(())
}

async fn run_search(
    cfg: &Config,
    ns: Namespace,
    query: &str,
    limit: usize,
    titles: bool,
    full: bool,
) -> Result<()> {
    let index = ElasticIndex::new(&cfg.index)?;
    match ns {
        Namespace::Releases => {
            if full {
                bail!("--full applies to predb only");
            }
            let ids = if titles {
                search::release_title_search(&index, query, limit).await?
            } else {
                search::release_search(&index, query, limit).await?
            };
            for id in ids {
                println!("{}", id);
            }
        }
        Namespace::Predb if full => {
            for doc in search::predb_full_search(&index, query).await? {
                println!("{}", serde_json::to_string(&doc)?);
            }
        }
        Namespace::Predb => {
            for id in search::predb_title_search(&index, query).await? {
                println!("{}", id);
            }
        }
    }
    Ok(())
}

async fn run_movies_process(
    cfg: &Config,
    limit: Option<u32>,
    progress: ProgressMode,
) -> Result<()> {
    let pool = db::connect_existing(cfg).await?;
    let index = ElasticIndex::new(&cfg.index)?;
    let remote = providers::build_remote(cfg)?;
    let provider_set = ProviderSet {
        local: Some(Box::new(LocalProvider::new(pool.clone()))),
        remote: remote.remote,
        engines: remote.engines,
    };
    let images = FsImageCache::new(cfg)?;

    let mut engine = ReconciliationEngine::new(
        pool,
        provider_set,
        Box::new(images),
        EngineSettings::from(&cfg.reconcile),
    );
    let reporter = progress.reporter();
    let stats = engine
        .process_pending(&index, limit.unwrap_or(cfg.reconcile.limit), reporter.as_ref())
        .await?;

    println!(
        "movies: {} processed, {} resolved, {} unresolved, {} without a title",
        stats.processed, stats.resolved, stats.unresolved, stats.no_candidate
    );
    Ok(())
}
