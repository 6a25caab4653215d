use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use lienscan_lib::config::{self, AppConfig};
use lienscan_lib::db::sqlite::open_database;
use lienscan_lib::pipeline::dedupe::{DedupeKey, Deduplicator, SqliteRowStore};
use lienscan_lib::pipeline::publish::publish_approved;
use lienscan_lib::pipeline::review::{ReviewStore, SqliteReviewStore};
use lienscan_lib::queue::{self, ExecutorRegistry, SqliteTaskStore, Worker, DEFAULT_MAX_RECORDS};

#[derive(Parser, Debug)]
#[command(name = "lienscan")]
#[command(about = "Lien record extraction, verification and publishing queue")]
#[command(version)]
struct Cli {
    /// Config file (JSON)
    #[arg(short, long, env = "LIENSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Override the database path from the config
    #[arg(long)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Queue a scrape job for a site and date window
    Enqueue {
        /// Site id ("12") or site key ("nyc_acris")
        #[arg(long)]
        site: String,
        /// MM/DD/YYYY
        #[arg(long)]
        start: String,
        /// MM/DD/YYYY
        #[arg(long)]
        end: String,
        #[arg(long, default_value_t = DEFAULT_MAX_RECORDS)]
        max_records: u32,
    },
    /// List tasks, newest first
    List {
        #[arg(long)]
        status: Option<String>,
    },
    /// Run the oldest pending task
    RunOnce,
    /// Run pending tasks until the queue is empty
    Run {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Requeue tasks stuck in running
    Recover {
        /// Defaults to stale_running_after_secs from the config
        #[arg(long)]
        older_than_secs: Option<u64>,
    },
    /// Remove duplicate rows from the lien store (dry run unless --apply)
    Dedupe {
        #[arg(long)]
        apply: bool,
        /// Show up to N duplicate groups
        #[arg(long, default_value_t = 10)]
        preview: usize,
    },
    /// Manual review queue
    Reviews {
        #[command(subcommand)]
        action: Option<ReviewAction>,
    },
}

#[derive(Subcommand, Debug)]
enum ReviewAction {
    /// Pending items (default)
    List,
    /// Approve an item and append its row unless it is already stored
    Approve { id: String },
    Dismiss { id: String },
}

fn main() -> Result<()> {
    lienscan_lib::init_tracing();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    let db_path = match cli.database {
        Some(path) => path,
        None => config.database_path()?,
    };
    tracing::debug!(version = config::APP_VERSION, db = %db_path.display(), "lienscan starting");

    let conn = open_database(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    match cli.command {
        Command::Enqueue {
            site,
            start,
            end,
            max_records,
        } => {
            let site_id = match config.site_by_id(&site).or_else(|| config.site_by_key(&site)) {
                Some(s) => s.site_id.clone(),
                None => site,
            };
            let id = queue::enqueue(&conn, &SqliteTaskStore::new(), &site_id, &start, &end, max_records)?;
            println!("{id}");
        }
        Command::List { status } => {
            let tasks = queue::list_tasks(&conn, &SqliteTaskStore::new(), status.as_deref())?;
            print_json(&tasks)?;
        }
        Command::RunOnce => {
            let worker = Worker::from_config(&config, ExecutorRegistry::from_config(&config));
            let rows = SqliteRowStore::new(&conn);
            match worker.run_next(&conn, &rows)? {
                Some(run) => print_json(&run)?,
                None => println!("No pending tasks"),
            }
        }
        Command::Run { limit } => {
            let worker = Worker::from_config(&config, ExecutorRegistry::from_config(&config));
            let rows = SqliteRowStore::new(&conn);
            let runs = worker.run_until_idle(&conn, &rows, limit)?;
            print_json(&runs)?;
        }
        Command::Recover { older_than_secs } => {
            let secs = older_than_secs.unwrap_or(config.stale_running_after_secs);
            let worker = Worker::from_config(&config, ExecutorRegistry::new());
            let recovered = worker.recover_stale(&conn, Duration::from_secs(secs))?;
            print_json(&recovered)?;
        }
        Command::Dedupe { apply, preview } => {
            let rows = SqliteRowStore::new(&conn);
            let deduper = Deduplicator::new(&rows, DedupeKey::standard());
            if preview > 0 {
                print_json(&deduper.preview_duplicates(preview)?)?;
            }
            print_json(&deduper.dedupe(!apply)?)?;
        }
        Command::Reviews { action } => {
            let store = SqliteReviewStore::new();
            match action.unwrap_or(ReviewAction::List) {
                ReviewAction::List => print_json(&store.get_pending(&conn)?)?,
                ReviewAction::Approve { id } => {
                    let item = store.approve_item(&conn, &id)?;
                    let rows = SqliteRowStore::new(&conn);
                    let outcome = publish_approved(&item, &rows, &DedupeKey::standard())?;
                    print_json(&serde_json::json!({ "item": item, "published": outcome }))?;
                }
                ReviewAction::Dismiss { id } => {
                    store.dismiss_item(&conn, &id)?;
                    println!("Dismissed {id}");
                }
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
