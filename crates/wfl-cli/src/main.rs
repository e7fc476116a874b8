//! Operator CLI for the fulfillment ledger.
//!
//! Thin by design: every command resolves a pool and calls into `wfl-db`.
//! Output is `key=value` lines except `report`, which emits JSON.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;

#[derive(Parser)]
#[command(name = "wfl")]
#[command(about = "Warehouse fulfillment ledger CLI", long_about = None)]
struct Cli {
    /// Layered config YAML paths in merge order. When given, the ledger URL
    /// comes from the merged config (WFL_DATABASE_URL still wins) instead of
    /// the bare env var.
    #[arg(long = "config", global = true)]
    config: Vec<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> operator)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// List distinct shelves in natural sort order
    Shelves,

    /// Print the earliest shelf that still has unpicked stock
    NextShelf,

    /// Print the next unpicked box for a TL on a shelf
    NextBox {
        #[arg(long)]
        tl: String,

        #[arg(long)]
        shelf: String,
    },

    /// Assign fresh box ids to shipments, earliest unboxed rows first
    AssignBoxes {
        /// Box ids to hand out, in order
        #[arg(long = "box-id", required = true)]
        box_ids: Vec<String>,

        /// Shipment (STN) ids to receive them, in priority order
        #[arg(long = "stn", required = true)]
        stns: Vec<String>,
    },

    /// Rebuild the ledger so physical row order follows shelf order
    Reorg,

    /// Pack-readiness report as JSON
    Report,
}

#[derive(Subcommand)]
enum DbCmd {
    /// Create the ledger table and indexes if absent
    Init,

    Status,

    /// Add a text/integer column to the ledger (no-op if present)
    AddColumn {
        #[arg(long)]
        name: String,

        /// SQLite column type, e.g. text or integer
        #[arg(long, default_value = "text")]
        ty: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Dev convenience; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let Cli { config, cmd } = Cli::parse();

    match cmd {
        Commands::Db { cmd } => {
            let pool = pool(&config).await?;
            match cmd {
                DbCmd::Init => {
                    wfl_db::ensure_schema(&pool).await?;
                    println!("schema_ready=true");
                }
                DbCmd::Status => {
                    wfl_db::ensure_schema(&pool).await?;
                    let rows = wfl_db::fetch_all_rows(&pool).await?;
                    let unpicked = rows.iter().filter(|r| !r.is_picked()).count();
                    println!("db_ok=true rows={} unpicked={}", rows.len(), unpicked);
                }
                DbCmd::AddColumn { name, ty } => {
                    let added = wfl_db::add_column_if_missing(&pool, &name, &ty).await?;
                    println!("column={} added={}", name, added);
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = wfl_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Shelves => {
            let pool = pool(&config).await?;
            for shelf in wfl_db::distinct_shelves_sorted(&pool).await? {
                println!("{shelf}");
            }
        }

        Commands::NextShelf => {
            let pool = pool(&config).await?;
            match wfl_db::next_unpicked_shelf(&pool).await? {
                Some(shelf) => println!("next_shelf={shelf}"),
                None => println!("next_shelf=NONE"),
            }
        }

        Commands::NextBox { tl, shelf } => {
            let pool = pool(&config).await?;
            match wfl_db::next_unpicked_box_for_tl_shelf(&pool, &tl, &shelf).await? {
                Some(box_id) => println!("tl={tl} shelf={shelf} next_box={box_id}"),
                None => println!("tl={tl} shelf={shelf} next_box=NONE"),
            }
        }

        Commands::AssignBoxes { box_ids, stns } => {
            let pool = pool(&config).await?;
            let assigned = wfl_db::assign_box_ids_to_stns(&pool, &box_ids, &stns).await?;
            if assigned.len() < box_ids.len() {
                tracing::warn!(
                    offered = box_ids.len(),
                    assigned = assigned.len(),
                    "not every box id found an unboxed row"
                );
            }
            for a in assigned {
                println!("box_id={} stn={}", a.box_id, a.stn);
            }
        }

        Commands::Reorg => {
            let pool = pool(&config).await?;
            wfl_db::sort_by_shelf_ascending(&pool).await?;
            println!("reorg=done");
        }

        Commands::Report => {
            let pool = pool(&config).await?;
            let report = serde_json::json!({
                "generated_at": Utc::now().to_rfc3339(),
                "all_tls_complete": wfl_db::all_tls_complete(&pool).await?,
                "boxes_to_pack": wfl_db::box_ids_to_pack(&pool).await?,
                "next_shelf": wfl_db::next_unpicked_shelf(&pool).await?,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

async fn pool(config_paths: &[String]) -> Result<SqlitePool> {
    if config_paths.is_empty() {
        return wfl_db::connect_from_env()
            .await
            .context("connecting to ledger database (set WFL_DATABASE_URL or pass --config)");
    }

    let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = wfl_config::load_layered_yaml(&path_refs)?;
    tracing::debug!(
        config_hash = %loaded.config_hash,
        owner = loaded.config.owner_id.as_deref().unwrap_or("-"),
        "config loaded"
    );
    wfl_db::connect(&loaded.config.database_url)
        .await
        .with_context(|| format!("connecting to ledger database {}", loaded.config.database_url))
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
