use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod aggregate;
mod compare;
mod config;
mod db;
mod models;
mod normalize;
mod report;

#[derive(Parser)]
#[command(name = "raid-ledger")]
#[command(about = "Guild raid damage rankings and raid-over-raid comparisons", long_about = None)]
struct Cli {
    /// SQLite dataset; falls back to RAID_DB_PATH, then ./txt_data.db
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SelectionArgs {
    /// Previous snapshot (default: second to last)
    #[arg(long)]
    prev: Option<String>,
    /// Current snapshot (default: last)
    #[arg(long)]
    last: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List raid snapshots in the dataset
    Snapshots,
    /// Damage share per player in one snapshot
    Participation {
        /// Snapshot to inspect (default: last)
        #[arg(long)]
        snapshot: Option<String>,
        /// Rows to show, 0 for all
        #[arg(long, default_value_t = compare::DEFAULT_TOP_N)]
        top: usize,
    },
    /// Compare two snapshots player by player
    Compare {
        #[command(flatten)]
        selection: SelectionArgs,
        /// Rows to show, 0 for all
        #[arg(long, default_value_t = compare::DEFAULT_TOP_N)]
        top: usize,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Rank players who finished every round
    Active {
        /// Snapshot to inspect (default: last)
        #[arg(long)]
        snapshot: Option<String>,
        #[arg(long, default_value = aggregate::DEFAULT_COMPLETION_MARKER)]
        marker: String,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        selection: SelectionArgs,
        /// Rows to show per table, 0 for all
        #[arg(long, default_value_t = compare::DEFAULT_TOP_N)]
        top: usize,
        #[arg(long, default_value = aggregate::DEFAULT_COMPLETION_MARKER)]
        marker: String,
        #[arg(long, default_value = "raid-report.md")]
        out: PathBuf,
    },
    /// Export the full comparison as CSV
    Export {
        #[command(flatten)]
        selection: SelectionArgs,
        #[arg(long)]
        out: PathBuf,
    },
    /// Write a demo dataset with two raids
    Seed {
        /// Target file (default: the --db path)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Import a raid log CSV (username,damage,rounds) as a new snapshot
    Import {
        #[arg(long)]
        snapshot: String,
        #[arg(long)]
        csv: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = config::resolve_db_path(cli.db);

    match cli.command {
        Commands::Seed { out } => {
            let out = seed_target(out, db_path);
            db::seed(&out).await?;
            println!("Demo dataset written to {}.", out.display());
        }
        Commands::Import { snapshot, csv } => {
            let inserted = db::import_csv(&db_path, &snapshot, &csv).await?;
            println!(
                "Imported {inserted} rows from {} into '{snapshot}'.",
                csv.display()
            );
        }
        Commands::Snapshots => {
            let pool = db::open_read_only(&db_path).await?;
            let snapshots = db::list_snapshots(&pool).await?;
            pool.close().await;

            if snapshots.is_empty() {
                return Err(db::SourceError::Empty(db_path).into());
            }
            for name in snapshots {
                println!("{name}");
            }
        }
        Commands::Participation { snapshot, top } => {
            let (selection, rows) = load_single(&db_path, snapshot.as_deref()).await?;
            let dashboard = report::build_dashboard(
                &selection,
                &[],
                &rows,
                aggregate::DEFAULT_COMPLETION_MARKER,
            );

            println!("Snapshot {}", dashboard.last_snapshot);
            print!("{}", report::overview_text(&dashboard.overview));
            println!();
            print!("{}", report::participation_table(&dashboard.participation, top));
        }
        Commands::Compare {
            selection,
            top,
            json,
        } => {
            let (selection, prev_rows, last_rows) = load_selection(
                &db_path,
                selection.prev.as_deref(),
                selection.last.as_deref(),
            )
            .await?;
            let dashboard = report::build_dashboard(
                &selection,
                &prev_rows,
                &last_rows,
                aggregate::DEFAULT_COMPLETION_MARKER,
            );

            if json {
                println!("{}", report::comparison_json(&dashboard, top)?);
            } else {
                println!(
                    "Comparing {} -> {}",
                    dashboard.prev_snapshot, dashboard.last_snapshot
                );
                println!("{}", report::trend_line(&dashboard.trends));
                println!();
                print!("{}", report::comparison_table(&dashboard.comparison, top));
            }
        }
        Commands::Active { snapshot, marker } => {
            let (selection, rows) = load_single(&db_path, snapshot.as_deref()).await?;
            let dashboard = report::build_dashboard(&selection, &[], &rows, &marker);
            println!("Snapshot {}", dashboard.last_snapshot);
            print!("{}", report::active_table(&dashboard.active));
        }
        Commands::Report {
            selection,
            top,
            marker,
            out,
        } => {
            let (selection, prev_rows, last_rows) = load_selection(
                &db_path,
                selection.prev.as_deref(),
                selection.last.as_deref(),
            )
            .await?;
            let dashboard = report::build_dashboard(&selection, &prev_rows, &last_rows, &marker);
            let markdown = report::build_report(&dashboard, top, chrono::Utc::now());
            std::fs::write(&out, markdown)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { selection, out } => {
            let (selection, prev_rows, last_rows) = load_selection(
                &db_path,
                selection.prev.as_deref(),
                selection.last.as_deref(),
            )
            .await?;
            let dashboard = report::build_dashboard(
                &selection,
                &prev_rows,
                &last_rows,
                aggregate::DEFAULT_COMPLETION_MARKER,
            );
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            report::write_comparison_csv(file, &dashboard.comparison)?;
            println!(
                "Exported {} rows to {}.",
                dashboard.comparison.len(),
                out.display()
            );
        }
    }

    Ok(())
}

fn seed_target(out: Option<PathBuf>, db_path: PathBuf) -> PathBuf {
    out.unwrap_or(db_path)
}

/// Opens the dataset for one request, resolves the snapshot pair and loads
/// both sides. The pool is closed before returning.
async fn load_selection(
    db_path: &Path,
    prev: Option<&str>,
    last: Option<&str>,
) -> anyhow::Result<(config::Selection, Vec<models::RawRecord>, Vec<models::RawRecord>)> {
    let pool = db::open_read_only(db_path).await?;
    let result = async {
        let snapshots = db::list_snapshots(&pool).await?;
        let selection = db::select_snapshots(db_path, &snapshots, prev, last)?;
        if selection.prev == selection.last {
            warn!(snapshot = %selection.last, "comparing a snapshot with itself");
        }
        info!(prev = %selection.prev, last = %selection.last, "loading snapshots");

        let prev_rows = db::load_snapshot(&pool, &selection.prev).await?;
        let last_rows = db::load_snapshot(&pool, &selection.last).await?;
        anyhow::Ok((selection, prev_rows, last_rows))
    }
    .await;
    pool.close().await;
    result
}

async fn load_single(
    db_path: &Path,
    snapshot: Option<&str>,
) -> anyhow::Result<(config::Selection, Vec<models::RawRecord>)> {
    let pool = db::open_read_only(db_path).await?;
    let result = async {
        let snapshots = db::list_snapshots(&pool).await?;
        let name = db::select_snapshots(db_path, &snapshots, None, snapshot)?.last;
        info!(snapshot = %name, "loading snapshot");

        let rows = db::load_snapshot(&pool, &name).await?;
        let selection = config::Selection {
            prev: name.clone(),
            last: name,
        };
        anyhow::Ok((selection, rows))
    }
    .await;
    pool.close().await;
    result
}
