use std::path::{Path, PathBuf};

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Row, Sqlite, Transaction};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Selection;
use crate::models::RawRecord;

/// Conditions that make a request impossible to answer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("database not found: {}", .0.display())]
    Missing(PathBuf),
    #[error("database {} has no snapshots", .0.display())]
    Empty(PathBuf),
    #[error("snapshot '{0}' does not exist")]
    UnknownSnapshot(String),
}

pub async fn open_read_only(path: &Path) -> anyhow::Result<SqlitePool> {
    if !path.exists() {
        return Err(SourceError::Missing(path.to_path_buf()).into());
    }

    let options = SqliteConnectOptions::new().filename(path).read_only(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    debug!(path = %path.display(), "opened dataset read-only");
    Ok(pool)
}

async fn open_writable(path: &Path) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open {} for writing", path.display()))
}

pub async fn list_snapshots(pool: &SqlitePool) -> anyhow::Result<Vec<String>> {
    let rows = sqlx::query(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name != 'sqlite_sequence' \
         ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .context("failed to list snapshots")?;

    let mut names = Vec::with_capacity(rows.len());
    for row in rows {
        names.push(row.try_get::<String, _>("name")?);
    }
    Ok(names)
}

/// Resolves the previous/current pair. Missing choices default to the two
/// last snapshots in name order; with a single snapshot both sides use it.
pub fn select_snapshots(
    db_path: &Path,
    snapshots: &[String],
    prev: Option<&str>,
    last: Option<&str>,
) -> Result<Selection, SourceError> {
    let Some(newest) = snapshots.last() else {
        return Err(SourceError::Empty(db_path.to_path_buf()));
    };
    let previous = snapshots
        .len()
        .checked_sub(2)
        .map_or(newest, |index| &snapshots[index]);

    let pick = |choice: Option<&str>, fallback: &String| match choice {
        Some(name) if snapshots.iter().any(|snapshot| snapshot == name) => Ok(name.to_string()),
        Some(name) => Err(SourceError::UnknownSnapshot(name.to_string())),
        None => Ok(fallback.clone()),
    };

    Ok(Selection {
        prev: pick(prev, previous)?,
        last: pick(last, newest)?,
    })
}

pub async fn load_snapshot(pool: &SqlitePool, snapshot: &str) -> anyhow::Result<Vec<RawRecord>> {
    // cast to text so malformed numeric cells survive decoding
    let query = format!(
        "SELECT CAST(username AS TEXT) AS username, \
         CAST(damage AS TEXT) AS damage, \
         CAST(rounds AS TEXT) AS rounds \
         FROM {}",
        quote_ident(snapshot)
    );

    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .await
        .with_context(|| format!("failed to load snapshot '{snapshot}'"))?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        records.push(RawRecord {
            username: row.try_get("username")?,
            damage: row.try_get("damage")?,
            rounds: row.try_get("rounds")?,
        });
    }

    debug!(snapshot, rows = records.len(), "loaded snapshot");
    Ok(records)
}

pub async fn seed(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("refusing to seed over existing file {}", path.display());
    }

    let raid_1 = vec![
        record("Astrid", "182340", "21/21"),
        record("astrid", "12000", "21/21"),
        record("Borin", "154900", "21/21"),
        record("Cyra", "98000", "18/21"),
        record("Dax", "n/a", "3/21"),
        record("Elowen", "143200", "21/21"),
    ];
    let raid_2 = vec![
        record("ASTRID", "201500", "21/21"),
        record("Borin", "0", "0/21"),
        record("Cyra", "99000", "21/21"),
        record("Elowen", "120450", "20/21"),
        record("Fenn", "87300", "21/21"),
    ];

    let pool = open_writable(path).await?;
    let mut tx = pool.begin().await?;
    create_snapshot(&mut tx, "raid_1", &raid_1).await?;
    create_snapshot(&mut tx, "raid_2", &raid_2).await?;
    tx.commit().await?;
    pool.close().await;

    info!(path = %path.display(), "seeded demo dataset");
    Ok(())
}

pub async fn import_csv(path: &Path, snapshot: &str, csv_path: &Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        username: String,
        damage: Option<String>,
        rounds: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to read {}", csv_path.display()))?;
    let mut rows = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        rows.push(RawRecord {
            username: Some(row.username),
            damage: row.damage,
            rounds: row.rounds,
        });
    }

    let pool = open_writable(path).await?;
    if list_snapshots(&pool).await?.iter().any(|name| name == snapshot) {
        pool.close().await;
        anyhow::bail!("snapshot '{snapshot}' already exists");
    }

    let mut tx = pool.begin().await?;
    create_snapshot(&mut tx, snapshot, &rows).await?;
    tx.commit().await?;
    pool.close().await;

    info!(snapshot, rows = rows.len(), "imported snapshot");
    Ok(rows.len())
}

async fn create_snapshot(
    tx: &mut Transaction<'_, Sqlite>,
    snapshot: &str,
    rows: &[RawRecord],
) -> anyhow::Result<()> {
    let table = quote_ident(snapshot);
    let create = format!("CREATE TABLE {table} (username TEXT, damage TEXT, rounds TEXT)");
    sqlx::query(&create)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("failed to create snapshot '{snapshot}'"))?;

    let insert = format!("INSERT INTO {table} (username, damage, rounds) VALUES (?, ?, ?)");
    for row in rows {
        sqlx::query(&insert)
            .bind(&row.username)
            .bind(&row.damage)
            .bind(&row.rounds)
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn record(username: &str, damage: &str, rounds: &str) -> RawRecord {
    RawRecord {
        username: Some(username.to_string()),
        damage: Some(damage.to_string()),
        rounds: Some(rounds.to_string()),
    }
}
