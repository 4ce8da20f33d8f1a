use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "RAID_DB_PATH";
pub const DEFAULT_DB_FILE: &str = "txt_data.db";

/// Picks the dataset location: explicit flag, then `RAID_DB_PATH`, then
/// `txt_data.db` in the working directory.
pub fn resolve_db_path(flag: Option<PathBuf>) -> PathBuf {
    resolve_db_path_from(flag, std::env::var(DB_PATH_ENV).ok())
}

fn resolve_db_path_from(flag: Option<PathBuf>, env_value: Option<String>) -> PathBuf {
    flag.or_else(|| {
        env_value
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
    })
    .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE))
}

/// Snapshots a request compares; `prev` and `last` may be the same table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub prev: String,
    pub last: String,
}
