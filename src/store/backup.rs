use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

const BACKUP_PREFIX: &str = "support_relay_";
const BACKUP_EXT: &str = ".db";

/// Copies the database file into `backup_dir` and prunes all but the newest
/// `keep` copies. Returns `None` when there is no database file yet.
pub async fn snapshot(
    db_path: &Path,
    backup_dir: &Path,
    keep: usize,
) -> std::io::Result<Option<PathBuf>> {
    if !fs::try_exists(db_path).await? {
        return Ok(None);
    }

    fs::create_dir_all(backup_dir).await?;
    let name = format!(
        "{}{}{}",
        BACKUP_PREFIX,
        Utc::now().format("%Y%m%d_%H%M%S"),
        BACKUP_EXT
    );
    let target = backup_dir.join(&name);
    fs::copy(db_path, &target).await?;

    let pruned = prune(backup_dir, keep).await?;
    info!("Created database backup {} (pruned {})", name, pruned);
    Ok(Some(target))
}

async fn prune(backup_dir: &Path, keep: usize) -> std::io::Result<usize> {
    let mut backups = Vec::new();
    let mut entries = fs::read_dir(backup_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(BACKUP_PREFIX) && name.ends_with(BACKUP_EXT) {
            backups.push(name);
        }
    }

    // Names embed a sortable timestamp, so lexical order is age order.
    backups.sort();
    let excess = backups.len().saturating_sub(keep);
    for old in &backups[..excess] {
        fs::remove_file(backup_dir.join(old)).await?;
    }
    Ok(excess)
}
