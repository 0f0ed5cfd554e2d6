//! Retention sweep over dated snapshot directories
//!
//! Every run writes into `<output>/<YYYY-MM-DD>`. The sweep lists the
//! immediate subdirectories of the output root, reads each name as a UTC
//! calendar date and removes those older than the retention window.
//! It is best-effort: problems are logged and the sweep moves on.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directory name format of a snapshot
pub const SNAPSHOT_DATE_FORMAT: &str = "%Y-%m-%d";

/// What a sweep did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Snapshot directories deleted
    pub removed: Vec<PathBuf>,
    /// Directories left alone because their name is not a date
    pub skipped: Vec<PathBuf>,
}

/// Delete snapshots under `root` older than `retention_days`, measured from now
pub async fn prune_expired_snapshots(root: &Path, retention_days: u32) -> PruneReport {
    prune(root, retention_days, Utc::now()).await
}

/// Delete snapshots under `root` older than `retention_days` relative to `now`
///
/// A snapshot is removed when `now - date > retention_days * 24h`, where the
/// date is taken at 00:00 UTC. A snapshot exactly at the boundary is kept.
///
/// Never fails: a missing root is a no-op, and errors on individual entries
/// are logged without stopping the sweep.
pub async fn prune(root: &Path, retention_days: u32, now: DateTime<Utc>) -> PruneReport {
    use tokio::fs;

    let mut report = PruneReport::default();
    let window = Duration::days(i64::from(retention_days));

    let mut entries = match fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(?root, "snapshot root does not exist, nothing to prune");
            return report;
        }
        Err(e) => {
            warn!(?root, error = %e, "failed to list snapshot root");
            return report;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(?root, error = %e, "failed to read snapshot root entry");
                break;
            }
        };
        let path = entry.path();

        match entry.file_type().await {
            Ok(file_type) if file_type.is_dir() => {}
            Ok(_) => continue,
            Err(e) => {
                warn!(?path, error = %e, "failed to inspect entry");
                continue;
            }
        }

        let Some(taken) = snapshot_time(&entry.file_name().to_string_lossy()) else {
            debug!(?path, "not a snapshot directory, skipping");
            report.skipped.push(path);
            continue;
        };

        if now - taken <= window {
            continue;
        }

        match fs::remove_dir_all(&path).await {
            Ok(()) => {
                info!(?path, "removed expired snapshot");
                report.removed.push(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(?path, "snapshot already gone");
            }
            Err(e) => warn!(?path, error = %e, "failed to remove expired snapshot"),
        }
    }

    report
}

/// Start of the UTC day a snapshot directory is named after
fn snapshot_time(name: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(name, SNAPSHOT_DATE_FORMAT)
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
}
