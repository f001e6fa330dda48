//! Backup retention and purging

use crate::backup::backup_time;
use crate::fs::LogFs;
use chrono::NaiveDateTime;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A rotated log file found next to the active log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    pub name: String,
    pub path: PathBuf,
    pub rotated_at: NaiveDateTime,
}

/// What happened during one purge pass, reported as it happens
#[derive(Debug)]
pub enum PurgeEvent<'a> {
    ListFailed { dir: &'a Path, error: &'a io::Error },
    Removed(&'a BackupFile),
    RemoveFailed { backup: &'a BackupFile, error: &'a io::Error },
}

/// Outcome of a purge pass
#[derive(Debug, Default)]
pub struct PurgeReport {
    /// Backups deleted, oldest first
    pub removed: Vec<PathBuf>,

    /// Set when the pass stopped on a listing or removal failure
    pub interrupted: bool,
}

/// Directory holding `log_path`
pub fn log_dir(log_path: &Path) -> PathBuf {
    match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// All backups of `log_path`, oldest first
///
/// Entries sharing the log's base name but without a valid rotation
/// timestamp suffix are not backups and are never returned.
pub fn list_backups<F: LogFs>(fs: &F, log_path: &Path) -> io::Result<Vec<BackupFile>> {
    let dir = log_dir(log_path);
    let Some(base_name) = log_path.file_name().and_then(|n| n.to_str()) else {
        return Ok(Vec::new());
    };

    let backups = fs
        .list_files(&dir)?
        .into_iter()
        .filter_map(|name| {
            let rotated_at = backup_time(&name, base_name)?;
            Some(BackupFile {
                path: dir.join(&name),
                name,
                rotated_at,
            })
        })
        .collect();

    Ok(backups)
}

/// The oldest backups that exceed the retention count
///
/// `max_backups` counts log generations including the one just rotated, so
/// `max_backups - 1` backups survive. Zero or negative keeps everything.
pub fn expired_backups(backups: &[BackupFile], max_backups: i32) -> &[BackupFile] {
    if max_backups <= 0 {
        return &[];
    }
    let keep = (max_backups - 1) as usize;
    let excess = backups.len().saturating_sub(keep);
    &backups[..excess]
}

/// Delete expired backups of `log_path`
///
/// Stops at the first failure; the remaining excess is retried by the next
/// rotation.
pub fn purge_backups<F: LogFs>(
    fs: &F,
    log_path: &Path,
    max_backups: i32,
    mut on_event: impl FnMut(PurgeEvent<'_>),
) -> PurgeReport {
    let mut report = PurgeReport::default();

    let backups = match list_backups(fs, log_path) {
        Ok(backups) => backups,
        Err(error) => {
            let dir = log_dir(log_path);
            warn!(
                quill.event = "purge_list_failed",
                dir = %dir.display(),
                error = %error,
                "Failed to read log directory for purge"
            );
            on_event(PurgeEvent::ListFailed {
                dir: &dir,
                error: &error,
            });
            report.interrupted = true;
            return report;
        }
    };

    for backup in expired_backups(&backups, max_backups) {
        match fs.remove(&backup.path) {
            Ok(()) => {
                debug!(
                    quill.event = "backup_purged",
                    file = %backup.path.display(),
                    "Purged backup log file"
                );
                on_event(PurgeEvent::Removed(backup));
                report.removed.push(backup.path.clone());
            }
            Err(error) => {
                warn!(
                    quill.event = "backup_purge_failed",
                    file = %backup.path.display(),
                    error = %error,
                    "Failed to remove backup log file"
                );
                on_event(PurgeEvent::RemoveFailed {
                    backup,
                    error: &error,
                });
                report.interrupted = true;
                break;
            }
        }
    }

    report
}
