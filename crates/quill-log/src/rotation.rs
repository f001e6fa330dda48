//! Log file rotation implementation
//!
//! [`RotatingFileWriter`] appends to a single file and, once the bytes written
//! since it was opened exceed the configured limit, renames the file to a
//! timestamped backup, reopens a fresh file at the original path and purges
//! backups beyond the retention count. Rotation runs inline, under the
//! exclusive lock, on whichever write crossed the threshold.
//!
//! Until a limit is configured, writes only take the shared side of the lock
//! and bump the size counter atomically.

use crate::backup::backup_path;
use crate::format::{LabelStyle, LineFormat, Severity};
use crate::fs::{LogFs, LogHandle, RealFs};
use crate::retention::{purge_backups, PurgeEvent};
use crate::{Error, Result};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, warn};
use tracing_subscriber::fmt::MakeWriter;

/// Rotation step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationStep {
    Close,
    Rename,
    Reopen,
}

impl fmt::Display for RotationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RotationStep::Close => "close",
            RotationStep::Rename => "rename",
            RotationStep::Reopen => "reopen",
        })
    }
}

struct State<H> {
    /// `None` once closed, or after a rotation that could not reopen the file
    handle: Option<H>,
    rotation_limit: u64,
    original_rotation_limit: u64,
    max_backups: i32,
    closed: bool,
}

/// A writer that rotates its file once a size limit is exceeded
pub struct RotatingFileWriter<F: LogFs = RealFs> {
    fs: F,
    path: PathBuf,
    format: LineFormat,
    current_size: AtomicU64,
    rotation_enabled: AtomicBool,
    state: RwLock<State<F::Handle>>,
}

impl RotatingFileWriter<RealFs> {
    /// Open (or create) `path` for appending
    pub fn open(path: impl Into<PathBuf>, format: LineFormat) -> Result<Self> {
        Self::open_with(RealFs, path, format)
    }
}

impl<F: LogFs> RotatingFileWriter<F> {
    /// Open `path` through a custom filesystem
    pub fn open_with(fs: F, path: impl Into<PathBuf>, format: LineFormat) -> Result<Self> {
        let path = path.into();

        let handle = fs.open_append(&path).map_err(|source| Error::Open {
            path: path.clone(),
            source,
        })?;
        let size = handle.size().map_err(|source| Error::Stat {
            path: path.clone(),
            source,
        })?;

        debug!(
            quill.event = "log_file_opened",
            file_path = %path.display(),
            current_size = size,
            "Log file opened"
        );

        Ok(Self {
            fs,
            path,
            format,
            current_size: AtomicU64::new(size),
            rotation_enabled: AtomicBool::new(false),
            state: RwLock::new(State {
                handle: Some(handle),
                rotation_limit: 0,
                original_rotation_limit: 0,
                max_backups: 0,
                closed: false,
            }),
        })
    }

    /// Append `buf` to the log, rotating first if the limit is now exceeded
    ///
    /// On a failed rotation the bytes of `buf` are already in the file; the
    /// error carries that count.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        if !self.rotation_enabled.load(Ordering::Acquire) {
            let state = self.read_state();
            let handle = state.handle.as_ref().ok_or(Error::Closed)?;
            let written = handle.append(buf).map_err(Error::Write)?;
            self.current_size
                .fetch_add(written as u64, Ordering::Relaxed);
            return Ok(written);
        }

        let mut state = self.write_state();
        let handle = state.handle.as_ref().ok_or(Error::Closed)?;
        let written = handle.append(buf).map_err(Error::Write)?;
        let size = self
            .current_size
            .fetch_add(written as u64, Ordering::Relaxed)
            + written as u64;

        if size > state.rotation_limit {
            if let Err((step, source)) = self.rotate(&mut state) {
                return Err(Error::Rotation {
                    step,
                    written,
                    source,
                });
            }
        }

        Ok(written)
    }

    /// Set the rotation threshold in bytes and enable rotation
    ///
    /// A limit of zero is ignored. The file is not rotated here even if it is
    /// already over the limit; the next write does that.
    pub fn set_limit(&self, limit: u64) {
        if limit == 0 {
            debug!(quill.event = "rotation_limit_ignored", "Ignoring zero rotation limit");
            return;
        }

        let mut state = self.write_state();
        state.original_rotation_limit = limit;
        state.rotation_limit = limit;
        self.rotation_enabled.store(true, Ordering::Release);

        if self.current_size.load(Ordering::Relaxed) > limit {
            if let Some(handle) = state.handle.as_ref() {
                let n = self.log_direct(handle, Severity::Notice, "Rotating logfile...");
                self.current_size.fetch_add(n as u64, Ordering::Relaxed);
            }
        }
    }

    /// Number of log generations to keep; zero or negative disables purging
    pub fn set_max_backups(&self, max_backups: i32) {
        self.write_state().max_backups = max_backups;
    }

    /// Close the file. Only the first call does anything.
    pub fn close(&self) -> Result<()> {
        let mut state = self.write_state();
        if state.closed {
            return Ok(());
        }
        state.closed = true;

        match state.handle.take() {
            Some(mut handle) => handle.close().map_err(Error::Close),
            None => Ok(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line_format(&self) -> &LineFormat {
        &self.format
    }

    /// Bytes appended since the file was opened or last rotated
    pub fn current_size(&self) -> u64 {
        self.current_size.load(Ordering::Relaxed)
    }

    pub fn rotation_limit(&self) -> u64 {
        self.read_state().rotation_limit
    }

    pub fn original_rotation_limit(&self) -> u64 {
        self.read_state().original_rotation_limit
    }

    pub fn max_backups(&self) -> i32 {
        self.read_state().max_backups
    }

    pub fn is_rotation_enabled(&self) -> bool {
        self.rotation_enabled.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.read_state().closed
    }

    fn read_state(&self) -> RwLockReadGuard<'_, State<F::Handle>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, State<F::Handle>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write a status line straight to `handle`, bypassing size accounting
    /// and rotation. Returns the bytes written.
    fn log_direct(&self, handle: &F::Handle, severity: Severity, message: impl fmt::Display) -> usize {
        let line = self
            .format
            .format_line(LabelStyle::Plain.label(severity), message);

        match handle.append(&line) {
            Ok(n) => n,
            Err(error) => {
                warn!(
                    quill.event = "status_write_failed",
                    file_path = %self.path.display(),
                    error = %error,
                    "Error writing to log file"
                );
                0
            }
        }
    }

    /// Caller holds the exclusive lock
    fn rotate(&self, state: &mut State<F::Handle>) -> std::result::Result<(), (RotationStep, io::Error)> {
        let Some(mut handle) = state.handle.take() else {
            return Ok(());
        };

        if let Err(close_error) = handle.close() {
            state.rotation_limit = state.rotation_limit.saturating_mul(2);
            let n = self.log_direct(
                &handle,
                Severity::Error,
                format_args!(
                    "Unable to close logfile for rotation ({}), will attempt next rotation at size {}",
                    close_error, state.rotation_limit
                ),
            );
            self.current_size.fetch_add(n as u64, Ordering::Relaxed);
            state.handle = Some(handle);

            warn!(
                quill.event = "rotation_failed",
                step = %RotationStep::Close,
                next_limit = state.rotation_limit,
                error = %close_error,
                "Log rotation postponed"
            );
            return Err((RotationStep::Close, close_error));
        }
        drop(handle);

        let backup = self.free_backup_path();
        if let Err(rename_error) = self.fs.rename(&self.path, &backup) {
            self.reopen_after_failed_rename(state, &rename_error);
            return Err((RotationStep::Rename, rename_error));
        }

        let handle = self.fs.open_append(&self.path).map_err(|open_error| {
            error!(
                quill.event = "rotation_failed",
                step = %RotationStep::Reopen,
                file_path = %self.path.display(),
                error = %open_error,
                "Unable to re-open the log file after rotation"
            );
            (RotationStep::Reopen, open_error)
        })?;

        let n = self.log_direct(
            &handle,
            Severity::Notice,
            format_args!("Rotated log, backup saved as {:?}", backup),
        );
        self.current_size.store(n as u64, Ordering::Relaxed);
        state.handle = Some(handle);
        state.rotation_limit = state.original_rotation_limit;

        info!(
            quill.event = "log_rotated",
            old_file = %self.path.display(),
            backup_file = %backup.display(),
            "Log file rotated"
        );

        if state.max_backups > 0 {
            self.purge(state);
        }

        Ok(())
    }

    /// Backup name for a rotation now, moved forward a nanosecond at a time
    /// past any existing file so an earlier backup is never overwritten
    fn free_backup_path(&self) -> PathBuf {
        let mut at = self.format.now();
        let mut backup = backup_path(&self.path, at);
        while self.fs.exists(&backup) {
            at += chrono::Duration::nanoseconds(1);
            backup = backup_path(&self.path, at);
        }
        backup
    }

    /// The old handle is already closed; keep logging to the same file and
    /// back off the limit the same way a failed close does.
    fn reopen_after_failed_rename(&self, state: &mut State<F::Handle>, rename_error: &io::Error) {
        let handle = match self.fs.open_append(&self.path) {
            Ok(handle) => handle,
            Err(open_error) => {
                error!(
                    quill.event = "rotation_failed",
                    step = %RotationStep::Rename,
                    file_path = %self.path.display(),
                    rename_error = %rename_error,
                    error = %open_error,
                    "Unable to rename or re-open the log file"
                );
                return;
            }
        };

        if let Ok(size) = handle.size() {
            self.current_size.store(size, Ordering::Relaxed);
        }
        state.rotation_limit = state.rotation_limit.saturating_mul(2);
        let n = self.log_direct(
            &handle,
            Severity::Error,
            format_args!(
                "Unable to rename logfile for rotation ({}), will attempt next rotation at size {}",
                rename_error, state.rotation_limit
            ),
        );
        self.current_size.fetch_add(n as u64, Ordering::Relaxed);
        state.handle = Some(handle);

        warn!(
            quill.event = "rotation_failed",
            step = %RotationStep::Rename,
            next_limit = state.rotation_limit,
            error = %rename_error,
            "Log rotation postponed"
        );
    }

    fn purge(&self, state: &State<F::Handle>) {
        let Some(handle) = state.handle.as_ref() else {
            return;
        };

        let mut status_bytes = 0;
        purge_backups(&self.fs, &self.path, state.max_backups, |event| {
            status_bytes += match event {
                PurgeEvent::ListFailed { dir, error } => self.log_direct(
                    handle,
                    Severity::Error,
                    format_args!(
                        "Unable to read directory {:?} for log purge ({}), will attempt next rotation",
                        dir, error
                    ),
                ),
                PurgeEvent::Removed(backup) => self.log_direct(
                    handle,
                    Severity::Notice,
                    format_args!("Purged log file {:?}", backup.name),
                ),
                PurgeEvent::RemoveFailed { backup, error } => self.log_direct(
                    handle,
                    Severity::Error,
                    format_args!(
                        "Unable to remove backup log file {:?} ({}), will attempt next rotation",
                        backup.name, error
                    ),
                ),
            };
        });
        self.current_size
            .fetch_add(status_bytes as u64, Ordering::Relaxed);
    }
}

/// A failed rotation is reported as a successful write of the bytes already
/// appended; callers such as `write_all` must not write them again.
impl<F: LogFs> io::Write for &RotatingFileWriter<F> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match RotatingFileWriter::write(*self, buf) {
            Ok(written) => Ok(written),
            Err(Error::Rotation {
                step,
                written,
                source,
            }) => {
                warn!(
                    quill.event = "rotation_failed",
                    step = %step,
                    file_path = %self.path.display(),
                    error = %source,
                    "Log rotation failed after write"
                );
                Ok(written)
            }
            Err(err) => Err(io::Error::from(err)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        // Every append goes straight to the file
        Ok(())
    }
}

// Implement MakeWriter for use with tracing-subscriber
impl<'a, F: LogFs + 'a> MakeWriter<'a> for RotatingFileWriter<F> {
    type Writer = &'a RotatingFileWriter<F>;

    fn make_writer(&'a self) -> Self::Writer {
        self
    }
}
