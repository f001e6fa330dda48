//! Filesystem seam for the rotating writer.
//!
//! The writer only ever touches the disk through [`LogFs`] so rotation failures
//! (close, rename, reopen, remove) can be exercised in tests.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Permission bits for newly created log files (owner rw, group r).
pub const DEFAULT_LOG_PERMS: u32 = 0o640;

/// An open, append-only log file.
pub trait LogHandle: Send + Sync {
    /// Append the buffer and return the bytes written.
    ///
    /// A short count means the append failed after that many bytes reached the
    /// file. Takes `&self` so concurrent appends can share one handle.
    fn append(&self, buf: &[u8]) -> io::Result<usize>;

    /// Current size of the file on disk.
    fn size(&self) -> io::Result<u64>;

    /// Flush everything to stable storage before the handle is released.
    fn close(&mut self) -> io::Result<()>;
}

/// Filesystem operations used by rotation and purge.
pub trait LogFs: Send + Sync {
    type Handle: LogHandle;

    /// Open `path` for appending, creating it if absent.
    fn open_append(&self, path: &Path) -> io::Result<Self::Handle>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Names of the non-directory entries of `dir`, sorted lexically.
    fn list_files(&self, dir: &Path) -> io::Result<Vec<String>>;

    fn remove(&self, path: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;
}

/// Real filesystem implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

/// Log file opened by [`RealFs`].
#[derive(Debug)]
pub struct LogFile {
    file: File,
}

impl LogHandle for LogFile {
    fn append(&self, buf: &[u8]) -> io::Result<usize> {
        let mut written = 0;
        while written < buf.len() {
            match (&self.file).write(&buf[written..]) {
                Ok(0) if written == 0 => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to append to log file",
                    ))
                }
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if written == 0 => return Err(e),
                // Report what reached the file so the size stays accurate
                Err(_) => break,
            }
        }
        Ok(written)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn close(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }
}

impl LogFs for RealFs {
    type Handle = LogFile;

    fn open_append(&self, path: &Path) -> io::Result<LogFile> {
        let mut options = OpenOptions::new();
        options.create(true).append(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(DEFAULT_LOG_PERMS);
        }

        Ok(LogFile {
            file: options.open(path)?,
        })
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn list_files(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }
            // Backup names are always valid UTF-8; anything else can't match
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
