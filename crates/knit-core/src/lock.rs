//! Cross-process exclusion for the state directory.
//!
//! Every save is already an atomic replace, so concurrent invocations can
//! only lose updates (last writer wins), never corrupt a document. A
//! [`StateLock`] upgrades that to mutual exclusion for callers that want it.

use crate::{KnitError, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the lock inside the state directory
pub const LOCK_FILENAME: &str = "knit.lock";

/// Held for the duration of one mutating operation. Dropping it releases
/// the lock.
pub trait LockGuard {}

/// Strategy for excluding other invocations while an operation runs
pub trait StateLock {
    /// Acquire the lock or fail with [`KnitError::Locked`]
    fn acquire(&self) -> Result<Box<dyn LockGuard>>;
}

/// No exclusion; the default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLock;

struct NoGuard;

impl LockGuard for NoGuard {}

impl StateLock for NoLock {
    fn acquire(&self) -> Result<Box<dyn LockGuard>> {
        Ok(Box::new(NoGuard))
    }
}

/// Advisory OS lock on `knit.lock`.
///
/// The file itself persists between runs and only records the last
/// holder's pid for error messages. The lock lives on the open handle, so
/// the OS drops it when the holding process exits, however it exits.
#[derive(Debug, Clone)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    /// Lock file inside `state_dir`
    pub fn in_dir(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(LOCK_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn holder_pid(&self) -> String {
        fs::read_to_string(&self.path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

struct LockFileGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard for LockFileGuard {}

impl Drop for LockFileGuard {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(path = ?self.path, error = %e, "Failed to release state lock");
        } else {
            debug!(path = ?self.path, "Released state lock");
        }
    }
}

impl StateLock for LockFile {
    fn acquire(&self) -> Result<Box<dyn LockGuard>> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        // No truncate: the current holder's pid stays readable
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Err(KnitError::Locked {
                    path: self.path.clone(),
                    pid: self.holder_pid(),
                });
            }
            return Err(e.into());
        }

        // From here the guard owns the handle, so any failure unlocks on drop
        let mut guard = LockFileGuard {
            file,
            path: self.path.clone(),
        };
        record_pid(&mut guard.file)?;

        debug!(path = ?self.path, "Acquired state lock");
        Ok(Box::new(guard))
    }
}

fn record_pid(file: &mut File) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    write!(file, "{}", std::process::id())?;
    file.sync_all()
}
