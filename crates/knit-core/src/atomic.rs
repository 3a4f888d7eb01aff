//! Whole-document writes that never leave a torn file behind.
//!
//! Both helpers stage the bytes in a temp file next to the target so the
//! final step is a same-directory rename or link.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Replace `path` with `bytes`. Readers see either the old or the new
/// document.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let temp = stage(path, bytes)?;
    temp.persist(path).map_err(|err| err.error)?;
    sync_parent(path);

    debug!(path = ?path, size = bytes.len(), "Replaced file");
    Ok(())
}

/// Create `path` with `bytes`, failing with `AlreadyExists` if anything is
/// already there.
pub(crate) fn create_exclusive(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let temp = stage(path, bytes)?;
    temp.persist_noclobber(path).map_err(|err| err.error)?;
    sync_parent(path);

    debug!(path = ?path, size = bytes.len(), "Created file");
    Ok(())
}

fn stage(path: &Path, bytes: &[u8]) -> io::Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    Ok(temp)
}

fn sync_parent(path: &Path) {
    #[cfg(unix)]
    {
        if let Some(dir) = path.parent() {
            if let Ok(dir) = fs::File::open(dir) {
                let _ = dir.sync_all();
            }
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}
