//! Single-writer lock enforcing "one PipelineRun at a time per process"
//! (spec.md §5 Scheduling model).
//!
//! Grounded on the teacher's `xchecker-lock` use of `fd-lock` for an
//! advisory, cross-platform exclusive file lock held for the lifetime of a
//! guard value.

use camino::{Utf8Path, Utf8PathBuf};
use fd_lock::{RwLock, RwLockWriteGuard};
use skilllab_errors::{Result, SkillLabError};
use std::fs::File;

/// Holds the lock file open; the lock releases when this guard drops.
///
/// The write guard borrows the `RwLock` it came from, so the lock is
/// `Box::leak`ed to give the guard a `'static` home for the struct's
/// lifetime; one `PipelineLock` is created per process run, so the leak is
/// bounded by process lifetime.
pub struct PipelineLock {
    _guard: RwLockWriteGuard<'static, File>,
    path: Utf8PathBuf,
}

impl PipelineLock {
    /// Acquires an exclusive, non-blocking lock on `<root>/.skilllab.lock`.
    ///
    /// Returns `SkillLabError::Conflict` if another process already holds
    /// the lock, matching spec.md §5's "one PipelineRun at a time" rule.
    pub fn acquire(root: &Utf8Path) -> Result<Self> {
        let path = root.join(".skilllab.lock");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| SkillLabError::IoFailure {
                path: path.clone().into_std_path_buf(),
                source: e,
            })?;

        let lock: &'static mut RwLock<File> = Box::leak(Box::new(RwLock::new(file)));
        // try_write returns immediately rather than blocking; a held lock
        // means another pipeline run is in progress.
        match lock.try_write() {
            Ok(guard) => Ok(Self {
                _guard: guard,
                path,
            }),
            Err(_) => Err(SkillLabError::Conflict {
                detail: format!("another pipeline run already holds the lock at {path}"),
            }),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_succeeds_on_fresh_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let lock = PipelineLock::acquire(&root);
        assert!(lock.is_ok());
    }
}
