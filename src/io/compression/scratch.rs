use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, warn};
use tempfile::TempDir;

/// Paths whose deletion failed, to be retried by [`retry_deferred_deletions`]
static DEFERRED: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());

fn defer_deletion(path: PathBuf, error: io::Error) {
    warn!(
        "Failed to delete scratch path {}, deferring: {error}",
        path.display()
    );
    let mut deferred = DEFERRED.lock().unwrap_or_else(|e| e.into_inner());
    deferred.push(path);
}

fn remove_path(path: &Path) -> io::Result<()> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Try again to delete every path whose deletion failed earlier, returning the
/// number still left over.
pub fn retry_deferred_deletions() -> usize {
    let mut deferred = DEFERRED.lock().unwrap_or_else(|e| e.into_inner());
    deferred.retain(|path| match remove_path(path) {
        Ok(()) => false,
        Err(e) => {
            debug!("Still unable to delete {}: {e}", path.display());
            true
        }
    });
    deferred.len()
}

/// The paths currently waiting for deferred deletion
pub fn deferred_deletions() -> Vec<PathBuf> {
    DEFERRED
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

#[derive(Debug)]
enum ScratchEntry {
    Directory(TempDir),
    Path(PathBuf),
}

/// The temporary files and directories owned by one decorated reader or writer.
///
/// Everything is deleted exactly once, on [`ScratchSpace::cleanup`] or when the
/// value is dropped, whichever comes first. Paths that cannot be deleted are
/// logged and queued for [`retry_deferred_deletions`].
#[derive(Debug, Default)]
pub struct ScratchSpace {
    root: Option<PathBuf>,
    entries: Vec<ScratchEntry>,
}

impl ScratchSpace {
    /// Create an empty scratch space whose directories are placed under `root`,
    /// or the system temporary directory.
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            entries: Vec::new(),
        }
    }

    /// Create a fresh temporary directory owned by this scratch space
    pub fn create_dir(&mut self) -> io::Result<PathBuf> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("mzpeaklist-");
        let dir = match self.root.as_deref() {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        let path = dir.path().to_path_buf();
        self.entries.push(ScratchEntry::Directory(dir));
        Ok(path)
    }

    /// Take ownership of a path created by someone else, e.g. an external converter
    pub fn adopt_path(&mut self, path: PathBuf) {
        self.entries.push(ScratchEntry::Path(path))
    }

    /// Every path this scratch space will delete
    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries
            .iter()
            .map(|entry| match entry {
                ScratchEntry::Directory(dir) => dir.path().to_path_buf(),
                ScratchEntry::Path(path) => path.clone(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Delete everything. Later calls do nothing.
    pub fn cleanup(&mut self) {
        for entry in self.entries.drain(..) {
            match entry {
                ScratchEntry::Directory(dir) => {
                    let path = dir.path().to_path_buf();
                    match dir.close() {
                        Ok(()) => debug!("Deleted scratch directory {}", path.display()),
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                        Err(e) => defer_deletion(path, e),
                    }
                }
                ScratchEntry::Path(path) => {
                    if let Err(e) = remove_path(&path) {
                        defer_deletion(path, e)
                    }
                }
            }
        }
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        self.cleanup()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cleanup() -> io::Result<()> {
        let root = tempfile::tempdir()?;
        let mut scratch = ScratchSpace::new(Some(root.path().to_path_buf()));
        let dir = scratch.create_dir()?;
        fs::write(dir.join("a.mgf"), "BEGIN IONS\n")?;
        let adopted = root.path().join("adopted.mgf");
        fs::write(&adopted, "")?;
        scratch.adopt_path(adopted.clone());
        assert_eq!(scratch.paths(), vec![dir.clone(), adopted.clone()]);
        assert!(dir.starts_with(root.path()));

        scratch.cleanup();
        assert!(!dir.exists());
        assert!(!adopted.exists());
        assert!(scratch.is_empty());
        scratch.cleanup();
        Ok(())
    }

    #[test]
    fn test_drop() -> io::Result<()> {
        let dir = {
            let mut scratch = ScratchSpace::default();
            scratch.create_dir()?
        };
        assert!(!dir.exists());
        Ok(())
    }

    #[test]
    fn test_retry_deferred() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("never-created");
        defer_deletion(missing.clone(), io::Error::new(io::ErrorKind::Other, "locked"));
        assert!(deferred_deletions().contains(&missing));
        retry_deferred_deletions();
        assert!(!deferred_deletions().contains(&missing));
    }
}
