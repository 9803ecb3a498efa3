/// Advisory write lock for a topic.
///
/// The lock is a `.write.lock` file in the topic's `memory/` directory,
/// created with `create_new`. It is held across the dimension check and the
/// write, so a second writer on any log of the same topic fails fast.
/// Readers never take it.
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use super::StoreError;

/// Lock file name inside a topic's memory directory.
pub const LOCK_FILE: &str = ".write.lock";

/// Held for the duration of an append; removes the lock file on drop.
#[derive(Debug)]
pub struct WriteLock {
    path: PathBuf,
}

/// Lock file path for a topic's memory directory.
pub fn lock_path(memory_dir: &Path) -> PathBuf {
    memory_dir.join(LOCK_FILE)
}

impl WriteLock {
    pub fn acquire(memory_dir: &Path) -> Result<Self, StoreError> {
        let path = lock_path(memory_dir);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                // Owner pid, reported to a blocked writer
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let owner = fs::read_to_string(&path)
                    .ok()
                    .and_then(|s| s.trim().parse().ok());
                Err(StoreError::Locked { path, owner })
            }
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to release write lock {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_second_writer_rejected() {
        let temp = tempdir().unwrap();
        let dir = temp.path();

        let guard = WriteLock::acquire(dir).unwrap();
        assert!(lock_path(dir).exists());

        let err = WriteLock::acquire(dir).unwrap_err();
        match &err {
            StoreError::Locked { path, owner } => {
                assert_eq!(path, &lock_path(dir));
                assert_eq!(*owner, Some(std::process::id()));
            }
            other => panic!("unexpected error: {other}"),
        }
        let message = err.to_string();
        assert!(message.contains(".write.lock"), "{message}");
        assert!(message.contains("if no ingest is running"), "{message}");

        drop(guard);
        assert!(!lock_path(dir).exists());
        assert!(WriteLock::acquire(dir).is_ok());
    }

    #[test]
    fn test_leftover_lock_names_its_file() {
        let temp = tempdir().unwrap();
        fs::write(lock_path(temp.path()), "not a pid\n").unwrap();

        let err = WriteLock::acquire(temp.path()).unwrap_err();
        assert!(matches!(err, StoreError::Locked { owner: None, .. }));
        assert!(err.to_string().contains(&lock_path(temp.path()).display().to_string()));
    }

    #[test]
    fn test_lock_path() {
        assert_eq!(
            lock_path(Path::new("/t/memory")),
            PathBuf::from("/t/memory/.write.lock")
        );
    }
}
