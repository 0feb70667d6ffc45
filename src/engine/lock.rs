//! Build root lock
//!
//! One invocation per build root: a second `forge build` against the same root
//! fails fast instead of mixing artifacts. The kernel drops the lock when the
//! holding process exits, so the file itself is never deleted.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Lock file name inside the build root
pub const LOCK_FILE: &str = ".forge.lock";

/// Take an exclusive lock on `build_root`, creating the directory if needed.
/// The lock is released when the guard is dropped.
pub fn acquire_build_lock(build_root: &Path) -> Result<BuildLock> {
    std::fs::create_dir_all(build_root)
        .with_context(|| format!("Failed to create build directory: {}", build_root.display()))?;
    let lock_path = build_root.join(LOCK_FILE);

    let lock_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

    if lock_file.try_lock_exclusive().is_err() {
        return Err(anyhow::anyhow!(
            "Build directory '{}' is in use by another forge process",
            build_root.display()
        ));
    }

    Ok(BuildLock {
        _file: lock_file,
        path: lock_path,
    })
}

/// RAII guard - the lock is released when the file handle closes
#[derive(Debug)]
pub struct BuildLock {
    _file: File,
    path: PathBuf,
}

impl BuildLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    #[test]
    fn test_lock_creates_build_root() {
        let dir = TempDir::new().unwrap();
        let build_root = dir.path().join("cmake-build-release");

        let lock = acquire_build_lock(&build_root).unwrap();
        assert!(build_root.is_dir());
        assert!(lock.path().exists());
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = TempDir::new().unwrap();
        {
            let _lock = acquire_build_lock(dir.path()).unwrap();
            assert!(dir.path().join(LOCK_FILE).exists());
        }
        assert!(acquire_build_lock(dir.path()).is_ok());
    }

    #[test]
    fn test_concurrent_lock_blocked() {
        let dir = TempDir::new().unwrap();

        let _lock1 = acquire_build_lock(dir.path()).unwrap();
        let lock2 = acquire_build_lock(dir.path());
        assert!(lock2.is_err());
        assert!(lock2.unwrap_err().to_string().contains("in use by another forge process"));
    }

    #[test]
    fn test_old_held_lock_still_blocks() {
        let dir = TempDir::new().unwrap();
        let lock1 = acquire_build_lock(dir.path()).unwrap();

        let three_hours_ago = SystemTime::now() - Duration::from_secs(3 * 3600);
        File::options()
            .write(true)
            .open(lock1.path())
            .unwrap()
            .set_modified(three_hours_ago)
            .unwrap();

        assert!(acquire_build_lock(dir.path()).is_err());
        assert!(lock1.path().exists());
    }

    #[test]
    fn test_separate_roots_do_not_conflict() {
        let dir = TempDir::new().unwrap();
        let _debug = acquire_build_lock(&dir.path().join("cmake-build-debug")).unwrap();
        let release = acquire_build_lock(&dir.path().join("cmake-build-release"));
        assert!(release.is_ok());
    }
}
