// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory file locking and atomic JSON rewrites.
//!
//! Locks are taken on a `<file>.lock` sidecar rather than the data file
//! itself: the data file's inode is replaced by the atomic rename, so a
//! lock held on it would not exclude a writer that opened the path
//! after the swap.

use crate::StorageError;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Attempts before giving up on a contended lock.
const LOCK_ATTEMPTS: u32 = 10;

/// Delay between lock attempts.
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(25);

/// Held advisory lock; released on drop.
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Acquire the sidecar lock for `data_path` with bounded retries.
    pub fn acquire(data_path: &Path) -> Result<Self, StorageError> {
        let lock_path = lock_path_for(data_path);
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;

        for attempt in 1..=LOCK_ATTEMPTS {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Self { file }),
                Err(_) if attempt < LOCK_ATTEMPTS => std::thread::sleep(LOCK_RETRY_DELAY),
                Err(e) => {
                    tracing::warn!(path = %lock_path.display(), error = %e, "lock acquisition failed");
                }
            }
        }

        Err(StorageError::LockBusy {
            path: lock_path,
            attempts: LOCK_ATTEMPTS,
        })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

fn lock_path_for(data_path: &Path) -> PathBuf {
    let mut os = data_path.as_os_str().to_os_string();
    os.push(".lock");
    PathBuf::from(os)
}

/// Read and deserialize a JSON document, `None` when the file is absent.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Atomically rewrite a JSON document: pretty-print to a temp file in
/// the same directory, fsync, rename over the target.
pub fn save_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path_for(path);
    let json = serde_json::to_string_pretty(value)?;
    {
        use std::io::Write;
        let mut file = File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

#[cfg(test)]
#[path = "locked_tests.rs"]
mod tests;
