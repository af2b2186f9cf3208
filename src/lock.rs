//! Lock file management for single-instance enforcement.
//!
//! Only one scheduler instance may run process-wide; the persisted snooze
//! state is written without coordination on that assumption. The lock file
//! lives in the runtime directory and records our PID so stale locks from
//! crashed processes can be detected and reclaimed.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Path of the lock file in the runtime directory.
pub fn lock_path() -> PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(runtime_dir).join("slumbr.lock")
}

/// Acquire an exclusive lock on the lock file.
///
/// # Returns
/// - `Ok(Some((lock_file, lock_path)))` if the lock was acquired
/// - `Ok(None)` if another live instance holds it (already reported)
/// - `Err(_)` on filesystem errors
pub fn acquire_lock() -> Result<Option<(File, PathBuf)>> {
    let path = lock_path();

    // Open without truncating to preserve the current holder's PID
    let mut lock_file = std::fs::OpenOptions::new()
        .write(true)
        .read(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .with_context(|| format!("failed to open lock file {}", path.display()))?;

    match lock_file.try_lock_exclusive() {
        Ok(()) => {
            lock_file.set_len(0)?;
            lock_file.seek(SeekFrom::Start(0))?;
            writeln!(&lock_file, "{}", std::process::id())?;
            lock_file.flush()?;
            Ok(Some((lock_file, path)))
        }
        Err(_) => {
            report_lock_conflict(&path);
            Ok(None)
        }
    }
}

/// Release and remove the lock file.
pub fn release_lock(lock_file: File, path: &Path) {
    let _ = fs2::FileExt::unlock(&lock_file);
    drop(lock_file);
    let _ = std::fs::remove_file(path);
}

fn report_lock_conflict(path: &Path) {
    let holder = std::fs::read_to_string(path)
        .ok()
        .and_then(|content| content.lines().next().map(str::to_string));
    log_pipe!();
    match holder {
        Some(pid) if !pid.is_empty() => {
            log_error!("Another slumbr instance is already running (PID {})", pid);
        }
        _ => {
            log_error!("Another slumbr instance is already running");
        }
    }
    log_indented!("Stop it first, or remove {} if it is stale", path.display());
}
