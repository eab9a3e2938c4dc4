//! Advisory file lock gating server creation (§4.2.1, §4.2.7).
//!
//! Uses `flock(2)` directly via `libc`, in the style of the raw stdin reader's
//! direct syscalls (`tui/raw_input.rs` in the donor tree) rather than pulling
//! in a locking crate for one syscall.

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::Path;

use anyhow::{bail, Result};

/// Holds an exclusive, non-blocking `flock` on a lock file for as long as
/// this value is alive. Dropping releases the lock (and, being a plain `fd`
/// close, also happens automatically on process exit or panic).
#[derive(Debug)]
pub struct SessionLock {
    _file: File,
}

impl SessionLock {
    /// Try to acquire the lock at `path`, creating the file if necessary.
    ///
    /// Fails immediately (does not block) if another process already holds
    /// the lock — per §4.2.1, "if the lock is already held, creation fails".
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(path)?;

        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::WouldBlock {
                bail!("failed to acquire session lock: another server is already running");
            }
            bail!("failed to acquire session lock: {err}");
        }

        Ok(Self { _file: file })
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        let _ = unsafe { libc::flock(self._file.as_raw_fd(), libc::LOCK_UN) };
    }
}
