//! Process-wide write exclusivity (spec §4.E), grounded on the original
//! Python implementation's `SingleWriterGuard` (`single_writer_guard.py`):
//! exclusive-create the lock file, write `pid\nhost\n`, advisory-lock it on
//! Unix, fail fast and name the holder if it's already present. Stale locks
//! are never force-removed — that's a deliberate operator-only cleanup.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use telemetry_core::{Error, Result};

/// Identity of whoever holds (or held) the lock file, parsed back out of
/// its contents for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolder {
    pub pid: String,
    pub host: String,
}

/// A held process-wide write lock. Dropping it releases the lock
/// (idempotent — see [`WriterGuard::release`]).
pub struct WriterGuard {
    path: PathBuf,
    file: Option<File>,
    released: bool,
}

impl WriterGuard {
    /// Acquire the lock at `path`. Fails fast (without blocking) if the
    /// file already exists — this repository's safety model is "no
    /// automatic stale-lock removal", so a previous holder's crash always
    /// requires an operator to clean up explicitly (spec §4.E).
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        if path.exists() {
            let holder = read_holder(&path);
            warn!(
                path = %path.display(),
                holder = ?holder,
                "lock file already present; another instance may be running"
            );
            return Err(Error::Store(format!(
                "writer lock held: {}{}",
                path.display(),
                holder
                    .map(|h| format!(" (pid={} host={})", h.pid, h.host))
                    .unwrap_or_default()
            )));
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;

        lock_exclusive(&file)?;

        writeln!(file, "{}", std::process::id())?;
        writeln!(file, "{}", hostname())?;
        file.flush()?;

        info!(path = %path.display(), "acquired writer lock");

        Ok(WriterGuard {
            path,
            file: Some(file),
            released: false,
        })
    }

    /// Idempotent: unlocks and unlinks on first call, no-ops afterward.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        if let Some(file) = self.file.take() {
            unlock(&file);
            drop(file);
        }
        let _ = fs::remove_file(&self.path);
        self.released = true;
        info!(path = %self.path.display(), "released writer lock");
    }
}

impl Drop for WriterGuard {
    fn drop(&mut self) {
        self.release();
    }
}

fn read_holder(path: &Path) -> Option<LockHolder> {
    let mut contents = String::new();
    File::open(path).ok()?.read_to_string(&mut contents).ok()?;
    let mut lines = contents.lines();
    let pid = lines.next()?.to_string();
    let host = lines.next()?.to_string();
    Some(LockHolder { pid, host })
}

fn hostname() -> String {
    #[cfg(unix)]
    {
        let mut buf = vec![0u8; 256];
        // SAFETY: buf is valid for gethostname's writes up to buf.len().
        let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
        if rc == 0 {
            if let Some(nul) = buf.iter().position(|&b| b == 0) {
                buf.truncate(nul);
            }
            if let Ok(s) = String::from_utf8(buf) {
                if !s.is_empty() {
                    return s;
                }
            }
        }
    }
    "unknown-host".to_string()
}

#[cfg(unix)]
fn lock_exclusive(file: &File) -> Result<()> {
    use std::os::unix::io::AsRawFd;
    // SAFETY: fd is valid for the duration of this call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc != 0 {
        return Err(Error::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(unix)]
fn unlock(file: &File) {
    use std::os::unix::io::AsRawFd;
    // SAFETY: fd is valid; errors here are logged, not fatal, during shutdown.
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

#[cfg(not(unix))]
fn lock_exclusive(_file: &File) -> Result<()> {
    // `create_new` above is already the mandatory exclusive-create
    // primitive spec §4.E asks for on Windows.
    Ok(())
}

#[cfg(not(unix))]
fn unlock(_file: &File) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquire_then_release_allows_reacquire() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("writer.lock");

        let mut guard = WriterGuard::acquire(&lock_path).unwrap();
        assert!(lock_path.exists());
        guard.release();
        assert!(!lock_path.exists());

        let guard2 = WriterGuard::acquire(&lock_path);
        assert!(guard2.is_ok());
    }

    #[test]
    fn second_acquire_fails_while_first_holds() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("writer.lock");

        let _guard = WriterGuard::acquire(&lock_path).unwrap();
        let second = WriterGuard::acquire(&lock_path);
        assert!(second.is_err());
    }

    #[test]
    fn release_is_idempotent() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("writer.lock");
        let mut guard = WriterGuard::acquire(&lock_path).unwrap();
        guard.release();
        guard.release();
    }

    #[test]
    fn drop_releases_lock() {
        let dir = tempdir().unwrap();
        let lock_path = dir.path().join("writer.lock");
        {
            let _guard = WriterGuard::acquire(&lock_path).unwrap();
            assert!(lock_path.exists());
        }
        assert!(!lock_path.exists());
    }
}
