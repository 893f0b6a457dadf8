//! Single-instance guard for the daemon.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process;

use tracing::{debug, info, warn};

use crate::config::runtime_path;
use crate::error::{ServerError, ServerResult};

/// Holds the daemon's PID file for as long as it lives.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Claims `path` for this process.
    ///
    /// A file left by a dead process, or one that does not hold a PID, is
    /// replaced. A live holder is an [`ServerError::AlreadyRunning`].
    pub fn create(path: impl Into<PathBuf>) -> ServerResult<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        match fs::read_to_string(&path) {
            Ok(contents) => match contents.trim().parse::<u32>() {
                Ok(pid) if pid_alive(pid) => {
                    return Err(ServerError::already_running(
                        path.to_string_lossy(),
                        pid,
                    ));
                }
                Ok(pid) => {
                    warn!(path = %path.display(), pid, "Replacing stale PID file");
                    fs::remove_file(&path)?;
                }
                Err(_) => {
                    warn!(path = %path.display(), "Replacing unreadable PID file");
                    fs::remove_file(&path)?;
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        // create_new: a daemon racing us between the check and here loses.
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        writeln!(file, "{}", process::id())?;
        file.sync_all()?;

        info!(path = %path.display(), pid = process::id(), "Created PID file");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed PID file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove PID file"),
        }
    }
}

#[cfg(unix)]
fn pid_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: signal 0 performs the permission and existence checks only.
    unsafe { libc::kill(pid, 0) == 0 }
}

#[cfg(not(unix))]
fn pid_alive(_pid: u32) -> bool {
    true
}

/// `pulseboard.pid` next to the default socket.
pub fn default_pid_path() -> PathBuf {
    runtime_path("pid")
}
