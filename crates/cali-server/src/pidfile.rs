//! PID file guarding against a second daemon.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

use tracing::{debug, info, warn};

use crate::error::{ServerError, ServerResult};

/// Holds the PID file for the lifetime of the daemon; removed on drop.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Writes our PID to `path`. A file naming a live process is an error;
    /// stale or unreadable files are replaced.
    pub fn create(path: impl Into<PathBuf>) -> ServerResult<Self> {
        let path = path.into();

        if path.exists() {
            match read_pid(&path) {
                Some(pid) if is_process_running(pid) => {
                    return Err(ServerError::already_running(path.to_string_lossy()));
                }
                Some(pid) => warn!(path = %path.display(), pid, "removing stale PID file"),
                None => warn!(path = %path.display(), "removing invalid PID file"),
            }
            fs::remove_file(&path)?;
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let pid = process::id();
        let mut file = fs::File::create(&path)?;
        writeln!(file, "{pid}")?;
        file.sync_all()?;
        info!(path = %path.display(), pid, "created PID file");

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> u32 {
        process::id()
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed PID file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove PID file"),
        }
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: signal 0 performs only the existence and permission check.
    unsafe { libc::kill(pid, 0) == 0 }
}

#[cfg(not(unix))]
fn is_process_running(_pid: u32) -> bool {
    true
}
