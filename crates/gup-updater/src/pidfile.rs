//! Single-instance pid file guard
//!
//! A batch run refuses to start while a previous run still holds the pid
//! file. Liveness is probed with the null signal; a pid whose process is
//! gone counts as stale and the file is overwritten.

use crate::error::{Result, UpdateError};
use std::path::Path;
use tracing::{info, warn};

/// Claim the pid file for this process.
///
/// An existing file is scanned for pids of still-running processes; any
/// live pid aborts the run. Stale files are overwritten with our own pid.
pub fn acquire(path: &Path) -> Result<()> {
    if path.is_file() {
        let contents = std::fs::read_to_string(path)?;
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.parse::<i32>() {
                Ok(pid) => {
                    if process_alive(pid) {
                        return Err(UpdateError::InstanceRunning { pid });
                    }
                },
                Err(_) => warn!("Ignoring malformed pid file line: {:?}", line),
            }
        }
        info!("Overwriting stale pid file {}", path.display());
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, std::process::id().to_string())?;
    Ok(())
}

/// Whether a process with the given pid can be signaled
fn process_alive(pid: i32) -> bool {
    #[cfg(unix)]
    {
        unix_impl::process_alive(pid)
    }

    #[cfg(not(unix))]
    {
        // No portable liveness probe; treat the entry as stale.
        let _ = pid;
        false
    }
}

#[cfg(unix)]
mod unix_impl {
    /// Null-signal probe: nothing is delivered, the kernel only checks that
    /// the target exists and is signalable.
    pub fn process_alive(pid: i32) -> bool {
        unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
    }
}
