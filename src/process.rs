//! Process-level side effects: stopping the watchdog and exiting.

use crate::error::{HaError, Result};
use std::path::PathBuf;
use tracing::{info, warn};

/// Exit code used when the node fences itself after losing quorum.
pub const FENCE_EXIT_CODE: i32 = 1;

/// Exit code used after an operator-requested terminate.
pub const TERMINATE_EXIT_CODE: i32 = 0;

/// Hostname of the machine, from gethostname(3).
pub fn local_hostname() -> Result<String> {
    let mut buf = [0u8; 256];
    // SAFETY: the buffer is valid for `buf.len()` bytes for the whole call.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        return Err(HaError::Io(std::io::Error::last_os_error()));
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8(buf[..len].to_vec())
        .map_err(|_| HaError::Config("Hostname is not valid UTF-8".to_string()))
}

/// Process control used by self-fencing and `/ha/terminate`.
pub trait ProcessControl: Send + Sync {
    /// Ask the local watchdog to stop so it does not restart this process.
    fn stop_watchdog(&self) -> Result<()>;

    /// Terminate the process.
    fn exit(&self, code: i32);
}

/// The real process: signals the watchdog by pid file and exits.
#[derive(Debug, Clone)]
pub struct SystemProcess {
    watchdog_pid_file: PathBuf,
}

impl SystemProcess {
    pub fn new(watchdog_pid_file: impl Into<PathBuf>) -> Self {
        Self {
            watchdog_pid_file: watchdog_pid_file.into(),
        }
    }

    fn watchdog_pid(&self) -> Result<libc::pid_t> {
        let content = std::fs::read_to_string(&self.watchdog_pid_file)?;
        content
            .trim()
            .parse::<libc::pid_t>()
            .map_err(|e| HaError::Internal(format!("Invalid watchdog pid: {}", e)))
    }
}

impl ProcessControl for SystemProcess {
    fn stop_watchdog(&self) -> Result<()> {
        let pid = match self.watchdog_pid() {
            Ok(pid) => pid,
            Err(HaError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.watchdog_pid_file.display(), "No watchdog pid file");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        // SAFETY: kill(2) has no memory-safety preconditions.
        let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
        if rc != 0 {
            return Err(HaError::Io(std::io::Error::last_os_error()));
        }
        info!(pid, "Watchdog signalled to stop");
        Ok(())
    }

    fn exit(&self, code: i32) {
        info!(code, "Exiting");
        std::process::exit(code);
    }
}
