//! Process termination primitives.
//!
//! Targeted termination signals the supervised pid directly. Kill-by-name
//! sweeps every instance of the managed executable on the host, which is
//! how leaked processes from prior failed test runs get cleaned up; it is
//! injected as a collaborator so tests never touch the real process table.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use harness_common::{Error, Result};

/// Best-effort kill-by-name over the host's process table.
#[async_trait]
pub trait ProcessKiller: Send + Sync {
    /// Terminates every process with the given executable name. Resolves
    /// once the kill subcommand itself exits, whether or not anything was
    /// actually killed.
    async fn kill_by_name(&self, process_name: &str) -> Result<()>;
}

/// Kill-by-name via the platform's own tool: `killall` on Unix,
/// `taskkill /IM` on Windows.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessKiller;

#[async_trait]
impl ProcessKiller for SystemProcessKiller {
    async fn kill_by_name(&self, process_name: &str) -> Result<()> {
        let mut command = if cfg!(windows) {
            let mut command = Command::new("taskkill");
            command.arg("/IM").arg(format!("{process_name}.exe"));
            command
        } else {
            let mut command = Command::new("killall");
            command.arg(process_name);
            command
        };

        // A non-zero exit means nothing matched; that is not a failure of
        // the cleanup itself.
        let status = command
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await?;
        debug!(%process_name, code = ?status.code(), "kill-by-name finished");
        Ok(())
    }
}

/// Sends a termination signal to one process: SIGTERM on Unix,
/// `taskkill /PID` on Windows.
pub async fn terminate_gracefully(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
            .map_err(|e| Error::internal(format!("failed to signal pid {pid}: {e}")))
    }

    #[cfg(windows)]
    {
        let status = Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/F"])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::internal(format!("taskkill failed for pid {pid}")))
        }
    }
}
