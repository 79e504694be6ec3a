//! The process supervisor.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use harness_common::{
    EnvironmentProvider, Error, FlushStatus, Result, ServerLifecycle, SupervisorConfig,
    SystemEnvironment,
};
use harness_retry::{HttpOptions, RetryingClient};

use crate::kill::{terminate_gracefully, ProcessKiller, SystemProcessKiller};
use crate::logbuf::LogBuffer;
use crate::resolve::resolve_executable;
use crate::state::SupervisorState;

/// Fixed delay after `stop`, giving the OS time to reap the process and
/// release its bound ports before the caller proceeds.
pub const STOP_QUIESCENCE: Duration = Duration::from_millis(500);

/// Parent environment variables forwarded to the child. Only
/// path-resolution and interpreter-location variables: the managed
/// server's config templating interpolates arbitrary environment
/// variables, so everything else stays out.
const ENV_ALLOWLIST: [&str; 3] = ["PATH", "VIRTUAL_ENV", "PYTHONPATH"];

/// Asynchronous report of a managed process that exited with a non-zero
/// code. By the time the exit is observed the `start` caller has usually
/// already returned, so this is published on a channel and logged rather
/// than raised into anyone's call stack.
#[derive(Debug, Clone)]
pub struct ExitReport {
    pub code: i32,
    pub logs: String,
}

/// The single live OS process owned by a supervisor.
///
/// The `Child` itself lives inside the exit watcher task; the supervisor
/// keeps the pid for signalling.
struct ManagedProcess {
    pid: u32,
    _watcher: JoinHandle<()>,
    _stderr_task: JoinHandle<()>,
}

#[derive(Debug, Deserialize)]
struct RootInfo {
    http_api_version: String,
}

/// Supervisor for one external long-running test server.
///
/// Owns at most one live process at a time. Lifecycle operations are not
/// designed for concurrent invocation against the same supervisor; callers
/// are expected to await each operation before issuing the next.
pub struct ServerSupervisor {
    config: SupervisorConfig,
    client: RetryingClient,
    env: Arc<dyn EnvironmentProvider>,
    killer: Arc<dyn ProcessKiller>,
    process: Option<ManagedProcess>,
    state: SupervisorState,
    log_buffer: LogBuffer,
    http_api_version: Option<String>,
    exit_tx: UnboundedSender<ExitReport>,
    exit_rx: Option<UnboundedReceiver<ExitReport>>,
}

impl ServerSupervisor {
    /// Creates a supervisor backed by the real environment and process
    /// table.
    pub fn new(config: SupervisorConfig) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(SystemEnvironment),
            Arc::new(SystemProcessKiller),
        )
    }

    /// Creates a supervisor with injected OS collaborators. Tests use
    /// this to supply fakes.
    pub fn with_collaborators(
        config: SupervisorConfig,
        env: Arc<dyn EnvironmentProvider>,
        killer: Arc<dyn ProcessKiller>,
    ) -> Self {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        Self {
            config,
            client: RetryingClient::new(),
            env,
            killer,
            process: None,
            state: SupervisorState::Stopped,
            log_buffer: LogBuffer::new(),
            http_api_version: None,
            exit_tx,
            exit_rx: Some(exit_rx),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Whether a managed process is currently owned.
    pub fn is_started(&self) -> bool {
        self.process.is_some()
    }

    /// Takes the receiving end of the exit-report channel. Non-zero exits
    /// of the managed process are published here; can be taken once.
    pub fn exit_reports(&mut self) -> Option<UnboundedReceiver<ExitReport>> {
        self.exit_rx.take()
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), suffix)
    }

    fn build_child_env(&self, overrides: &HashMap<String, String>) -> HashMap<String, String> {
        let mut child_env = HashMap::new();
        for key in ENV_ALLOWLIST {
            if let Some(value) = self.env.var(key) {
                child_env.insert(key.to_string(), value);
            }
        }
        child_env.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        child_env
    }

    /// Sets the config file path used by the next `start`.
    pub fn load_config(&mut self, path_to_config: &str) {
        debug!(path = %path_to_config, "config path updated for next start");
        self.config.config_path = path_to_config.to_string();
    }

    /// Spawns the managed server and waits for it to become ready.
    ///
    /// Fails fast with [`Error::AlreadyStarted`] if a process is already
    /// owned and with [`Error::ExecutableNotFound`] if the configured
    /// executable cannot be resolved. A readiness failure propagates
    /// [`Error::MaxAttemptsExceeded`] and leaves the supervisor in
    /// `Starting` with the process alive; callers should `stop` it.
    pub async fn start(&mut self, env: HashMap<String, String>) -> Result<String> {
        if self.process.is_some() {
            return Err(Error::AlreadyStarted);
        }

        let executable = resolve_executable(&self.config.executable_path, self.env.as_ref())?;
        let child_env = self.build_child_env(&env);

        // A new process gets a fresh buffer; old output is gone.
        self.log_buffer.clear();
        self.http_api_version = None;

        let mut command = Command::new(&executable);
        command
            .arg(&self.config.config_path)
            .env_clear()
            .envs(&child_env)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped());
        // Detach into its own process group so supervisor termination
        // never has to wait on the child.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::executable_not_found(self.config.executable_path.clone())
            } else {
                Error::Io(e)
            }
        })?;

        let pid = child
            .id()
            .ok_or_else(|| Error::internal("spawned process has no pid"))?;
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(collect_stderr(stderr, self.log_buffer.clone()));
        let watcher = tokio::spawn(watch_exit(
            child,
            self.log_buffer.clone(),
            self.exit_tx.clone(),
        ));

        self.process = Some(ManagedProcess {
            pid,
            _watcher: watcher,
            _stderr_task: stderr_task,
        });
        self.state = SupervisorState::Starting;
        info!(
            pid,
            executable = %executable.display(),
            config = %self.config.config_path,
            "managed server spawned"
        );

        self.ping().await
    }

    /// Polls the managed server's root endpoint and records the reported
    /// HTTP API version. Works against pre-existing instances this
    /// supervisor did not spawn.
    pub async fn ping(&mut self) -> Result<String> {
        let response = self
            .client
            .request(&self.endpoint(""), &HttpOptions::get(), self.config.max_attempts)
            .await?;
        let root: RootInfo = response.json()?;

        self.http_api_version = Some(root.http_api_version.clone());
        if self.state == SupervisorState::Starting {
            self.state = SupervisorState::Running;
            info!(version = %root.http_api_version, "managed server ready");
        }
        Ok(root.http_api_version)
    }

    /// Asks the managed server to reset its state. The raw status is
    /// returned for the caller to interpret; 202 is the expected answer.
    pub async fn flush(&mut self) -> Result<FlushStatus> {
        let response = self
            .client
            .request(
                &self.endpoint("__flush__"),
                &HttpOptions::post(),
                self.config.max_attempts,
            )
            .await?;
        Ok(FlushStatus {
            status: response.status.as_u16(),
        })
    }

    /// Terminates the owned process, if any, then waits a fixed
    /// quiescence delay so the OS can reap it and release its ports.
    /// A no-op (apart from the wait) with no owned process.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(process) = self.process.take() {
            info!(pid = process.pid, "stopping managed server");
            if let Err(e) = terminate_gracefully(process.pid).await {
                warn!(pid = process.pid, error = %e, "termination signal failed");
            }
            // The watcher and stderr tasks run to completion on their own
            // once the process exits.
            drop(process);
        }
        self.state = SupervisorState::Stopped;
        tokio::time::sleep(STOP_QUIESCENCE).await;
        Ok(())
    }

    /// Kills every instance of the managed executable on the host by
    /// name, whether or not this supervisor spawned it.
    pub async fn kill_all(&mut self) -> Result<()> {
        let name = Path::new(&self.config.executable_path)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.config.executable_path)
            .to_string();
        info!(process_name = %name, "killing all managed server instances");
        self.killer.kill_by_name(&name).await
    }

    /// Diagnostic output captured from the current process, in arrival
    /// order.
    pub fn logs(&self) -> String {
        self.log_buffer.contents()
    }

    pub fn http_api_version(&self) -> Option<&str> {
        self.http_api_version.as_deref()
    }
}

async fn collect_stderr(stderr: Option<ChildStderr>, buffer: LogBuffer) {
    let Some(stderr) = stderr else {
        return;
    };
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        buffer.append(format!("{line}\n"));
    }
}

async fn watch_exit(mut child: Child, buffer: LogBuffer, exits: UnboundedSender<ExitReport>) {
    let status = match child.wait().await {
        Ok(status) => status,
        Err(e) => {
            warn!(error = %e, "failed to observe managed server exit");
            return;
        }
    };
    let code = status.code().unwrap_or(-1);
    if code > 0 {
        let logs = buffer.contents();
        error!(code, "managed server exited with errors:\n{logs}");
        // Receiver may have been dropped; the tracing record above is the
        // fallback side channel.
        let _ = exits.send(ExitReport { code, logs });
    } else {
        debug!(code, "managed server exited");
    }
}

#[async_trait]
impl ServerLifecycle for ServerSupervisor {
    async fn load_config(&mut self, path_to_config: &str) -> Result<()> {
        self.load_config(path_to_config);
        Ok(())
    }

    async fn start(&mut self, env: HashMap<String, String>) -> Result<String> {
        ServerSupervisor::start(self, env).await
    }

    async fn ping(&mut self) -> Result<String> {
        ServerSupervisor::ping(self).await
    }

    async fn flush(&mut self) -> Result<FlushStatus> {
        ServerSupervisor::flush(self).await
    }

    async fn stop(&mut self) -> Result<()> {
        ServerSupervisor::stop(self).await
    }

    async fn kill_all(&mut self) -> Result<()> {
        ServerSupervisor::kill_all(self).await
    }

    async fn logs(&mut self) -> Result<String> {
        Ok(ServerSupervisor::logs(self))
    }

    fn http_api_version(&self) -> Option<&str> {
        ServerSupervisor::http_api_version(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeEnvironment;

    impl EnvironmentProvider for FakeEnvironment {
        fn var(&self, key: &str) -> Option<String> {
            match key {
                "PATH" => Some("/usr/bin:/bin".to_string()),
                "PYTHONPATH" => Some("/opt/lib/python".to_string()),
                "SECRET_TOKEN" => Some("leak-me".to_string()),
                _ => None,
            }
        }
    }

    struct NoopKiller;

    #[async_trait]
    impl ProcessKiller for NoopKiller {
        async fn kill_by_name(&self, _process_name: &str) -> Result<()> {
            Ok(())
        }
    }

    fn supervisor() -> ServerSupervisor {
        ServerSupervisor::with_collaborators(
            SupervisorConfig::new("http://127.0.0.1:8888/v1", "serve", "server.ini"),
            Arc::new(FakeEnvironment),
            Arc::new(NoopKiller),
        )
    }

    #[test]
    fn test_child_env_is_allow_listed() {
        let supervisor = supervisor();
        let child_env = supervisor.build_child_env(&HashMap::new());

        assert_eq!(child_env.get("PATH").map(String::as_str), Some("/usr/bin:/bin"));
        assert_eq!(
            child_env.get("PYTHONPATH").map(String::as_str),
            Some("/opt/lib/python")
        );
        // Unset allow-listed variables are simply absent.
        assert!(!child_env.contains_key("VIRTUAL_ENV"));
        // Everything outside the allow-list stays out.
        assert!(!child_env.contains_key("SECRET_TOKEN"));
    }

    #[test]
    fn test_overrides_win_over_inherited_values() {
        let supervisor = supervisor();
        let overrides = HashMap::from([("PATH".to_string(), "/custom".to_string())]);
        let child_env = supervisor.build_child_env(&overrides);

        assert_eq!(child_env.get("PATH").map(String::as_str), Some("/custom"));
    }

    #[test]
    fn test_endpoint_handles_trailing_slash() {
        let mut supervisor = supervisor();
        supervisor.config.base_url = "http://127.0.0.1:8888/v1/".to_string();

        assert_eq!(supervisor.endpoint(""), "http://127.0.0.1:8888/v1/");
        assert_eq!(
            supervisor.endpoint("__flush__"),
            "http://127.0.0.1:8888/v1/__flush__"
        );
    }

    #[test]
    fn test_initial_state() {
        let supervisor = supervisor();
        assert_eq!(supervisor.state(), SupervisorState::Stopped);
        assert!(!supervisor.is_started());
        assert!(supervisor.http_api_version().is_none());
    }
}
