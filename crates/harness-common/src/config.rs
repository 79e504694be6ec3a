//! Supervisor configuration.

use crate::env::EnvironmentProvider;

/// Environment variable naming the managed server executable, checked
/// when the caller does not configure one explicitly. Lets CI images pin
/// the binary location without touching the invocation.
pub const EXECUTABLE_ENV_VAR: &str = "TEST_SERVER_EXECUTABLE";

/// Executable used when neither the caller nor the environment names one.
pub const DEFAULT_EXECUTABLE: &str = "serve";

/// Default retry attempt ceiling for readiness polling.
///
/// The managed server's startup time is the variable being waited out, so
/// the budget is generous: 50 attempts at a fixed 100ms spacing covers a
/// slow cold start without a dedicated timeout mechanism.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 50;

/// Configuration for one supervised test server.
///
/// Immutable after construction except `config_path`, which may be
/// replaced before a `start` via `load_config`.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Base URL of the managed server's own HTTP API.
    pub base_url: String,

    /// Executable to spawn: a bare name resolved through PATH, or an
    /// explicit path.
    pub executable_path: String,

    /// Configuration file handed to the executable as its argument.
    pub config_path: String,

    /// Attempt budget for readiness and administrative calls.
    pub max_attempts: u32,
}

impl SupervisorConfig {
    pub fn new(
        base_url: impl Into<String>,
        executable_path: impl Into<String>,
        config_path: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            executable_path: executable_path.into(),
            config_path: config_path.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Resolves the executable to use when none was configured
    /// explicitly: [`EXECUTABLE_ENV_VAR`] wins, otherwise
    /// [`DEFAULT_EXECUTABLE`].
    pub fn executable_from_env(env: &dyn EnvironmentProvider) -> String {
        env.var(EXECUTABLE_ENV_VAR)
            .unwrap_or_else(|| DEFAULT_EXECUTABLE.to_string())
    }
}
