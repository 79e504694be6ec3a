//! The server lifecycle contract.
//!
//! This trait is the seam between callers and the two interchangeable
//! implementations: the local process supervisor, which spawns and signals
//! the managed server itself, and the remote client, which drives the same
//! operations over the control-plane HTTP API. Callers (the control-plane
//! proxy included) are written against this trait, not a concrete type.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Outcome of a flush/reset call: the raw HTTP status of the managed
/// server's reset endpoint, returned for the caller to interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushStatus {
    pub status: u16,
}

/// Lifecycle operations for one managed test server.
#[async_trait]
pub trait ServerLifecycle: Send {
    /// Sets the configuration file path used by the next `start`.
    /// Has no effect on a currently running process.
    async fn load_config(&mut self, path_to_config: &str) -> Result<()>;

    /// Starts the managed server with the given extra environment
    /// variables and waits for it to become ready. Returns the server's
    /// reported HTTP API version.
    async fn start(&mut self, env: HashMap<String, String>) -> Result<String>;

    /// Polls the managed server's health endpoint until it responds,
    /// returning the reported HTTP API version. Works whether or not this
    /// instance performed the `start`.
    async fn ping(&mut self) -> Result<String>;

    /// Asks the managed server to reset its state between test runs.
    async fn flush(&mut self) -> Result<FlushStatus>;

    /// Terminates the owned process, if any, and waits for the OS to
    /// release its resources. Safe to call unconditionally.
    async fn stop(&mut self) -> Result<()>;

    /// Best-effort termination of every instance of the managed
    /// executable on the host, including leaked ones from prior runs.
    async fn kill_all(&mut self) -> Result<()>;

    /// Returns the diagnostic output captured from the managed process,
    /// in arrival order. Empty if nothing was captured.
    async fn logs(&mut self) -> Result<String>;

    /// The HTTP API version observed by the most recent successful ping.
    fn http_api_version(&self) -> Option<&str>;
}
