//! # Harness Common
//!
//! Shared building blocks for the test-server lifecycle harness:
//! - Error types used across all crates
//! - The `ServerLifecycle` contract implemented by both the local
//!   supervisor and the remote control-plane client
//! - Supervisor configuration
//! - The environment-provider abstraction

pub mod config;
pub mod env;
pub mod errors;
pub mod lifecycle;

pub use config::{SupervisorConfig, DEFAULT_EXECUTABLE, DEFAULT_MAX_ATTEMPTS, EXECUTABLE_ENV_VAR};
pub use env::{EnvironmentProvider, SystemEnvironment};
pub use errors::{Error, Result};
pub use lifecycle::{FlushStatus, ServerLifecycle};
