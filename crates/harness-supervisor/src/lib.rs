//! # Harness Supervisor
//!
//! Owns spawning, monitoring, and terminating the managed test-server
//! process:
//! - Process spawn with an allow-listed child environment
//! - Readiness polling through the retrying HTTP client
//! - Diagnostic-stream capture into an append-only log buffer
//! - Exit observation with reported (not thrown) failure semantics
//! - Targeted and kill-by-name termination

pub mod kill;
pub mod logbuf;
pub mod resolve;
pub mod state;
pub mod supervisor;

pub use kill::{ProcessKiller, SystemProcessKiller};
pub use logbuf::LogBuffer;
pub use resolve::resolve_executable;
pub use state::SupervisorState;
pub use supervisor::{ExitReport, ServerSupervisor, STOP_QUIESCENCE};
