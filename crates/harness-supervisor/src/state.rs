//! Supervisor state machine.

use std::fmt;

/// Lifecycle state of the supervised process.
///
/// `Starting` covers the window between a successful spawn and a
/// successful readiness check. A readiness failure leaves the supervisor
/// in `Starting` with the process still alive; the caller is expected to
/// `stop` it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// No owned process.
    Stopped,
    /// Process spawned, readiness not yet confirmed.
    Starting,
    /// Process spawned and confirmed ready.
    Running,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorState::Stopped => write!(f, "stopped"),
            SupervisorState::Starting => write!(f, "starting"),
            SupervisorState::Running => write!(f, "running"),
        }
    }
}

impl SupervisorState {
    /// Whether a process is owned in this state.
    pub fn is_active(&self) -> bool {
        !matches!(self, SupervisorState::Stopped)
    }
}
