//! Environment-variable access behind a trait.
//!
//! The supervisor builds its child environment from an allow-listed subset
//! of the parent environment. Reading the process-wide environment table
//! directly would make that logic untestable, so it is injected as a
//! collaborator and tests supply a fake.

/// Read access to environment variables.
pub trait EnvironmentProvider: Send + Sync {
    /// Returns the value of `key`, or `None` if unset or not unicode.
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEnvironment;

impl EnvironmentProvider for SystemEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}
