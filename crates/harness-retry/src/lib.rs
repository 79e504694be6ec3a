//! Retrying HTTP client.
//!
//! Performs an HTTP call and transparently retries on transient failure
//! until success or the attempt budget runs out. Used for readiness
//! polling, flush/reset calls, and the other administrative calls against
//! the managed server.

mod client;

pub use client::{HttpOptions, RetryResponse, RetryingClient, RETRY_DELAY};
