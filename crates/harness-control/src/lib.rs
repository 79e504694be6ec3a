//! # Harness Control
//!
//! The HTTP control plane: a small server that re-exposes every
//! supervisor lifecycle operation as an HTTP route, and the client-side
//! counterpart for callers that cannot spawn processes themselves.

pub mod proxy;
pub mod remote;
pub mod types;

pub use proxy::ControlPlaneProxy;
pub use remote::RemoteServer;
pub use types::{ConfigRequest, LogsResponse, PingResponse};
