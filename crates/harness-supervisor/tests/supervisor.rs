//! Supervisor lifecycle against an in-process stand-in for the managed
//! server. Spawn tests use `sleep` as the managed executable (the config
//! path doubles as its duration argument), so no fixture binary is needed.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;

use harness_common::{Error, Result, SupervisorConfig, SystemEnvironment};
use harness_supervisor::{ProcessKiller, ServerSupervisor, SupervisorState};

const API_VERSION: &str = "1.22";

/// Serves the two managed-server endpoints the supervisor talks to.
async fn managed_server_stub() -> SocketAddr {
    let app = Router::new()
        .route(
            "/",
            get(|| async { Json(serde_json::json!({ "http_api_version": API_VERSION })) }),
        )
        .route("/__flush__", post(|| async { StatusCode::ACCEPTED }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn unreachable_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

#[derive(Default)]
struct RecordingKiller {
    killed: Mutex<Vec<String>>,
}

#[async_trait]
impl ProcessKiller for RecordingKiller {
    async fn kill_by_name(&self, process_name: &str) -> Result<()> {
        self.killed.lock().push(process_name.to_string());
        Ok(())
    }
}

fn supervisor_for(addr: SocketAddr, executable: &str, config: &str) -> ServerSupervisor {
    ServerSupervisor::new(
        SupervisorConfig::new(format!("http://{addr}"), executable, config).with_max_attempts(10),
    )
}

#[tokio::test]
async fn ping_reports_the_servers_api_version() {
    let addr = managed_server_stub().await;
    let mut supervisor = supervisor_for(addr, "serve", "server.ini");

    let version = supervisor.ping().await.unwrap();

    assert_eq!(version, API_VERSION);
    assert_eq!(supervisor.http_api_version(), Some(API_VERSION));
}

#[tokio::test]
async fn ping_fails_with_max_attempts_when_unreachable() {
    let addr = unreachable_addr().await;
    let mut supervisor = ServerSupervisor::new(
        SupervisorConfig::new(format!("http://{addr}"), "serve", "server.ini").with_max_attempts(3),
    );

    let started = Instant::now();
    let err = supervisor.ping().await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, Error::MaxAttemptsExceeded { attempts: 3, .. }));
    // Two inter-attempt delays of 100ms each.
    assert!(elapsed >= Duration::from_millis(200), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn flush_returns_accepted_status() {
    let addr = managed_server_stub().await;
    let mut supervisor = supervisor_for(addr, "serve", "server.ini");

    let flushed = supervisor.flush().await.unwrap();

    assert_eq!(flushed.status, 202);
}

#[tokio::test]
async fn load_config_applies_to_the_next_start() {
    let addr = managed_server_stub().await;
    let mut supervisor = supervisor_for(addr, "serve", "path-a");

    supervisor.load_config("path-a");
    supervisor.load_config("path-b");

    assert_eq!(supervisor.config().config_path, "path-b");
}

#[tokio::test]
async fn start_rejects_unresolvable_executable() {
    let addr = managed_server_stub().await;
    let mut supervisor = supervisor_for(addr, "definitely-not-a-real-executable", "server.ini");

    let err = supervisor.start(HashMap::new()).await.unwrap_err();

    assert!(matches!(err, Error::ExecutableNotFoundInPath { .. }));
    assert!(err.to_string().contains("definitely-not-a-real-executable"));
    assert!(!supervisor.is_started());
}

#[tokio::test]
async fn start_rejects_bad_explicit_executable_path() {
    let addr = managed_server_stub().await;
    let mut supervisor = supervisor_for(addr, "/definitely/missing/serve", "server.ini");

    let err = supervisor.start(HashMap::new()).await.unwrap_err();

    assert!(matches!(err, Error::ExecutableNotFound { .. }));
    assert!(err.to_string().contains("/definitely/missing/serve"));
}

#[tokio::test]
async fn stop_without_a_process_still_waits_for_quiescence() {
    let addr = managed_server_stub().await;
    let mut supervisor = supervisor_for(addr, "serve", "server.ini");

    let started = Instant::now();
    supervisor.stop().await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(500));
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
}

#[tokio::test]
async fn kill_all_uses_the_executable_file_stem() {
    let addr = managed_server_stub().await;
    let killer = Arc::new(RecordingKiller::default());
    let mut supervisor = ServerSupervisor::with_collaborators(
        SupervisorConfig::new(format!("http://{addr}"), "/usr/local/bin/serve", "server.ini"),
        Arc::new(SystemEnvironment),
        Arc::clone(&killer) as Arc<dyn ProcessKiller>,
    );

    // Nothing alive to kill; still resolves normally.
    supervisor.kill_all().await.unwrap();

    assert_eq!(killer.killed.lock().as_slice(), ["serve"]);
}

#[cfg(unix)]
#[tokio::test]
async fn start_spawns_and_confirms_readiness() {
    let addr = managed_server_stub().await;
    // `sleep 30` stands in for the managed server process; readiness is
    // confirmed against the stub above.
    let mut supervisor = supervisor_for(addr, "sleep", "30");

    let version = supervisor.start(HashMap::new()).await.unwrap();

    assert_eq!(version, API_VERSION);
    assert_eq!(supervisor.state(), SupervisorState::Running);
    assert!(supervisor.is_started());
    assert_eq!(supervisor.logs(), "");

    // A second start must fail fast while the process lives.
    let err = supervisor.start(HashMap::new()).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyStarted));

    supervisor.stop().await.unwrap();
    assert!(!supervisor.is_started());

    // Stop followed by start succeeds with a fresh process.
    supervisor.start(HashMap::new()).await.unwrap();
    assert!(supervisor.is_started());
    supervisor.stop().await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn nonzero_exit_is_reported_not_thrown() {
    let addr = managed_server_stub().await;
    // `sh <missing file>` dies immediately with a non-zero code and a
    // diagnostic line on stderr.
    let mut supervisor = supervisor_for(addr, "sh", "/definitely-missing-config.sh");
    let mut exits = supervisor.exit_reports().unwrap();

    // Readiness is confirmed against the stub, so start itself resolves.
    supervisor.start(HashMap::new()).await.unwrap();

    let report = tokio::time::timeout(Duration::from_secs(5), exits.recv())
        .await
        .expect("no exit report within timeout")
        .expect("exit channel closed");
    assert!(report.code > 0);

    // The stderr diagnostic ends up in the supervisor's log buffer.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!supervisor.logs().is_empty());

    supervisor.stop().await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn new_start_discards_previous_logs() {
    let addr = managed_server_stub().await;
    let mut supervisor = supervisor_for(addr, "sh", "/definitely-missing-config.sh");

    supervisor.start(HashMap::new()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!supervisor.logs().is_empty());
    supervisor.stop().await.unwrap();

    // Swap the config for a script that stays alive quietly; the
    // replacement process writes nothing, so the old output must be gone.
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("quiet.sh");
    std::fs::write(&script, "sleep 30\n").unwrap();
    supervisor.load_config(script.to_str().unwrap());

    supervisor.start(HashMap::new()).await.unwrap();
    assert_eq!(supervisor.logs(), "");
    supervisor.stop().await.unwrap();
}
