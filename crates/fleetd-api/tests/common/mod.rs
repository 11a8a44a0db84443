// crates/fleetd-api/tests/common/mod.rs
// =============================================================================
// Module: API Test Helpers
// Description: Fixture registry, recording audit sink, and request helpers.
// Purpose: Drive the router in-process with tower oneshot calls.
// =============================================================================

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test helpers are selectively used across suites."
)]

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::http::StatusCode;
use axum::routing::get;
use fleetd_api::ACCESS_SERVER_HEADER;
use fleetd_api::ACCESS_TOKEN_HEADER;
use fleetd_api::ApiState;
use fleetd_api::AuditSink;
use fleetd_api::AuthAuditEvent;
use fleetd_api::AuthGate;
use fleetd_api::PermissionGuard;
use fleetd_api::RegistryAuditEvent;
use fleetd_api::require_permission;
use fleetd_config::DirectoryServerSource;
use fleetd_core::DaemonCredential;
use fleetd_core::ServerRegistry;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

/// Daemon credential used by every fixture.
pub const DAEMON_TOKEN: &str = "existingkey";

/// Server with two global keys and one key scoped to `test`.
pub const EXISTING_SERVER_JSON: &str = r#"{
  "id": "existingserver",
  "keys": [
    { "token": "existingkey", "global": true },
    { "token": "existingglobalskey", "global": true },
    { "token": "existingspecificskey", "permissions": ["test"] }
  ]
}"#;

/// Audit sink that keeps events in memory.
#[derive(Default)]
pub struct RecordingAuditSink {
    /// Recorded authorization events.
    pub auth: Mutex<Vec<AuthAuditEvent>>,
    /// Recorded registry events.
    pub registry: Mutex<Vec<RegistryAuditEvent>>,
}

impl AuditSink for RecordingAuditSink {
    fn record_auth(&self, event: &AuthAuditEvent) {
        self.auth.lock().unwrap().push(event.clone());
    }

    fn record_registry(&self, event: &RegistryAuditEvent) {
        self.registry.lock().unwrap().push(event.clone());
    }
}

/// Loaded registry backed by a temporary server directory.
pub struct Fixture {
    /// Server directory; kept alive for the fixture lifetime.
    pub dir: TempDir,
    /// Gate over the loaded registry.
    pub gate: Arc<AuthGate>,
    /// Recording audit sink shared by all guards.
    pub audit: Arc<RecordingAuditSink>,
    /// Router state for the administrative API.
    pub state: ApiState,
}

/// Builds a fixture with `existingserver` loaded at generation 1.
pub fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "existingserver.json", EXISTING_SERVER_JSON);
    let registry = Arc::new(ServerRegistry::new());
    let source = Arc::new(DirectoryServerSource::new(dir.path()));
    registry.reload(source.as_ref()).unwrap();
    let gate = Arc::new(AuthGate::new(DaemonCredential::new(DAEMON_TOKEN), registry));
    let audit = Arc::new(RecordingAuditSink::default());
    let state = ApiState::new(Arc::clone(&gate), source, audit.clone(), 1024 * 1024);
    Fixture {
        dir,
        gate,
        audit,
        state,
    }
}

/// Writes a file into a directory.
pub fn write_file(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

/// Router with a single `GET /` route guarded by `requirement`.
pub fn guarded_router(fixture: &Fixture, requirement: &str) -> Router {
    let guard =
        PermissionGuard::new(Arc::clone(&fixture.gate), requirement, fixture.audit.clone())
            .unwrap();
    Router::new().route("/", require_permission(get(|| async { "ok" }), guard))
}

/// Builds a request with optional access headers.
pub fn request(method: &str, uri: &str, token: Option<&str>, server: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(ACCESS_TOKEN_HEADER, token);
    }
    if let Some(server) = server {
        builder = builder.header(ACCESS_SERVER_HEADER, server);
    }
    builder.body(Body::empty()).unwrap()
}

/// Sends one request and returns the status with the raw body.
pub async fn send_raw(router: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

/// Sends one request and decodes a JSON body; `Value::Null` for non-JSON.
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send_raw(router, request).await;
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}
