// crates/fleetd-api/src/server.rs
// ============================================================================
// Module: API Server
// Description: HTTP router, administrative handlers, and serve loop.
// Purpose: Expose the registry through permission-guarded routes.
// Dependencies: axum, tokio, fleetd-config, fleetd-core
// ============================================================================

//! ## Overview
//! [`ApiServer::from_config`] validates the daemon configuration, loads the
//! initial registry snapshot, and assembles the router:
//!
//! | route | requirement |
//! |---|---|
//! | `GET /api` | none |
//! | `POST /api/reload` | `c:reload` |
//! | `GET /api/servers` | `c:list` |
//! | `GET /api/server` | `s:get` |
//!
//! Reloads run on the blocking pool. A failed reload answers 500 and leaves
//! the previous snapshot live.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Extension;
use axum::Json;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use fleetd_config::DirectoryServerSource;
use fleetd_config::FleetdConfig;
use fleetd_core::RegistryError;
use fleetd_core::ReloadSummary;
use fleetd_core::ServerId;
use fleetd_core::ServerRegistry;
use fleetd_core::ServerSource;
use serde::Serialize;

use crate::audit::AuditSink;
use crate::audit::FileAuditSink;
use crate::audit::NoopAuditSink;
use crate::audit::RegistryAuditEvent;
use crate::audit::StderrAuditSink;
use crate::gate::AuthGate;
use crate::middleware::AuthorizedServer;
use crate::middleware::ErrorBody;
use crate::middleware::PermissionGuard;
use crate::middleware::require_permission;

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared state for the API router.
#[derive(Clone)]
pub struct ApiState {
    /// Authorization gate, which also owns the registry handle.
    gate: Arc<AuthGate>,
    /// Source re-read on reload.
    source: Arc<dyn ServerSource>,
    /// Audit sink for gate decisions and reloads.
    audit: Arc<dyn AuditSink>,
    /// Request body limit in bytes.
    max_body_bytes: usize,
}

impl ApiState {
    /// Builds router state.
    #[must_use]
    pub const fn new(
        gate: Arc<AuthGate>,
        source: Arc<dyn ServerSource>,
        audit: Arc<dyn AuditSink>,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            gate,
            source,
            audit,
            max_body_bytes,
        }
    }

    /// Returns the registry behind the gate.
    #[must_use]
    pub fn registry(&self) -> &Arc<ServerRegistry> {
        self.gate.registry()
    }

    /// Builds a guard for one route.
    fn guard(&self, requirement: &str) -> Result<PermissionGuard, ApiServerError> {
        PermissionGuard::new(Arc::clone(&self.gate), requirement, Arc::clone(&self.audit))
            .map_err(|err| ApiServerError::Config(format!("route requirement {requirement}: {err}")))
    }
}

/// Builds the API router.
///
/// # Errors
///
/// Returns [`ApiServerError::Config`] when a route requirement is malformed.
pub fn build_router(state: ApiState) -> Result<Router, ApiServerError> {
    let reload = state.guard("c:reload")?;
    let list = state.guard("c:list")?;
    let server = state.guard("s:get")?;
    let max_body_bytes = state.max_body_bytes;
    Ok(Router::new()
        .route("/api", get(handle_index))
        .route("/api/reload", require_permission(post(handle_reload), reload))
        .route("/api/servers", require_permission(get(handle_list_servers), list))
        .route("/api/server", require_permission(get(handle_server), server))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state))
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Daemon identification payload.
#[derive(Debug, Serialize)]
struct IndexResponse {
    /// Daemon name.
    name: &'static str,
    /// Daemon version.
    version: &'static str,
}

/// Reload result payload.
#[derive(Debug, Serialize)]
struct ReloadResponse {
    /// Generation now live.
    generation: u64,
    /// Servers in the live snapshot.
    server_count: usize,
}

/// Server listing payload.
#[derive(Debug, Serialize)]
struct ServerListResponse {
    /// Generation the listing was read from.
    generation: u64,
    /// Sorted server identifiers.
    servers: Vec<ServerId>,
}

/// Resolved server payload.
#[derive(Debug, Serialize)]
struct ServerResponse {
    /// Server identifier.
    id: ServerId,
    /// Number of access keys on the server.
    key_count: usize,
}

/// `GET /api`
async fn handle_index() -> Json<IndexResponse> {
    Json(IndexResponse {
        name: "fleetd",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /api/reload`
async fn handle_reload(State(state): State<ApiState>) -> Response {
    let registry = Arc::clone(state.registry());
    let source = Arc::clone(&state.source);
    let outcome = tokio::task::spawn_blocking(move || registry.reload(source.as_ref())).await;
    let result = outcome.unwrap_or_else(|err| {
        Err(RegistryError::ConfigurationLoadFailure(format!("reload task failed: {err}")))
    });
    let description = state.source.describe();
    match result {
        Ok(summary) => {
            state.audit.record_registry(&RegistryAuditEvent::published(description, &summary));
            Json(ReloadResponse {
                generation: summary.generation,
                server_count: summary.server_count,
            })
            .into_response()
        }
        Err(error) => {
            let live = state.registry().snapshot();
            state.audit.record_registry(&RegistryAuditEvent::failed(
                description,
                live.generation(),
                live.len(),
                &error,
            ));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: error.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// `GET /api/servers`
async fn handle_list_servers(State(state): State<ApiState>) -> Json<ServerListResponse> {
    let snapshot = state.registry().snapshot();
    Json(ServerListResponse {
        generation: snapshot.generation(),
        servers: snapshot.server_ids(),
    })
}

/// `GET /api/server`
async fn handle_server(Extension(server): Extension<AuthorizedServer>) -> Json<ServerResponse> {
    let AuthorizedServer(record) = server;
    Json(ServerResponse {
        id: record.id().clone(),
        key_count: record.keys().len(),
    })
}

// ============================================================================
// SECTION: API Server
// ============================================================================

/// fleetd API server instance.
pub struct ApiServer {
    /// Listen address.
    bind: SocketAddr,
    /// Assembled router.
    router: Router,
    /// Summary of the initial registry load.
    initial_load: ReloadSummary,
}

impl ApiServer {
    /// Builds the server from configuration and loads the initial snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError`] when configuration is invalid, the audit
    /// log cannot be opened, or the server directory fails to load.
    pub fn from_config(config: &FleetdConfig) -> Result<Self, ApiServerError> {
        config.validate().map_err(|err| ApiServerError::Config(err.to_string()))?;
        let bind = config.api.bind_addr().map_err(|err| ApiServerError::Config(err.to_string()))?;
        let credential =
            config.daemon_credential().map_err(|err| ApiServerError::Config(err.to_string()))?;
        let audit = build_audit_sink(config)?;

        let registry = Arc::new(ServerRegistry::new());
        let source: Arc<dyn ServerSource> =
            Arc::new(DirectoryServerSource::new(config.servers_directory()));
        let initial_load = match registry.reload(source.as_ref()) {
            Ok(summary) => summary,
            Err(error) => {
                audit.record_registry(&RegistryAuditEvent::failed(source.describe(), 0, 0, &error));
                return Err(ApiServerError::Init(error.to_string()));
            }
        };
        audit.record_registry(&RegistryAuditEvent::published(source.describe(), &initial_load));

        let gate = Arc::new(AuthGate::new(credential, registry));
        let state = ApiState::new(gate, source, audit, config.api.max_body_bytes);
        let router = build_router(state)?;
        Ok(Self {
            bind,
            router,
            initial_load,
        })
    }

    /// Returns the listen address.
    #[must_use]
    pub const fn bind_addr(&self) -> SocketAddr {
        self.bind
    }

    /// Returns the summary of the initial registry load.
    #[must_use]
    pub const fn initial_load(&self) -> ReloadSummary {
        self.initial_load
    }

    /// Returns a clone of the assembled router.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serves requests until the process receives Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Transport`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ApiServerError> {
        let listener = tokio::net::TcpListener::bind(self.bind)
            .await
            .map_err(|err| ApiServerError::Transport(format!("http bind failed: {err}")))?;
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|err| ApiServerError::Transport(format!("http server failed: {err}")))
    }
}

/// Selects the audit sink from configuration.
fn build_audit_sink(config: &FleetdConfig) -> Result<Arc<dyn AuditSink>, ApiServerError> {
    if !config.audit.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match config.audit_path() {
        Some(path) => {
            let sink = FileAuditSink::new(&path).map_err(|err| {
                ApiServerError::Init(format!("audit log {}: {err}", path.display()))
            })?;
            Ok(Arc::new(sink))
        }
        None => {
            let sink = StderrAuditSink::new()
                .map_err(|err| ApiServerError::Init(format!("audit writer: {err}")))?;
            Ok(Arc::new(sink))
        }
    }
}

/// Resolves when Ctrl-C is received; never resolves if the handler fails.
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// API server errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}
