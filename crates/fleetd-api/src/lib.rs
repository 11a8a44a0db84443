// crates/fleetd-api/src/lib.rs
// ============================================================================
// Module: fleetd API
// Description: HTTP authorization gate and administrative API for fleetd.
// Purpose: Admit or reject every API request before business handlers run.
// Dependencies: fleetd-core, fleetd-config, axum, tokio
// ============================================================================

//! ## Overview
//! `fleetd-api` wires the server registry and the permission evaluator into
//! the request path. Each protected route carries a [`PermissionGuard`] that
//! reads `X-Access-Token` and `X-Access-Server`, asks the [`AuthGate`] for a
//! verdict, and either forwards the request or answers with 400/403/404.
//! Security posture: headers are untrusted; see the evaluator invariants in
//! `fleetd-core`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod gate;
pub mod middleware;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AUDIT_QUEUE_CAPACITY;
pub use audit::AuditSink;
pub use audit::AuditWriter;
pub use audit::AuthAuditEvent;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::RegistryAuditEvent;
pub use audit::StderrAuditSink;
pub use gate::AuthGate;
pub use gate::GateDecision;
pub use gate::denial_status;
pub use middleware::ACCESS_SERVER_HEADER;
pub use middleware::ACCESS_TOKEN_HEADER;
pub use middleware::AuthorizedServer;
pub use middleware::PermissionGuard;
pub use middleware::require_permission;
pub use server::ApiServer;
pub use server::ApiServerError;
pub use server::ApiState;
pub use server::build_router;
