// crates/fleetd-api/src/middleware.rs
// ============================================================================
// Module: Permission Middleware
// Description: Axum middleware enforcing a permission requirement per route.
// Purpose: Reject unauthorized requests before the route handler runs.
// Dependencies: axum, fleetd-core, serde
// ============================================================================

//! ## Overview
//! A [`PermissionGuard`] is attached to a route with [`require_permission`].
//! It reads the access headers, asks the [`AuthGate`] for a decision, records
//! an audit event, and either forwards the request with an
//! [`AuthorizedServer`] extension or answers with a JSON error body.
//! Security posture: header values are untrusted. Values that are not
//! visible ASCII or exceed [`MAX_HEADER_BYTES`] are treated as absent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::extract::Request;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::MethodRouter;
use fleetd_core::AuthVerdict;
use fleetd_core::PermissionParseError;
use fleetd_core::PermissionRequirement;
use fleetd_core::ServerRecord;
use serde::Serialize;

use crate::audit::AuditSink;
use crate::audit::AuthAuditEvent;
use crate::audit::AuthAuditParams;
use crate::gate::AuthGate;
use crate::gate::denial_status;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the bearer token (`X-Access-Token`).
pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";
/// Header carrying the target server identifier (`X-Access-Server`).
pub const ACCESS_SERVER_HEADER: &str = "x-access-server";
/// Maximum accepted size of either access header.
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

// ============================================================================
// SECTION: Guard
// ============================================================================

/// Server record admitted for the current request.
///
/// Inserted as a request extension when a `g:` or `s:` requirement passes.
#[derive(Debug, Clone)]
pub struct AuthorizedServer(pub Arc<ServerRecord>);

/// Middleware state: the gate plus the requirement for one route.
#[derive(Clone)]
pub struct PermissionGuard {
    /// Shared authorization gate.
    gate: Arc<AuthGate>,
    /// Requirement enforced on the route.
    requirement: Arc<PermissionRequirement>,
    /// Audit sink for decisions.
    audit: Arc<dyn AuditSink>,
}

impl PermissionGuard {
    /// Builds a guard from a `scope:action` string.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionParseError`] when the requirement is malformed, so
    /// a bad route declaration fails at startup rather than per request.
    pub fn new(
        gate: Arc<AuthGate>,
        requirement: &str,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, PermissionParseError> {
        Ok(Self {
            gate,
            requirement: Arc::new(PermissionRequirement::parse(requirement)?),
            audit,
        })
    }

    /// Returns the enforced requirement.
    #[must_use]
    pub fn requirement(&self) -> &PermissionRequirement {
        &self.requirement
    }
}

/// Wraps a method router so every request passes the guard first.
pub fn require_permission<S>(route: MethodRouter<S>, guard: PermissionGuard) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    route.route_layer(from_fn_with_state(guard, enforce_permission))
}

/// Middleware body: authorize, audit, then forward or reject.
async fn enforce_permission(
    State(guard): State<PermissionGuard>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = header_value(request.headers(), ACCESS_TOKEN_HEADER);
    let server_id = header_value(request.headers(), ACCESS_SERVER_HEADER);
    let decision = guard.gate.check(
        &guard.requirement,
        token.as_deref().unwrap_or_default(),
        server_id.as_deref().unwrap_or_default(),
    );
    guard.audit.record_auth(&AuthAuditEvent::new(AuthAuditParams {
        requirement: &guard.requirement,
        verdict: decision.verdict,
        method: request.method().as_str(),
        path: request.uri().path(),
        server_id: server_id.as_deref(),
        token: token.as_deref(),
    }));

    match denial_status(decision.verdict) {
        None => {
            if let Some(server) = decision.server {
                request.extensions_mut().insert(AuthorizedServer(server));
            }
            next.run(request).await
        }
        Some(status) => denial_response(status, decision.verdict),
    }
}

// ============================================================================
// SECTION: Responses
// ============================================================================

/// JSON error body returned on denial.
#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    /// Client-safe error message.
    pub(crate) error: String,
}

/// Builds the denial response for a verdict.
fn denial_response(status: StatusCode, verdict: AuthVerdict) -> Response {
    let message = verdict.into_result().err().map(|err| err.to_string()).unwrap_or_default();
    (
        status,
        Json(ErrorBody {
            error: message,
        }),
    )
        .into_response()
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads a header as an owned string; unusable values count as absent.
fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?;
    if value.len() > MAX_HEADER_BYTES {
        return None;
    }
    value.to_str().ok().map(str::to_string)
}
