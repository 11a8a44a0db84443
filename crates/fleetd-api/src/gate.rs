// crates/fleetd-api/src/gate.rs
// ============================================================================
// Module: Authorization Gate
// Description: Request-level authorization against the live server registry.
// Purpose: Resolve the target server and produce a verdict for every request.
// Dependencies: fleetd-core, axum
// ============================================================================

//! ## Overview
//! [`AuthGate`] combines the daemon credential with the registry. For each
//! request it checks, in order: a token is present, a server identifier is
//! present when the scope needs one, the server exists in the snapshot live
//! at that moment, and the token carries the permission. Each lookup reads
//! exactly one snapshot; a concurrent reload never mixes two generations
//! into one decision.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::http::StatusCode;
use fleetd_core::AuthVerdict;
use fleetd_core::DaemonCredential;
use fleetd_core::PermissionEvaluator;
use fleetd_core::PermissionRequirement;
use fleetd_core::ServerRecord;
use fleetd_core::ServerRegistry;

// ============================================================================
// SECTION: Gate
// ============================================================================

/// Verdict plus the server record it was evaluated against.
#[derive(Debug, Clone)]
pub struct GateDecision {
    /// Authorization verdict.
    pub verdict: AuthVerdict,
    /// Server record resolved for `g:`/`s:` requirements.
    pub server: Option<Arc<ServerRecord>>,
}

impl GateDecision {
    /// Builds a decision with no resolved server.
    const fn unresolved(verdict: AuthVerdict) -> Self {
        Self {
            verdict,
            server: None,
        }
    }
}

/// Authorization gate shared by every protected route.
pub struct AuthGate {
    /// Evaluator holding the daemon credential.
    evaluator: PermissionEvaluator,
    /// Live server registry.
    registry: Arc<ServerRegistry>,
}

impl AuthGate {
    /// Builds a gate over a credential and a registry.
    #[must_use]
    pub const fn new(credential: DaemonCredential, registry: Arc<ServerRegistry>) -> Self {
        Self {
            evaluator: PermissionEvaluator::new(credential),
            registry,
        }
    }

    /// Returns the registry consulted by the gate.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    /// Authorizes a request. Empty strings are treated as absent headers.
    #[must_use]
    pub fn authorize(
        &self,
        requirement: &PermissionRequirement,
        token: &str,
        server_id: &str,
    ) -> AuthVerdict {
        self.check(requirement, token, server_id).verdict
    }

    /// Authorizes a request and returns the server record used, if any.
    #[must_use]
    pub fn check(
        &self,
        requirement: &PermissionRequirement,
        token: &str,
        server_id: &str,
    ) -> GateDecision {
        if token.is_empty() {
            return GateDecision::unresolved(AuthVerdict::DeniedMissingToken);
        }
        if !requirement.scope().requires_server() {
            return GateDecision::unresolved(self.evaluator.evaluate(requirement, token, None));
        }
        if server_id.is_empty() {
            return GateDecision::unresolved(AuthVerdict::DeniedMissingServerId);
        }
        let Some(record) = self.registry.lookup(server_id) else {
            return GateDecision::unresolved(AuthVerdict::DeniedServerNotFound);
        };
        let verdict = self.evaluator.evaluate(requirement, token, Some(&record));
        GateDecision {
            verdict,
            server: Some(record),
        }
    }
}

/// Maps a denial to its HTTP status; `None` for [`AuthVerdict::Allowed`].
#[must_use]
pub const fn denial_status(verdict: AuthVerdict) -> Option<StatusCode> {
    match verdict {
        AuthVerdict::Allowed => None,
        AuthVerdict::DeniedMissingToken | AuthVerdict::DeniedMissingServerId => {
            Some(StatusCode::BAD_REQUEST)
        }
        AuthVerdict::DeniedServerNotFound => Some(StatusCode::NOT_FOUND),
        AuthVerdict::DeniedForbidden => Some(StatusCode::FORBIDDEN),
    }
}

#[cfg(test)]
mod tests;
