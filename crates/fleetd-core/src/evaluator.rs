// crates/fleetd-core/src/evaluator.rs
// ============================================================================
// Module: Permission Evaluator
// Description: Pure decision logic for scoped permission requirements.
// Purpose: Map (requirement, token, server record) to an authorization verdict.
// Dependencies: crate::permission, crate::record, crate::security
// ============================================================================

//! ## Overview
//! Decision table by requirement scope:
//!
//! | scope | record | pass condition |
//! |---|---|---|
//! | `c` | unused | token equals the daemon credential |
//! | `g` | required | first key with the token is global |
//! | `s` | required | first key with the token is global or lists the action |
//!
//! An empty token is rejected before the scope is inspected. The evaluator
//! has no side effects and reads only immutable inputs, so it is safe to call
//! from any number of request tasks at once.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::permission::PermissionRequirement;
use crate::permission::Scope;
use crate::record::ServerRecord;
use crate::security::DaemonCredential;
use crate::verdict::AuthVerdict;

// ============================================================================
// SECTION: Evaluator
// ============================================================================

/// Evaluator bound to the process-wide daemon credential.
#[derive(Debug, Clone)]
pub struct PermissionEvaluator {
    /// Control-plane credential for `c:` scope.
    credential: DaemonCredential,
}

impl PermissionEvaluator {
    /// Builds an evaluator for the given daemon credential.
    #[must_use]
    pub const fn new(credential: DaemonCredential) -> Self {
        Self {
            credential,
        }
    }

    /// Returns the daemon credential.
    #[must_use]
    pub const fn credential(&self) -> &DaemonCredential {
        &self.credential
    }

    /// Evaluates a request. See [`evaluate`].
    #[must_use]
    pub fn evaluate(
        &self,
        requirement: &PermissionRequirement,
        token: &str,
        record: Option<&ServerRecord>,
    ) -> AuthVerdict {
        evaluate(requirement, token, &self.credential, record)
    }
}

/// Evaluates a permission requirement against a presented token.
///
/// `record` is ignored for `c:` scope. For `g:` and `s:` scope a missing
/// record is treated as an unknown server.
#[must_use]
pub fn evaluate(
    requirement: &PermissionRequirement,
    token: &str,
    credential: &DaemonCredential,
    record: Option<&ServerRecord>,
) -> AuthVerdict {
    if token.is_empty() {
        return AuthVerdict::DeniedMissingToken;
    }
    let scope = requirement.scope();
    if scope == Scope::Control {
        return if credential.matches(token) {
            AuthVerdict::Allowed
        } else {
            AuthVerdict::DeniedForbidden
        };
    }
    let Some(record) = record else {
        return AuthVerdict::DeniedServerNotFound;
    };
    let Some(key) = record.find_key(token) else {
        return AuthVerdict::DeniedForbidden;
    };
    let permitted = match scope {
        Scope::Global => key.permissions().is_global(),
        Scope::Server => key.permissions().allows(requirement.action()),
        Scope::Control => false,
    };
    if permitted { AuthVerdict::Allowed } else { AuthVerdict::DeniedForbidden }
}
