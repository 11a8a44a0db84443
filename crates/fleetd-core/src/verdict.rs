// crates/fleetd-core/src/verdict.rs
// ============================================================================
// Module: Authorization Verdicts
// Description: Per-request allow/deny outcomes and their error taxonomy.
// Purpose: Give every decision a stable label for responses and audit logs.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`AuthVerdict`] is the ephemeral outcome of one authorization check.
//! Denials convert into [`AuthError`] for callers that prefer `Result`
//! plumbing. Wrong tokens and missing permissions share one variant so a
//! denial never reveals whether a token exists.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Verdict
// ============================================================================

/// Outcome of evaluating a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthVerdict {
    /// Request may proceed.
    Allowed,
    /// No token was presented.
    DeniedMissingToken,
    /// A server-scoped requirement arrived without a server identifier.
    DeniedMissingServerId,
    /// The server identifier is not in the active registry snapshot.
    DeniedServerNotFound,
    /// The token is unknown or lacks the required permission.
    DeniedForbidden,
}

impl AuthVerdict {
    /// Returns true for [`AuthVerdict::Allowed`].
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Returns a stable snake-case label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::DeniedMissingToken => "missing_token",
            Self::DeniedMissingServerId => "missing_server_id",
            Self::DeniedServerNotFound => "server_not_found",
            Self::DeniedForbidden => "forbidden",
        }
    }

    /// Converts the verdict into a `Result`.
    ///
    /// # Errors
    ///
    /// Returns the matching [`AuthError`] for every denial.
    pub const fn into_result(self) -> Result<(), AuthError> {
        match self {
            Self::Allowed => Ok(()),
            Self::DeniedMissingToken => Err(AuthError::MissingCredential),
            Self::DeniedMissingServerId => Err(AuthError::MissingTarget),
            Self::DeniedServerNotFound => Err(AuthError::UnknownTarget),
            Self::DeniedForbidden => Err(AuthError::Unauthorized),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Per-request authorization failures.
///
/// # Invariants
/// - Messages are safe to return to clients verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No access token was presented.
    #[error("missing access token")]
    MissingCredential,
    /// No server identifier was presented for a server-scoped route.
    #[error("missing server identifier")]
    MissingTarget,
    /// The server identifier is unknown.
    #[error("server not found")]
    UnknownTarget,
    /// The token is not authorized.
    #[error("access denied")]
    Unauthorized,
}

impl From<AuthError> for AuthVerdict {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::MissingCredential => Self::DeniedMissingToken,
            AuthError::MissingTarget => Self::DeniedMissingServerId,
            AuthError::UnknownTarget => Self::DeniedServerNotFound,
            AuthError::Unauthorized => Self::DeniedForbidden,
        }
    }
}
