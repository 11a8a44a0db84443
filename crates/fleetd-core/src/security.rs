// crates/fleetd-core/src/security.rs
// ============================================================================
// Module: Credential Security Helpers
// Description: Constant-time comparisons, the daemon credential, fingerprints.
// Purpose: Keep secret material off timing side-channels and out of logs.
// Dependencies: sha2, subtle
// ============================================================================

//! ## Overview
//! Exposes constant-time equality helpers for bearer tokens, the
//! [`DaemonCredential`] wrapper for the control-plane secret, and a short
//! SHA-256 fingerprint used wherever a token must be identified in audit
//! output without being disclosed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use sha2::Digest;
use sha2::Sha256;
use subtle::ConstantTimeEq;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of hex characters kept from a token fingerprint.
const FINGERPRINT_HEX_LEN: usize = 16;

// ============================================================================
// SECTION: Constant-Time Comparisons
// ============================================================================

/// Compares two byte slices in constant time.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Compares two strings in constant time.
#[must_use]
pub fn constant_time_eq_str(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}

// ============================================================================
// SECTION: Daemon Credential
// ============================================================================

/// Control-plane secret granting `c:` scope.
///
/// # Invariants
/// - Read-only after construction.
/// - An empty credential never matches, so an unconfigured daemon fails closed.
#[derive(Clone)]
pub struct DaemonCredential {
    /// Secret token value.
    secret: String,
}

impl DaemonCredential {
    /// Wraps a daemon secret.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Returns true when no secret is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.secret.is_empty()
    }

    /// Returns true when `token` equals the secret (constant time).
    #[must_use]
    pub fn matches(&self, token: &str) -> bool {
        if self.secret.is_empty() || token.is_empty() {
            return false;
        }
        constant_time_eq_str(&self.secret, token)
    }

    /// Returns the fingerprint of the configured secret.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        token_fingerprint(&self.secret)
    }
}

impl fmt::Debug for DaemonCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaemonCredential").field("secret", &"<redacted>").finish()
    }
}

// ============================================================================
// SECTION: Fingerprints
// ============================================================================

/// Returns a truncated lowercase SHA-256 hex fingerprint of a token.
#[must_use]
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut encoded = hex_encode(&digest);
    encoded.truncate(FINGERPRINT_HEX_LEN);
    encoded
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================
