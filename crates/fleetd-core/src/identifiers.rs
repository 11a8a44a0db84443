// crates/fleetd-core/src/identifiers.rs
// ============================================================================
// Module: fleetd Identifiers
// Description: Opaque identifiers for hosted servers.
// Purpose: Provide a strongly typed server identifier with a stable wire form.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Server identifiers are opaque strings supplied by the control plane. They
//! arrive on requests through the `X-Access-Server` header and key the server
//! registry. No normalization is applied; lookups are exact.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::borrow::Borrow;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Hosted server identifier.
///
/// # Invariants
/// - Opaque UTF-8 string; emptiness is rejected by the registry, not here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    /// Creates a new server identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the identifier is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Borrow<str> for ServerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ServerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ServerId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
