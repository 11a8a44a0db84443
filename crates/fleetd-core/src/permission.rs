// crates/fleetd-core/src/permission.rs
// ============================================================================
// Module: Permission Requirements
// Description: Parsed `scope:action` permission requirements for API routes.
// Purpose: Reject malformed requirements once, at route registration.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! A permission requirement is written `scope:action`. The scope selects the
//! trust tier a token must belong to:
//! - `c` control plane, satisfied only by the daemon credential,
//! - `g` global, satisfied by a server key marked global,
//! - `s` server, satisfied by a global key or a key listing the action.
//!
//! The action is opaque and only consulted in `s` scope.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Separator between scope and action.
const SCOPE_SEPARATOR: char = ':';
/// Maximum action length in bytes.
pub const MAX_ACTION_LENGTH: usize = 128;

// ============================================================================
// SECTION: Scope
// ============================================================================

/// Trust tier named by the first segment of a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Control-plane scope (`c`).
    Control,
    /// Global server scope (`g`).
    Global,
    /// Server-specific scope (`s`).
    Server,
}

impl Scope {
    /// Parses a scope prefix.
    #[must_use]
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "c" => Some(Self::Control),
            "g" => Some(Self::Global),
            "s" => Some(Self::Server),
            _ => None,
        }
    }

    /// Returns the wire prefix for the scope.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Control => "c",
            Self::Global => "g",
            Self::Server => "s",
        }
    }

    /// Returns true when the scope must be resolved against a server record.
    #[must_use]
    pub const fn requires_server(self) -> bool {
        matches!(self, Self::Global | Self::Server)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Requirement
// ============================================================================

/// Parsed permission requirement.
///
/// # Invariants
/// - `action` is non-empty, at most [`MAX_ACTION_LENGTH`] bytes, and contains
///   only visible ASCII characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionRequirement {
    /// Trust tier.
    scope: Scope,
    /// Opaque action identifier.
    action: String,
}

impl PermissionRequirement {
    /// Parses a `scope:action` requirement.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionParseError`] when the input is malformed.
    pub fn parse(raw: &str) -> Result<Self, PermissionParseError> {
        let (prefix, action) = raw
            .split_once(SCOPE_SEPARATOR)
            .ok_or_else(|| PermissionParseError::MissingSeparator(raw.to_string()))?;
        let scope = Scope::from_prefix(prefix)
            .ok_or_else(|| PermissionParseError::UnknownScope(prefix.to_string()))?;
        if action.is_empty() {
            return Err(PermissionParseError::EmptyAction(raw.to_string()));
        }
        if action.len() > MAX_ACTION_LENGTH {
            return Err(PermissionParseError::ActionTooLong(action.len()));
        }
        if !action.chars().all(|ch| ch.is_ascii_graphic()) {
            return Err(PermissionParseError::InvalidAction(raw.to_string()));
        }
        Ok(Self {
            scope,
            action: action.to_string(),
        })
    }

    /// Returns the requirement scope.
    #[must_use]
    pub const fn scope(&self) -> Scope {
        self.scope
    }

    /// Returns the requirement action.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }
}

impl FromStr for PermissionRequirement {
    type Err = PermissionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PermissionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SCOPE_SEPARATOR}{}", self.scope, self.action)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Permission requirement parse failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionParseError {
    /// No `:` between scope and action.
    #[error("permission `{0}` is missing the scope separator")]
    MissingSeparator(String),
    /// Scope prefix is not one of `c`, `g`, `s`.
    #[error("unknown permission scope `{0}`")]
    UnknownScope(String),
    /// Action segment is empty.
    #[error("permission `{0}` has an empty action")]
    EmptyAction(String),
    /// Action segment exceeds the length limit.
    #[error("permission action too long: {0} bytes")]
    ActionTooLong(usize),
    /// Action contains characters outside visible ASCII.
    #[error("permission `{0}` has an invalid action")]
    InvalidAction(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
