// crates/fleetd-core/src/record.rs
// ============================================================================
// Module: Server Records
// Description: Per-server access keys and their permission sets.
// Purpose: Model the immutable credential record published for each server.
// Dependencies: serde (via identifiers)
// ============================================================================

//! ## Overview
//! Each hosted server carries an ordered list of [`AccessKey`]s. A key is
//! either global ([`KeyPermissions::All`]) or scoped to an explicit set of
//! actions. Records expose no mutation API; a changed server is published as
//! a new record on the next registry reload.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use crate::identifiers::ServerId;
use crate::security::constant_time_eq_str;
use crate::security::token_fingerprint;

// ============================================================================
// SECTION: Key Permissions
// ============================================================================

/// Permission set granted by an access key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPermissions {
    /// Global key: valid for every action on the server.
    All,
    /// Scoped key: valid for exactly the listed actions.
    Actions(BTreeSet<String>),
}

impl KeyPermissions {
    /// Builds a scoped permission set.
    #[must_use]
    pub fn actions<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Actions(actions.into_iter().map(Into::into).collect())
    }

    /// Returns true for a global key.
    #[must_use]
    pub const fn is_global(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Returns true when the action is granted.
    #[must_use]
    pub fn allows(&self, action: &str) -> bool {
        match self {
            Self::All => true,
            Self::Actions(actions) => actions.contains(action),
        }
    }

    /// Returns true when the set grants nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::All => false,
            Self::Actions(actions) => actions.is_empty(),
        }
    }
}

// ============================================================================
// SECTION: Access Key
// ============================================================================

/// A server access key.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessKey {
    /// Bearer token presented in `X-Access-Token`.
    token: String,
    /// Permissions granted by the token.
    permissions: KeyPermissions,
}

impl AccessKey {
    /// Builds an access key.
    #[must_use]
    pub fn new(token: impl Into<String>, permissions: KeyPermissions) -> Self {
        Self {
            token: token.into(),
            permissions,
        }
    }

    /// Builds a global key.
    #[must_use]
    pub fn global(token: impl Into<String>) -> Self {
        Self::new(token, KeyPermissions::All)
    }

    /// Builds a key scoped to the given actions.
    #[must_use]
    pub fn scoped<I, S>(token: impl Into<String>, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(token, KeyPermissions::actions(actions))
    }

    /// Returns the raw token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns the granted permissions.
    #[must_use]
    pub const fn permissions(&self) -> &KeyPermissions {
        &self.permissions
    }

    /// Compares the presented token against this key in constant time.
    #[must_use]
    pub fn matches_token(&self, token: &str) -> bool {
        !self.token.is_empty() && constant_time_eq_str(&self.token, token)
    }
}

impl fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessKey")
            .field("token_fingerprint", &token_fingerprint(&self.token))
            .field("permissions", &self.permissions)
            .finish()
    }
}

// ============================================================================
// SECTION: Server Record
// ============================================================================

/// Credential record for one hosted server.
///
/// # Invariants
/// - Immutable after construction; shared through `Arc` once published.
/// - Key order is preserved from the configuration source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRecord {
    /// Server identifier.
    id: ServerId,
    /// Ordered access keys.
    keys: Vec<AccessKey>,
}

impl ServerRecord {
    /// Builds a server record.
    #[must_use]
    pub fn new(id: impl Into<ServerId>, keys: Vec<AccessKey>) -> Self {
        Self {
            id: id.into(),
            keys,
        }
    }

    /// Returns the server identifier.
    #[must_use]
    pub const fn id(&self) -> &ServerId {
        &self.id
    }

    /// Returns the ordered access keys.
    #[must_use]
    pub fn keys(&self) -> &[AccessKey] {
        &self.keys
    }

    /// Returns the first key whose token equals `token`.
    ///
    /// Every key is compared so the scan time does not depend on which key
    /// matched.
    #[must_use]
    pub fn find_key(&self, token: &str) -> Option<&AccessKey> {
        let mut found = None;
        for key in &self.keys {
            let matched = key.matches_token(token);
            if matched && found.is_none() {
                found = Some(key);
            }
        }
        found
    }

    /// Returns the first token that appears on more than one key.
    #[must_use]
    pub fn duplicate_token(&self) -> Option<&str> {
        let mut seen = BTreeSet::new();
        self.keys.iter().map(AccessKey::token).find(|token| !seen.insert(*token))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::use_debug, reason = "Redaction test formats the Debug output.")]

    use super::*;

    fn sample_record() -> ServerRecord {
        ServerRecord::new(
            "existingserver",
            vec![
                AccessKey::global("existingkey"),
                AccessKey::scoped("existingspecificskey", ["test"]),
            ],
        )
    }

    #[test]
    fn find_key_matches_exact_tokens_only() {
        let record = sample_record();
        assert!(record.find_key("existingkey").is_some());
        assert!(record.find_key("existingke").is_none());
        assert!(record.find_key("existingkeyx").is_none());
        assert!(record.find_key("").is_none());
    }

    #[test]
    fn find_key_returns_first_structural_match() {
        let record = ServerRecord::new(
            "dup",
            vec![AccessKey::scoped("shared", ["first"]), AccessKey::global("shared")],
        );
        let key = record.find_key("shared");
        assert_eq!(key.map(AccessKey::permissions), Some(&KeyPermissions::actions(["first"])));
        assert_eq!(record.duplicate_token(), Some("shared"));
        assert_eq!(sample_record().duplicate_token(), None);
    }

    #[test]
    fn global_keys_allow_every_action() {
        assert!(KeyPermissions::All.allows("anything"));
        let scoped = KeyPermissions::actions(["test"]);
        assert!(scoped.allows("test"));
        assert!(!scoped.allows("without"));
        assert!(!scoped.is_global());
    }

    #[test]
    fn debug_output_hides_tokens() {
        let rendered = format!("{:?}", sample_record());
        assert!(!rendered.contains("existingspecificskey"));
    }
}
