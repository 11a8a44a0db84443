// crates/fleetd-core/src/registry.rs
// ============================================================================
// Module: Server Registry
// Description: Atomically published snapshots of per-server credential records.
// Purpose: Serve O(1) lock-free lookups while reloads replace the whole catalog.
// Dependencies: arc-swap, thiserror
// ============================================================================

//! ## Overview
//! The registry holds one [`RegistrySnapshot`] at a time. A reload decodes
//! every record through a [`ServerSource`], validates the set as a whole,
//! builds a fresh snapshot off to the side, and publishes it with a single
//! pointer swap. Readers never lock and always observe either the old or the
//! new snapshot in full.
//!
//! ## Invariants
//! - A failed load publishes nothing; the previous snapshot stays live.
//! - Reloads serialize on a writer mutex that readers never touch.
//! - Generations increase by one per publication.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::SystemTime;

use arc_swap::ArcSwap;
use thiserror::Error;

use crate::identifiers::ServerId;
use crate::record::ServerRecord;

// ============================================================================
// SECTION: Source Interface
// ============================================================================

/// Loader interface for server records.
///
/// Implementations decode all of their sources or fail with no partial result.
pub trait ServerSource: Send + Sync {
    /// Returns a human-readable description of the source (for audit logs).
    fn describe(&self) -> String;

    /// Decodes every server record.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when any single source is malformed.
    fn load_records(&self) -> Result<Vec<ServerRecord>, RegistryError>;
}

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// Immutable view of the server registry.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    /// Publication counter (0 until published).
    generation: u64,
    /// Time the snapshot was assembled.
    loaded_at: SystemTime,
    /// Records keyed by server identifier.
    servers: HashMap<ServerId, Arc<ServerRecord>>,
}

impl RegistrySnapshot {
    /// Returns an empty, unpublished snapshot.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            generation: 0,
            loaded_at: SystemTime::now(),
            servers: HashMap::new(),
        }
    }

    /// Builds a snapshot from decoded records.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on empty identifiers, duplicate server
    /// identifiers, empty tokens, keys granting nothing, or tokens repeated
    /// within one server.
    pub fn from_records(records: Vec<ServerRecord>) -> Result<Self, RegistryError> {
        let mut servers = HashMap::with_capacity(records.len());
        for record in records {
            validate_record(&record)?;
            let id = record.id().clone();
            if servers.contains_key(&id) {
                return Err(RegistryError::DuplicateServer(id));
            }
            servers.insert(id, Arc::new(record));
        }
        Ok(Self {
            generation: 0,
            loaded_at: SystemTime::now(),
            servers,
        })
    }

    /// Returns the record for a server identifier.
    #[must_use]
    pub fn get(&self, server_id: &str) -> Option<&Arc<ServerRecord>> {
        self.servers.get(server_id)
    }

    /// Returns the number of servers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Returns true when no servers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Returns all server identifiers in sorted order.
    #[must_use]
    pub fn server_ids(&self) -> Vec<ServerId> {
        let mut ids: Vec<ServerId> = self.servers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns the publication generation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the assembly timestamp.
    #[must_use]
    pub const fn loaded_at(&self) -> SystemTime {
        self.loaded_at
    }
}

/// Checks structural invariants for a single record.
fn validate_record(record: &ServerRecord) -> Result<(), RegistryError> {
    if record.id().is_empty() {
        return Err(RegistryError::Invalid("server id must be non-empty".to_string()));
    }
    for key in record.keys() {
        if key.token().is_empty() {
            return Err(RegistryError::Invalid(format!(
                "server {} has an access key with an empty token",
                record.id()
            )));
        }
        if key.permissions().is_empty() {
            return Err(RegistryError::Invalid(format!(
                "server {} has an access key granting no permissions",
                record.id()
            )));
        }
    }
    if record.duplicate_token().is_some() {
        return Err(RegistryError::DuplicateToken(record.id().clone()));
    }
    Ok(())
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Summary of a successful reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadSummary {
    /// Generation replaced by the reload.
    pub previous_generation: u64,
    /// Generation now live.
    pub generation: u64,
    /// Number of servers in the live snapshot.
    pub server_count: usize,
}

/// Live server registry.
pub struct ServerRegistry {
    /// Active snapshot; swapped wholesale.
    active: ArcSwap<RegistrySnapshot>,
    /// Serializes writers.
    writer: Mutex<()>,
}

impl ServerRegistry {
    /// Builds a registry with an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: ArcSwap::from_pointee(RegistrySnapshot::empty()),
            writer: Mutex::new(()),
        }
    }

    /// Decodes a source into an unpublished snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the source or the assembled set is invalid.
    pub fn load(source: &dyn ServerSource) -> Result<RegistrySnapshot, RegistryError> {
        RegistrySnapshot::from_records(source.load_records()?)
    }

    /// Loads `source` and publishes the result.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when loading fails; the live snapshot is
    /// left untouched in that case.
    pub fn reload(&self, source: &dyn ServerSource) -> Result<ReloadSummary, RegistryError> {
        let guard = self.lock_writer();
        let snapshot = Self::load(source)?;
        Ok(self.publish_locked(&guard, snapshot))
    }

    /// Publishes a pre-built snapshot.
    pub fn publish(&self, snapshot: RegistrySnapshot) -> ReloadSummary {
        let guard = self.lock_writer();
        self.publish_locked(&guard, snapshot)
    }

    /// Returns the record for a server identifier from the live snapshot.
    #[must_use]
    pub fn lookup(&self, server_id: &str) -> Option<Arc<ServerRecord>> {
        self.active.load().get(server_id).cloned()
    }

    /// Returns the live snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.active.load_full()
    }

    /// Acquires the writer lock. The guarded value is `()`, so a poisoned
    /// lock carries no broken state and is recovered.
    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stamps and publishes a snapshot while the writer lock is held.
    fn publish_locked(
        &self,
        _guard: &MutexGuard<'_, ()>,
        mut snapshot: RegistrySnapshot,
    ) -> ReloadSummary {
        let previous_generation = self.active.load().generation();
        snapshot.generation = previous_generation + 1;
        let summary = ReloadSummary {
            previous_generation,
            generation: snapshot.generation,
            server_count: snapshot.len(),
        };
        self.active.store(Arc::new(snapshot));
        summary
    }
}

impl Default for ServerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registry load failures.
///
/// # Invariants
/// - Variants are stable for error classification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A configuration source could not be read or decoded.
    #[error("configuration load failure: {0}")]
    ConfigurationLoadFailure(String),
    /// Two sources declare the same server identifier.
    #[error("duplicate server id: {0}")]
    DuplicateServer(ServerId),
    /// Two keys on one server share a token.
    #[error("duplicate access token on server {0}")]
    DuplicateToken(ServerId),
    /// A record violates a structural invariant.
    #[error("invalid server record: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests;
