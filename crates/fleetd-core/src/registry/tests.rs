// crates/fleetd-core/src/registry/tests.rs
// ============================================================================
// Module: Server Registry Unit Tests
// Description: Snapshot assembly, publication, and reload failure handling.
// Purpose: Validate all-or-nothing reloads with in-memory sources.
// Dependencies: fleetd-core
// ============================================================================

//! ## Overview
//! Drives the registry with in-memory [`ServerSource`] fixtures, including
//! concurrent readers racing a stream of reloads.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions use unwrap for clarity."
)]

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;

use super::*;
use crate::record::AccessKey;
use crate::record::KeyPermissions;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

struct StaticSource {
    result: Result<Vec<ServerRecord>, RegistryError>,
}

impl ServerSource for StaticSource {
    fn describe(&self) -> String {
        "static".to_string()
    }

    fn load_records(&self) -> Result<Vec<ServerRecord>, RegistryError> {
        self.result.clone()
    }
}

fn ok_source(records: Vec<ServerRecord>) -> StaticSource {
    StaticSource {
        result: Ok(records),
    }
}

fn record(id: &str) -> ServerRecord {
    ServerRecord::new(id, vec![AccessKey::global(format!("{id}-key"))])
}

fn fleet(prefix: &str, count: usize) -> Vec<ServerRecord> {
    (0 .. count).map(|index| record(&format!("{prefix}-{index}"))).collect()
}

// ============================================================================
// SECTION: Snapshot Assembly
// ============================================================================

#[test]
fn new_registry_is_empty() {
    let registry = ServerRegistry::new();
    assert!(registry.snapshot().is_empty());
    assert_eq!(registry.snapshot().generation(), 0);
    assert!(registry.lookup("existingserver").is_none());
}

#[test]
fn reload_publishes_all_records() {
    let registry = ServerRegistry::new();
    let summary = registry.reload(&ok_source(vec![record("a"), record("b")])).unwrap();
    assert_eq!(summary.previous_generation, 0);
    assert_eq!(summary.generation, 1);
    assert_eq!(summary.server_count, 2);
    assert!(registry.lookup("a").is_some());
    assert!(registry.lookup("b").is_some());
    assert_eq!(registry.snapshot().server_ids(), vec![ServerId::new("a"), ServerId::new("b")]);
}

#[test]
fn reload_replaces_rather_than_merges() {
    let registry = ServerRegistry::new();
    registry.reload(&ok_source(vec![record("a"), record("b")])).unwrap();
    registry.reload(&ok_source(vec![record("c")])).unwrap();
    assert!(registry.lookup("a").is_none());
    assert!(registry.lookup("c").is_some());
    assert_eq!(registry.snapshot().generation(), 2);
}

#[test]
fn duplicate_server_ids_fail_the_load() {
    let result = RegistrySnapshot::from_records(vec![record("a"), record("a")]);
    assert_eq!(result.unwrap_err(), RegistryError::DuplicateServer(ServerId::new("a")));
}

#[test]
fn duplicate_tokens_fail_the_load() {
    let record = ServerRecord::new(
        "a",
        vec![AccessKey::global("shared"), AccessKey::scoped("shared", ["test"])],
    );
    let result = RegistrySnapshot::from_records(vec![record]);
    assert_eq!(result.unwrap_err(), RegistryError::DuplicateToken(ServerId::new("a")));
}

#[test]
fn structural_violations_fail_the_load() {
    let empty_id = ServerRecord::new("", vec![AccessKey::global("k")]);
    assert!(matches!(
        RegistrySnapshot::from_records(vec![empty_id]),
        Err(RegistryError::Invalid(_))
    ));
    let empty_token = ServerRecord::new("a", vec![AccessKey::global("")]);
    assert!(matches!(
        RegistrySnapshot::from_records(vec![empty_token]),
        Err(RegistryError::Invalid(_))
    ));
    let no_actions = ServerRecord::new(
        "a",
        vec![AccessKey::new("k", KeyPermissions::actions(Vec::<String>::new()))],
    );
    assert!(matches!(
        RegistrySnapshot::from_records(vec![no_actions]),
        Err(RegistryError::Invalid(_))
    ));
}

// ============================================================================
// SECTION: Failure Isolation
// ============================================================================

#[test]
fn failed_reload_keeps_previous_snapshot() {
    let registry = ServerRegistry::new();
    registry.reload(&ok_source(vec![record("existingserver")])).unwrap();
    let failing = StaticSource {
        result: Err(RegistryError::ConfigurationLoadFailure("bad file".to_string())),
    };
    let error = registry.reload(&failing).unwrap_err();
    assert!(matches!(error, RegistryError::ConfigurationLoadFailure(_)));
    assert!(registry.lookup("existingserver").is_some());
    assert_eq!(registry.snapshot().generation(), 1);
}

#[test]
fn invalid_set_keeps_previous_snapshot() {
    let registry = ServerRegistry::new();
    registry.reload(&ok_source(vec![record("a")])).unwrap();
    let result = registry.reload(&ok_source(vec![record("b"), record("b")]));
    assert!(result.is_err());
    assert!(registry.lookup("a").is_some());
    assert!(registry.lookup("b").is_none());
}

#[test]
fn publish_stamps_generation() {
    let registry = ServerRegistry::new();
    let snapshot = RegistrySnapshot::from_records(vec![record("a")]).unwrap();
    assert_eq!(snapshot.generation(), 0);
    let summary = registry.publish(snapshot);
    assert_eq!(summary.generation, 1);
    assert_eq!(registry.snapshot().generation(), 1);
}

// ============================================================================
// SECTION: Concurrency
// ============================================================================

#[test]
fn readers_never_observe_partial_snapshots() {
    const FLEET_SIZE: usize = 64;
    let registry = Arc::new(ServerRegistry::new());
    registry.reload(&ok_source(fleet("old", FLEET_SIZE))).unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0 .. 4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    let snapshot = registry.snapshot();
                    assert_eq!(snapshot.len(), FLEET_SIZE);
                    let old = snapshot.get("old-0").is_some();
                    let new = snapshot.get("new-0").is_some();
                    assert!(old ^ new, "snapshot mixes generations");
                    let prefix = if old { "old" } else { "new" };
                    for index in 0 .. FLEET_SIZE {
                        assert!(snapshot.get(&format!("{prefix}-{index}")).is_some());
                    }
                }
            })
        })
        .collect();

    for round in 0 .. 50 {
        let prefix = if round % 2 == 0 { "new" } else { "old" };
        registry.reload(&ok_source(fleet(prefix, FLEET_SIZE))).unwrap();
    }
    done.store(true, Ordering::Release);
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(registry.snapshot().generation(), 51);
}

#[test]
fn concurrent_reloads_serialize_generations() {
    let registry = Arc::new(ServerRegistry::new());
    let writers: Vec<_> = (0 .. 8)
        .map(|index| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                registry.reload(&ok_source(fleet(&format!("w{index}"), 4))).unwrap()
            })
        })
        .collect();
    let mut generations: Vec<u64> =
        writers.into_iter().map(|writer| writer.join().unwrap().generation).collect();
    generations.sort_unstable();
    assert_eq!(generations, (1 ..= 8).collect::<Vec<u64>>());
}
