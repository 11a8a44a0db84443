// crates/fleetd-api/src/gate/tests.rs
// ============================================================================
// Module: Authorization Gate Unit Tests
// Description: Verdict ordering and status mapping for the gate.
// Purpose: Pin the check order against a live registry.
// Dependencies: fleetd-api, fleetd-core
// ============================================================================

//! ## Overview
//! Drives [`AuthGate`] against a registry published in-process.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions use unwrap for clarity."
)]

use fleetd_core::AccessKey;
use fleetd_core::RegistrySnapshot;

use super::*;

fn gate() -> AuthGate {
    let registry = Arc::new(ServerRegistry::new());
    let snapshot = RegistrySnapshot::from_records(vec![ServerRecord::new(
        "existingserver",
        vec![
            AccessKey::global("existingkey"),
            AccessKey::global("existingglobalskey"),
            AccessKey::scoped("existingspecificskey", ["test"]),
        ],
    )])
    .unwrap();
    registry.publish(snapshot);
    AuthGate::new(DaemonCredential::new("existingkey"), registry)
}

fn requirement(raw: &str) -> PermissionRequirement {
    PermissionRequirement::parse(raw).unwrap()
}

#[test]
fn missing_token_wins_over_every_other_check() {
    let gate = gate();
    for raw in ["c:reload", "g:test", "s:test"] {
        assert_eq!(gate.authorize(&requirement(raw), "", ""), AuthVerdict::DeniedMissingToken);
    }
}

#[test]
fn control_scope_ignores_server_header() {
    let gate = gate();
    let req = requirement("c:list");
    assert_eq!(gate.authorize(&req, "existingkey", ""), AuthVerdict::Allowed);
    assert_eq!(gate.authorize(&req, "existingkey", "notexistingserver"), AuthVerdict::Allowed);
    assert_eq!(gate.authorize(&req, "invalidkey", "existingserver"), AuthVerdict::DeniedForbidden);
}

#[test]
fn server_scopes_require_a_server_identifier() {
    let gate = gate();
    assert_eq!(
        gate.authorize(&requirement("g:test"), "existingkey", ""),
        AuthVerdict::DeniedMissingServerId
    );
    assert_eq!(
        gate.authorize(&requirement("s:test"), "existingkey", ""),
        AuthVerdict::DeniedMissingServerId
    );
}

#[test]
fn unknown_server_is_not_found_before_token_check() {
    let gate = gate();
    assert_eq!(
        gate.authorize(&requirement("g:test"), "invalidkey", "notexistingserver"),
        AuthVerdict::DeniedServerNotFound
    );
}

#[test]
fn resolved_server_is_returned_with_the_verdict() {
    let gate = gate();
    let decision = gate.check(&requirement("s:test"), "existingspecificskey", "existingserver");
    assert_eq!(decision.verdict, AuthVerdict::Allowed);
    assert_eq!(decision.server.unwrap().id().as_str(), "existingserver");

    let denied = gate.check(&requirement("s:without"), "existingspecificskey", "existingserver");
    assert_eq!(denied.verdict, AuthVerdict::DeniedForbidden);
}

#[test]
fn global_scope_rejects_scoped_keys() {
    let gate = gate();
    assert_eq!(
        gate.authorize(&requirement("g:test"), "existingglobalskey", "existingserver"),
        AuthVerdict::Allowed
    );
    assert_eq!(
        gate.authorize(&requirement("g:test"), "existingspecificskey", "existingserver"),
        AuthVerdict::DeniedForbidden
    );
}

#[test]
fn gate_follows_registry_reloads() {
    let gate = gate();
    let req = requirement("g:power");
    assert_eq!(gate.authorize(&req, "newkey", "newserver"), AuthVerdict::DeniedServerNotFound);
    let snapshot = RegistrySnapshot::from_records(vec![ServerRecord::new(
        "newserver",
        vec![AccessKey::global("newkey")],
    )])
    .unwrap();
    gate.registry().publish(snapshot);
    assert_eq!(gate.authorize(&req, "newkey", "newserver"), AuthVerdict::Allowed);
    assert_eq!(
        gate.authorize(&req, "existingkey", "existingserver"),
        AuthVerdict::DeniedServerNotFound
    );
}

#[test]
fn denial_statuses_match_verdicts() {
    assert_eq!(denial_status(AuthVerdict::Allowed), None);
    assert_eq!(denial_status(AuthVerdict::DeniedMissingToken), Some(StatusCode::BAD_REQUEST));
    assert_eq!(denial_status(AuthVerdict::DeniedMissingServerId), Some(StatusCode::BAD_REQUEST));
    assert_eq!(denial_status(AuthVerdict::DeniedServerNotFound), Some(StatusCode::NOT_FOUND));
    assert_eq!(denial_status(AuthVerdict::DeniedForbidden), Some(StatusCode::FORBIDDEN));
}
