// crates/fleetd-core/tests/proptest_token_match.rs
// ============================================================================
// Module: Token Match Property Tests
// Description: Property tests for exact token matching.
// Purpose: Ensure prefixes, suffixes, and near-misses never authorize.
// Dependencies: fleetd-core, proptest
// ============================================================================

//! Property tests for daemon credential and server key matching.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions use unwrap for clarity."
)]

use fleetd_core::AccessKey;
use fleetd_core::AuthVerdict;
use fleetd_core::DaemonCredential;
use fleetd_core::PermissionEvaluator;
use fleetd_core::PermissionRequirement;
use fleetd_core::ServerRecord;
use proptest::prelude::*;

fn secret_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9]{1,48}"
}

proptest! {
    #[test]
    fn control_scope_accepts_only_the_exact_credential(
        secret in secret_strategy(),
        extra in "[A-Za-z0-9]{1,8}",
        cut in 0usize..48,
    ) {
        let evaluator = PermissionEvaluator::new(DaemonCredential::new(secret.clone()));
        let requirement = PermissionRequirement::parse("c:somepermission").unwrap();
        prop_assert_eq!(evaluator.evaluate(&requirement, &secret, None), AuthVerdict::Allowed);

        let prefix = &secret[..cut.min(secret.len() - 1)];
        if !prefix.is_empty() {
            prop_assert_eq!(
                evaluator.evaluate(&requirement, prefix, None),
                AuthVerdict::DeniedForbidden
            );
        }
        let suffixed = format!("{secret}{extra}");
        prop_assert_eq!(
            evaluator.evaluate(&requirement, &suffixed, None),
            AuthVerdict::DeniedForbidden
        );
        let prefixed = format!("{extra}{secret}");
        prop_assert_eq!(
            evaluator.evaluate(&requirement, &prefixed, None),
            AuthVerdict::DeniedForbidden
        );
    }

    #[test]
    fn server_keys_match_exactly(
        token in secret_strategy(),
        extra in "[A-Za-z0-9]{1,8}",
    ) {
        let evaluator = PermissionEvaluator::new(DaemonCredential::new("unrelated-daemon-key"));
        let record = ServerRecord::new("server", vec![AccessKey::scoped(token.clone(), ["test"])]);
        let requirement = PermissionRequirement::parse("s:test").unwrap();
        prop_assert_eq!(
            evaluator.evaluate(&requirement, &token, Some(&record)),
            AuthVerdict::Allowed
        );
        let suffixed = format!("{token}{extra}");
        prop_assert_eq!(
            evaluator.evaluate(&requirement, &suffixed, Some(&record)),
            AuthVerdict::DeniedForbidden
        );
    }
}
