// crates/fleetd-core/src/lib.rs
// ============================================================================
// Module: fleetd Core
// Description: Permission model, credential evaluation, and server registry.
// Purpose: Decide allow/deny for hosted-server API requests.
// Dependencies: arc-swap, serde, sha2, subtle, thiserror
// ============================================================================

//! ## Overview
//! `fleetd-core` holds the request-authorization core of the fleet daemon. It
//! parses permission requirements, evaluates presented tokens against the
//! daemon credential or per-server access keys, and keeps the active server
//! registry as an atomically swapped immutable snapshot.
//!
//! Security posture: tokens are untrusted input and are always compared in
//! constant time. Denials never reveal whether a token exists.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod evaluator;
pub mod identifiers;
pub mod permission;
pub mod record;
pub mod registry;
pub mod security;
pub mod verdict;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use evaluator::PermissionEvaluator;
pub use evaluator::evaluate;
pub use identifiers::ServerId;
pub use permission::PermissionParseError;
pub use permission::PermissionRequirement;
pub use permission::Scope;
pub use record::AccessKey;
pub use record::KeyPermissions;
pub use record::ServerRecord;
pub use registry::RegistryError;
pub use registry::RegistrySnapshot;
pub use registry::ReloadSummary;
pub use registry::ServerRegistry;
pub use registry::ServerSource;
pub use security::DaemonCredential;
pub use security::constant_time_eq;
pub use security::constant_time_eq_str;
pub use security::token_fingerprint;
pub use verdict::AuthError;
pub use verdict::AuthVerdict;
