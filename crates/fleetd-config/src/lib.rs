// crates/fleetd-config/src/lib.rs
// ============================================================================
// Module: fleetd Config Library
// Description: Canonical daemon config model and server directory decoding.
// Purpose: Single source of truth for fleetd.toml and server source semantics.
// Dependencies: fleetd-core, serde, serde_json, toml
// ============================================================================

//! ## Overview
//! `fleetd-config` defines the daemon configuration (`fleetd.toml`) and the
//! decoder for the directory of per-server credential files. Validation is
//! strict and fail-closed: one malformed server file fails the whole load.
//!
//! Security posture: config inputs are untrusted and size-limited.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod server_source;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use server_source::AccessKeyConfig;
pub use server_source::DirectoryServerSource;
pub use server_source::ServerFileConfig;
pub use server_source::decode_server_file;
pub use server_source::list_server_ids;
pub use server_source::load_server_directory;
