// crates/fleetd-cli/src/lib.rs
// ============================================================================
// Module: fleetd CLI Library
// Description: Shared helpers for the fleetd command-line interface.
// Purpose: Keep bind safety checks testable outside the binary.
// Dependencies: fleetd-config
// ============================================================================

//! ## Overview
//! Houses the serve policy used by `fleetd serve`. The binary entry point
//! (`src/main.rs`) imports it before starting the HTTP listener.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Network exposure checks for the API listener.
pub mod serve_policy;
