// crates/fleetd-cli/src/serve_policy.rs
// ============================================================================
// Module: Serve Policy
// Description: Network exposure policy checks for the API listener.
// Purpose: Keep the daemon on loopback unless the operator opts in.
// Dependencies: fleetd-config
// ============================================================================

//! ## Overview
//! The API speaks plain HTTP and carries bearer tokens in headers, so binding
//! to a non-loopback address requires an explicit opt-in through
//! `--allow-non-loopback` or [`ALLOW_NON_LOOPBACK_ENV`].

use std::env;
use std::net::SocketAddr;

use fleetd_config::FleetdConfig;
use thiserror::Error;

/// Environment variable enabling non-loopback binds.
pub const ALLOW_NON_LOOPBACK_ENV: &str = "FLEETD_ALLOW_NON_LOOPBACK";

/// Bind outcome used for startup warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindOutcome {
    /// Resolved listen address.
    pub bind_addr: SocketAddr,
    /// True when the listener is reachable beyond loopback.
    pub network_exposed: bool,
}

/// Serve policy failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServePolicyError {
    /// Environment variable was set to an invalid value.
    #[error("FLEETD_ALLOW_NON_LOOPBACK has invalid value `{value}` (expected true/false)")]
    InvalidEnv {
        /// Raw environment value.
        value: String,
    },
    /// Bind string failed to parse.
    #[error("invalid bind address {bind}: {error}")]
    InvalidBind {
        /// Raw bind value.
        bind: String,
        /// Parse error message.
        error: String,
    },
    /// Non-loopback binding requires explicit opt-in.
    #[error(
        "refusing to bind {bind}: non-loopback binds need --allow-non-loopback or \
         FLEETD_ALLOW_NON_LOOPBACK=true"
    )]
    NonLoopbackOptInRequired {
        /// Bind address.
        bind: String,
    },
}

/// Resolves the non-loopback opt-in from the CLI flag and environment.
///
/// # Errors
/// Returns [`ServePolicyError::InvalidEnv`] when the environment value is invalid.
pub fn resolve_allow_non_loopback(flag: bool) -> Result<bool, ServePolicyError> {
    if flag {
        return Ok(true);
    }
    let Some(value) = env::var_os(ALLOW_NON_LOOPBACK_ENV) else {
        return Ok(false);
    };
    parse_allow_non_loopback_value(&value.to_string_lossy())
}

/// Checks the configured bind address against the loopback policy.
///
/// # Errors
/// Returns [`ServePolicyError`] when the address is invalid or exposed
/// without opt-in.
pub fn enforce_local_only(
    config: &FleetdConfig,
    allow_non_loopback: bool,
) -> Result<BindOutcome, ServePolicyError> {
    let bind = config.api.bind.as_str();
    let addr: SocketAddr =
        bind.parse().map_err(|err: std::net::AddrParseError| ServePolicyError::InvalidBind {
            bind: bind.to_string(),
            error: err.to_string(),
        })?;
    if addr.ip().is_loopback() {
        return Ok(BindOutcome {
            bind_addr: addr,
            network_exposed: false,
        });
    }
    if !allow_non_loopback {
        return Err(ServePolicyError::NonLoopbackOptInRequired {
            bind: bind.to_string(),
        });
    }
    Ok(BindOutcome {
        bind_addr: addr,
        network_exposed: true,
    })
}

/// Parses a bool-ish string (true/false/1/0/yes/no/on/off).
fn parse_boolish(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Parses an env value for allow-non-loopback.
fn parse_allow_non_loopback_value(value: &str) -> Result<bool, ServePolicyError> {
    parse_boolish(value).ok_or_else(|| ServePolicyError::InvalidEnv {
        value: value.to_string(),
    })
}
