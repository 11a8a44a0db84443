// crates/fleetd-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config and server directory tests.
// Purpose: Reduce duplication across integration tests for fleetd-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use fleetd_config::FleetdConfig;

/// Parses a TOML string into a `FleetdConfig` for tests.
pub fn config_from_toml(toml_str: &str) -> Result<FleetdConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal valid config with an inline daemon credential.
pub fn minimal_config() -> Result<FleetdConfig, toml::de::Error> {
    config_from_toml("[auth]\ntoken = \"existingkey\"\n")
}

/// Writes a file under `dir` and returns its path.
pub fn write_file(dir: &Path, name: &str, contents: &str) -> Result<PathBuf, std::io::Error> {
    let path = dir.join(name);
    fs::write(&path, contents)?;
    Ok(path)
}

/// Server file with a global key and a scoped key, matching the daemon tests.
pub const EXISTING_SERVER_JSON: &str = r#"{
  "id": "existingserver",
  "keys": [
    { "token": "existingkey", "global": true },
    { "token": "existingglobalskey", "global": true },
    { "token": "existingspecificskey", "permissions": ["test"] }
  ]
}"#;

/// Second server expressed in TOML.
pub const OTHER_SERVER_TOML: &str = r#"
id = "otherserver"

[[keys]]
token = "otherkey"
permissions = ["console", "power"]
"#;
