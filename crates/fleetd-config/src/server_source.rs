// crates/fleetd-config/src/server_source.rs
// ============================================================================
// Module: Server Directory Source
// Description: Decoder for the directory of per-server credential files.
// Purpose: Turn a directory of JSON/TOML files into server records, all or nothing.
// Dependencies: fleetd-core, serde, serde_json, toml
// ============================================================================

//! ## Overview
//! Every regular `*.json` or `*.toml` file in the server directory describes
//! one hosted server:
//!
//! ```json
//! { "id": "existingserver",
//!   "keys": [ { "token": "existingkey", "global": true },
//!             { "token": "existingspecificskey", "permissions": ["test"] } ] }
//! ```
//!
//! Hidden files, sub-directories, and other extensions are skipped. Files are
//! decoded in file-name order; the first malformed file aborts the load and
//! the error names the file.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use fleetd_core::AccessKey;
use fleetd_core::KeyPermissions;
use fleetd_core::RegistryError;
use fleetd_core::ServerId;
use fleetd_core::ServerRecord;
use fleetd_core::ServerSource;
use fleetd_core::permission::MAX_ACTION_LENGTH;
use serde::Deserialize;

use crate::config::ConfigError;
use crate::config::MAX_CONFIG_FILE_SIZE;
use crate::config::validate_path;
use crate::config::validate_token;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum number of server files in one directory.
pub const MAX_SERVER_FILES: usize = 4096;
/// Maximum server identifier length.
pub const MAX_SERVER_ID_LENGTH: usize = 128;
/// Maximum access keys per server.
pub const MAX_KEYS_PER_SERVER: usize = 256;
/// Maximum permission entries per key.
pub const MAX_PERMISSIONS_PER_KEY: usize = 128;

// ============================================================================
// SECTION: File Model
// ============================================================================

/// Decoded server configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerFileConfig {
    /// Server identifier.
    pub id: String,
    /// Access keys in declaration order.
    #[serde(default)]
    pub keys: Vec<AccessKeyConfig>,
}

impl ServerFileConfig {
    /// Validates the server file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file violates a limit or invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.is_empty() {
            return Err(ConfigError::Invalid("server id must be non-empty".to_string()));
        }
        if self.id.len() > MAX_SERVER_ID_LENGTH {
            return Err(ConfigError::Invalid("server id too long".to_string()));
        }
        if !self.id.chars().all(|ch| ch.is_ascii_graphic()) {
            return Err(ConfigError::Invalid(
                "server id must be visible ASCII without whitespace".to_string(),
            ));
        }
        if self.keys.len() > MAX_KEYS_PER_SERVER {
            return Err(ConfigError::Invalid(format!("server {} has too many keys", self.id)));
        }
        let mut tokens = BTreeSet::new();
        for key in &self.keys {
            key.validate()?;
            if !tokens.insert(key.token.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "server {} declares the same token on more than one key",
                    self.id
                )));
            }
        }
        Ok(())
    }

    /// Converts the file into a server record.
    #[must_use]
    pub fn into_record(self) -> ServerRecord {
        let keys = self.keys.into_iter().map(AccessKeyConfig::into_key).collect();
        ServerRecord::new(self.id, keys)
    }
}

/// Access key entry in a server file.
///
/// # Invariants
/// - Exactly one of `global = true` and a non-empty `permissions` list.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessKeyConfig {
    /// Bearer token.
    pub token: String,
    /// Marks the key as valid for every action.
    #[serde(default)]
    pub global: bool,
    /// Actions granted to a scoped key.
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl std::fmt::Debug for AccessKeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessKeyConfig")
            .field("token", &"<redacted>")
            .field("global", &self.global)
            .field("permissions", &self.permissions)
            .finish()
    }
}

impl AccessKeyConfig {
    /// Validates the key entry.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_token(&self.token, "access key token")?;
        if self.global && !self.permissions.is_empty() {
            return Err(ConfigError::Invalid(
                "access key cannot be global and list permissions".to_string(),
            ));
        }
        if !self.global && self.permissions.is_empty() {
            return Err(ConfigError::Invalid(
                "access key must be global or list at least one permission".to_string(),
            ));
        }
        if self.permissions.len() > MAX_PERMISSIONS_PER_KEY {
            return Err(ConfigError::Invalid("access key lists too many permissions".to_string()));
        }
        for action in &self.permissions {
            validate_action(action)?;
        }
        Ok(())
    }

    /// Converts the entry into an access key.
    fn into_key(self) -> AccessKey {
        if self.global {
            AccessKey::global(self.token)
        } else {
            AccessKey::new(self.token, KeyPermissions::actions(self.permissions))
        }
    }
}

// ============================================================================
// SECTION: Decoding
// ============================================================================

/// Supported server file encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerFileFormat {
    /// JSON document.
    Json,
    /// TOML document.
    Toml,
}

impl ServerFileFormat {
    /// Detects the format from the file extension.
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Some(Self::Json),
            Some("toml") => Some(Self::Toml),
            _ => None,
        }
    }
}

/// Decodes and validates a single server file.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read, parsed, or validated.
pub fn decode_server_file(path: &Path) -> Result<ServerFileConfig, ConfigError> {
    let format = ServerFileFormat::from_path(path).ok_or_else(|| {
        ConfigError::Invalid(format!("{}: unsupported server file extension", path.display()))
    })?;
    let bytes = fs::read(path)
        .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
    if bytes.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::Invalid(format!(
            "{}: server file exceeds size limit",
            path.display()
        )));
    }
    let content = std::str::from_utf8(&bytes).map_err(|_| {
        ConfigError::Invalid(format!("{}: server file must be utf-8", path.display()))
    })?;
    let file: ServerFileConfig = match format {
        ServerFileFormat::Json => serde_json::from_str(content)
            .map_err(|err| ConfigError::Parse(format!("{}: {err}", path.display())))?,
        ServerFileFormat::Toml => toml::from_str(content)
            .map_err(|err| ConfigError::Parse(format!("{}: {err}", path.display())))?,
    };
    file.validate().map_err(|err| with_path(path, err))?;
    Ok(file)
}

/// Prefixes an error message with the offending file path.
fn with_path(path: &Path, error: ConfigError) -> ConfigError {
    match error {
        ConfigError::Io(message) => ConfigError::Io(format!("{}: {message}", path.display())),
        ConfigError::Parse(message) => ConfigError::Parse(format!("{}: {message}", path.display())),
        ConfigError::Invalid(message) => {
            ConfigError::Invalid(format!("{}: {message}", path.display()))
        }
    }
}

/// Decodes every server file in a directory.
///
/// # Errors
///
/// Returns [`ConfigError`] when the directory cannot be listed, any file is
/// malformed, or two files declare the same server id. No partial result is
/// returned.
pub fn load_server_directory(directory: &Path) -> Result<Vec<ServerRecord>, ConfigError> {
    validate_path(directory)?;
    let paths = server_file_paths(directory)?;
    let mut origins: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        let file = decode_server_file(&path)?;
        if let Some(previous) = origins.get(&file.id) {
            return Err(ConfigError::Invalid(format!(
                "server id {} declared in both {} and {}",
                file.id,
                previous.display(),
                path.display()
            )));
        }
        origins.insert(file.id.clone(), path);
        records.push(file.into_record());
    }
    Ok(records)
}

/// Lists candidate server files in name order.
fn server_file_paths(directory: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let entries = fs::read_dir(directory)
        .map_err(|err| ConfigError::Io(format!("{}: {err}", directory.display())))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| ConfigError::Io(format!("{}: {err}", directory.display())))?;
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden || ServerFileFormat::from_path(&path).is_none() {
            continue;
        }
        let metadata = fs::metadata(&path)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
        if !metadata.is_file() {
            continue;
        }
        paths.push(path);
        if paths.len() > MAX_SERVER_FILES {
            return Err(ConfigError::Invalid(format!(
                "{}: too many server files",
                directory.display()
            )));
        }
    }
    paths.sort();
    Ok(paths)
}

/// Validates a permission action listed on a key.
fn validate_action(action: &str) -> Result<(), ConfigError> {
    if action.is_empty() {
        return Err(ConfigError::Invalid("permission action must be non-empty".to_string()));
    }
    if action.len() > MAX_ACTION_LENGTH {
        return Err(ConfigError::Invalid("permission action too long".to_string()));
    }
    if !action.chars().all(|ch| ch.is_ascii_graphic()) {
        return Err(ConfigError::Invalid(format!("permission action `{action}` is invalid")));
    }
    Ok(())
}

// ============================================================================
// SECTION: Registry Source
// ============================================================================

/// [`ServerSource`] backed by a directory of server files.
#[derive(Debug, Clone)]
pub struct DirectoryServerSource {
    /// Directory holding the server files.
    directory: PathBuf,
}

impl DirectoryServerSource {
    /// Builds a source for the given directory.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Returns the source directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl ServerSource for DirectoryServerSource {
    fn describe(&self) -> String {
        self.directory.display().to_string()
    }

    fn load_records(&self) -> Result<Vec<ServerRecord>, RegistryError> {
        load_server_directory(&self.directory)
            .map_err(|err| RegistryError::ConfigurationLoadFailure(err.to_string()))
    }
}

/// Returns the server identifiers declared in a directory without building a
/// registry. Used by offline configuration checks.
///
/// # Errors
///
/// Returns [`ConfigError`] when the directory fails to load.
pub fn list_server_ids(directory: &Path) -> Result<Vec<ServerId>, ConfigError> {
    let mut ids: Vec<ServerId> =
        load_server_directory(directory)?.into_iter().map(|record| record.id().clone()).collect();
    ids.sort();
    Ok(ids)
}
