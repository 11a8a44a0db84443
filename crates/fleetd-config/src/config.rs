// crates/fleetd-config/src/config.rs
// ============================================================================
// Module: fleetd Configuration
// Description: Configuration loading and validation for the fleet daemon.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: fleetd-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed. The daemon credential may be
//! given inline or through an environment variable so it can stay out of the
//! file. Relative server directories resolve against the config file.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use fleetd_core::DaemonCredential;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "fleetd.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "FLEETD_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum length of an access token.
pub const MAX_TOKEN_LENGTH: usize = 256;
/// Default API bind address.
const DEFAULT_BIND: &str = "127.0.0.1:8080";
/// Default maximum request body size.
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Upper bound for the request body size limit.
const MAX_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;
/// Default server configuration directory.
const DEFAULT_SERVERS_DIRECTORY: &str = "servers";

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// fleetd daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FleetdConfig {
    /// HTTP API configuration.
    #[serde(default)]
    pub api: ApiConfig,
    /// Daemon credential configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Server credential directory configuration.
    #[serde(default)]
    pub servers: ServersConfig,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Path the configuration was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl FleetdConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.source_path = Some(resolved);
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api.validate()?;
        self.auth.validate()?;
        self.servers.validate()?;
        self.audit.validate()?;
        Ok(())
    }

    /// Resolves the daemon credential.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the credential is missing or empty.
    pub fn daemon_credential(&self) -> Result<DaemonCredential, ConfigError> {
        self.auth.resolve()
    }

    /// Returns the server directory, resolved against the config file location.
    #[must_use]
    pub fn servers_directory(&self) -> PathBuf {
        resolve_relative(self.source_path.as_deref(), &self.servers.directory)
    }

    /// Returns the audit log path, resolved against the config file location.
    #[must_use]
    pub fn audit_path(&self) -> Option<PathBuf> {
        self.audit
            .path
            .as_ref()
            .map(|path| resolve_relative(self.source_path.as_deref(), Path::new(path)))
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Socket address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ApiConfig {
    /// Parses the bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the address is invalid.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind.parse().map_err(|_| ConfigError::Invalid("invalid bind address".to_string()))
    }

    /// Validates API settings.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "api.max_body_bytes must be greater than zero".to_string(),
            ));
        }
        if self.max_body_bytes > MAX_MAX_BODY_BYTES {
            return Err(ConfigError::Invalid("api.max_body_bytes too large".to_string()));
        }
        Ok(())
    }
}

/// Daemon credential configuration.
///
/// # Invariants
/// - Exactly one of `token` and `token_env` is set after validation.
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Inline daemon credential.
    #[serde(default)]
    pub token: Option<String>,
    /// Environment variable holding the daemon credential.
    #[serde(default)]
    pub token_env: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("token_env", &self.token_env)
            .finish()
    }
}

impl AuthConfig {
    /// Validates credential settings.
    fn validate(&self) -> Result<(), ConfigError> {
        match (&self.token, &self.token_env) {
            (Some(_), Some(_)) => Err(ConfigError::Invalid(
                "auth.token and auth.token_env are mutually exclusive".to_string(),
            )),
            (None, None) => Err(ConfigError::Invalid(
                "auth.token or auth.token_env must be set".to_string(),
            )),
            (Some(token), None) => validate_token(token, "auth.token"),
            (None, Some(name)) => {
                if name.trim().is_empty() {
                    return Err(ConfigError::Invalid("auth.token_env must be non-empty".to_string()));
                }
                Ok(())
            }
        }
    }

    /// Resolves the daemon credential value.
    fn resolve(&self) -> Result<DaemonCredential, ConfigError> {
        let token = match (&self.token, &self.token_env) {
            (Some(token), None) => token.clone(),
            (None, Some(name)) => env::var(name).map_err(|_| {
                ConfigError::Invalid(format!("auth.token_env variable {name} is not set"))
            })?,
            _ => {
                return Err(ConfigError::Invalid(
                    "exactly one of auth.token and auth.token_env must be set".to_string(),
                ));
            }
        };
        validate_token(&token, "daemon credential")?;
        Ok(DaemonCredential::new(token))
    }
}

/// Server credential directory configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServersConfig {
    /// Directory of per-server configuration files.
    #[serde(default = "default_servers_directory")]
    pub directory: PathBuf,
}

impl Default for ServersConfig {
    fn default() -> Self {
        Self {
            directory: default_servers_directory(),
        }
    }
}

impl ServersConfig {
    /// Validates directory settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.directory.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("servers.directory must be non-empty".to_string()));
        }
        validate_path(&self.directory)
    }
}

/// Audit logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Emit audit events.
    #[serde(default)]
    pub enabled: bool,
    /// Append events to this file instead of stderr.
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Validates audit settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            if path.trim().is_empty() {
                return Err(ConfigError::Invalid("audit.path must be non-empty".to_string()));
            }
            validate_path(Path::new(path))?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// Parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default maximum body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default server directory.
fn default_servers_directory() -> PathBuf {
    PathBuf::from(DEFAULT_SERVERS_DIRECTORY)
}

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates a path against security limits.
pub(crate) fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Joins a relative path onto the directory holding the config file.
fn resolve_relative(source: Option<&Path>, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match source.and_then(Path::parent) {
        Some(parent) => parent.join(path),
        None => path.to_path_buf(),
    }
}

/// Validates an access token value.
pub(crate) fn validate_token(token: &str, field: &str) -> Result<(), ConfigError> {
    if token.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if token.len() > MAX_TOKEN_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} too long")));
    }
    if !token.chars().all(|ch| ch.is_ascii_graphic()) {
        return Err(ConfigError::Invalid(format!(
            "{field} must be visible ASCII without whitespace"
        )));
    }
    Ok(())
}
