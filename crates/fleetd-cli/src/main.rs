// crates/fleetd-cli/src/main.rs
// ============================================================================
// Module: fleetd CLI Entry Point
// Description: Command dispatcher for the fleetd daemon and offline checks.
// Purpose: Start the API server and validate configuration before deploys.
// Dependencies: clap, fleetd-api, fleetd-config, fleetd-core, thiserror, tokio.
// ============================================================================

//! ## Overview
//! `fleetd serve` loads `fleetd.toml`, enforces the loopback policy, loads the
//! server directory, and serves the API. `fleetd config validate` and
//! `fleetd servers check` run the same loaders offline so a bad file is
//! caught before it reaches a running daemon.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use fleetd_api::ApiServer;
use fleetd_cli::serve_policy::ALLOW_NON_LOOPBACK_ENV;
use fleetd_cli::serve_policy::BindOutcome;
use fleetd_cli::serve_policy::enforce_local_only;
use fleetd_cli::serve_policy::resolve_allow_non_loopback;
use fleetd_config::FleetdConfig;
use fleetd_config::list_server_ids;
use fleetd_core::ServerId;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "fleetd", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the fleetd API server.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Server directory utilities.
    Servers {
        /// Selected servers subcommand.
        #[command(subcommand)]
        command: ServersCommand,
    },
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to fleetd.toml or `FLEETD_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Allow binding the API to a non-loopback address.
    #[arg(long, action = ArgAction::SetTrue)]
    allow_non_loopback: bool,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a fleetd configuration file.
    Validate(ConfigValidateCommand),
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to fleetd.toml or `FLEETD_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Servers subcommands.
#[derive(Subcommand, Debug)]
enum ServersCommand {
    /// Load every server file and list the declared server ids.
    Check(ServersCheckCommand),
}

/// Arguments for `servers check`.
#[derive(Args, Debug)]
struct ServersCheckCommand {
    /// Config file whose `[servers] directory` is checked.
    #[arg(long, value_name = "PATH", conflicts_with = "dir")]
    config: Option<PathBuf>,
    /// Server directory to check directly, bypassing the config file.
    #[arg(long, value_name = "DIR")]
    dir: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point.
#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command: ConfigCommand::Validate(command),
        } => command_config_validate(&command),
        Commands::Servers {
            command: ServersCommand::Check(command),
        } => command_servers_check(&command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = FleetdConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let allow_non_loopback = resolve_allow_non_loopback(command.allow_non_loopback)
        .map_err(|err| CliError::new(err.to_string()))?;
    let outcome = enforce_local_only(&config, allow_non_loopback)
        .map_err(|err| CliError::new(err.to_string()))?;
    if outcome.network_exposed {
        warn_network_exposure(&outcome)?;
    }

    let server = tokio::task::spawn_blocking(move || ApiServer::from_config(&config))
        .await
        .map_err(|err| CliError::new(format!("server init failed: init join failed: {err}")))?
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    let initial = server.initial_load();
    write_stderr_line(&format!(
        "fleetd listening on {} (generation {}, {} servers)",
        server.bind_addr(),
        initial.generation,
        initial.server_count
    ))
    .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    server.serve().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;

    Ok(ExitCode::SUCCESS)
}

/// Emits a warning banner when the API is reachable beyond loopback.
fn warn_network_exposure(outcome: &BindOutcome) -> CliResult<()> {
    write_stderr_line(&format!(
        "WARNING: fleetd API bound to {} without TLS (opted in via --allow-non-loopback or \
         {ALLOW_NON_LOOPBACK_ENV}); access tokens travel in cleartext headers",
        outcome.bind_addr
    ))
    .map_err(|err| CliError::new(output_error("stderr", &err)))
}

// ============================================================================
// SECTION: Offline Commands
// ============================================================================

/// Executes the `config validate` command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let config = validate_config(command.config.as_deref())?;
    write_stdout_line(&format!(
        "config valid (servers directory: {})",
        config.servers_directory().display()
    ))
    .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `servers check` command.
fn command_servers_check(command: &ServersCheckCommand) -> CliResult<ExitCode> {
    let directory = match &command.dir {
        Some(dir) => dir.clone(),
        None => validate_config(command.config.as_deref())?.servers_directory(),
    };
    let ids = check_servers(&directory)?;
    for id in &ids {
        write_stdout_line(id.as_str()).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    write_stderr_line(&format!("{} servers ok in {}", ids.len(), directory.display()))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Loads a config file and resolves its daemon credential.
fn validate_config(path: Option<&Path>) -> CliResult<FleetdConfig> {
    let config = FleetdConfig::load(path)
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    config
        .daemon_credential()
        .map_err(|err| CliError::new(format!("failed to resolve credential: {err}")))?;
    Ok(config)
}

/// Loads every server file in a directory and returns the sorted ids.
fn check_servers(directory: &Path) -> CliResult<Vec<ServerId>> {
    list_server_ids(directory)
        .map_err(|err| CliError::new(format!("server directory check failed: {err}")))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
