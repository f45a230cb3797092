//! colibri CLI - Command-line tool for the Colibri spectrophotometer module.
//!
//! ## Features
//!
//! - Read and write device parameters
//! - Measurement, baseline, levelling and selftest
//! - Firmware update from SREC files
//! - Raw command passthrough
//! - Shell completion generation
//! - Environment variable and config file support

use anyhow::Result;
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use colibri::{ErrorCode, SessionConfig};
use console::style;
use env_logger::Env;
use log::debug;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

/// Check if animations should be used (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(std::sync::atomic::Ordering::Relaxed) && console::colors_enabled_stderr()
}

mod commands;
mod config;

use commands::completions::cmd_completions;
use commands::device::{
    cmd_baseline, cmd_command, cmd_get, cmd_levelling, cmd_measure, cmd_selftest, cmd_set,
};
use commands::firmware::cmd_fwupdate;
use commands::info::{cmd_list_ports, cmd_params, cmd_version};
use config::Config;

/// colibri - Control the Colibri spectrophotometer module.
///
/// Environment variables:
///   COLIBRI_PORT           - Serial port (auto-detected if not set)
///   COLIBRI_USE_CHECKSUM   - Use checksummed frames (true/false)
///   COLIBRI_TIMEOUT        - Response deadline in seconds (0 waits forever)
#[derive(Parser)]
#[command(name = "colibri")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Serial port to use (auto-detected if not specified).
    #[arg(short, long, global = true, env = "COLIBRI_PORT")]
    port: Option<String>,

    /// Frame every command with a CRC-16 checksum (`--use-checksum=false` turns it off).
    #[arg(
        long,
        global = true,
        env = "COLIBRI_USE_CHECKSUM",
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    use_checksum: Option<bool>,

    /// Response deadline in seconds (0 waits forever).
    #[arg(long, global = true, value_name = "SECS", env = "COLIBRI_TIMEOUT")]
    timeout: Option<u64>,

    /// Verbose output level (-v echoes traffic, -vv adds timestamps).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get a value from the device.
    Get {
        /// Parameter index (see `colibri params`).
        index: String,
    },

    /// Set a value in the device.
    ///
    /// Changing a value can damage the device or lead to incorrect results.
    Set {
        /// Parameter index (see `colibri params`).
        index: String,
        /// New value.
        value: String,
    },

    /// Start a measurement and print the values in [uV].
    ///
    /// Output: SAMPLE_230 REFERENCE_230 SAMPLE_260 REFERENCE_260
    /// SAMPLE_280 REFERENCE_280 SAMPLE_340 REFERENCE_340
    Measure {
        /// Print a stored measurement instead (0 is the last one).
        last: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start a baseline measurement with an empty cuvette holder.
    Baseline {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Level LED currents and amplifications for a measurement.
    ///
    /// Output per wavelength: RESULT CURRENT SAMPLE_AMPLIFICATION REFERENCE_AMPLIFICATION
    Levelling {
        /// Pass 0 to print the last levelling without running a new one.
        last: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Execute the internal selftest.
    Selftest {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Load new firmware from an SREC file.
    Fwupdate {
        /// SREC firmware file.
        file: PathBuf,
    },

    /// Execute any command, e.g. `colibri command "V 0"`.
    Command {
        /// Raw command text.
        command: String,
    },

    /// List known parameter indices.
    Params {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List available serial ports.
    ListPorts {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the version of this tool and of the library.
    Version,

    /// Generate shell completion scripts.
    Completions {
        /// Shell type.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Errors raised by the command line layer itself.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// An argument that must be a number was not.
    #[error("'{0}' is not a valid number.")]
    InvalidNumber(String),

    /// Requested stored measurement is out of range.
    #[error("Invalid number of measurements: {0}")]
    NumberOfMeasurements(String),

    /// Arguments are syntactically fine but not usable.
    #[error("{0}")]
    Usage(String),
}

impl CliError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidNumber(_) => ErrorCode::InvalidNumber,
            Self::NumberOfMeasurements(_) => ErrorCode::NumberOfMeasurements,
            Self::Usage(_) => ErrorCode::UnknownCommandLineArgument,
        }
    }
}

/// Stable error code for any failure in the error chain.
fn error_code(err: &anyhow::Error) -> Option<ErrorCode> {
    err.chain().find_map(|cause| {
        cause
            .downcast_ref::<colibri::Error>()
            .map(colibri::Error::code)
            .or_else(|| cause.downcast_ref::<CliError>().map(CliError::code))
    })
}

/// Process exit status for an error code; codes beyond `u8` collapse to 1.
fn exit_status(code: Option<ErrorCode>) -> u8 {
    code.and_then(|c| u8::try_from(c.code()).ok())
        .filter(|&c| c != 0)
        .unwrap_or(1)
}

/// Error code for a command line that clap rejected.
fn parse_error_code(err: &clap::Error) -> ErrorCode {
    match err.kind() {
        ErrorKind::UnknownArgument => {
            let is_option = matches!(
                err.get(ContextKind::InvalidArg),
                Some(ContextValue::String(arg)) if arg.starts_with('-')
            );
            if is_option {
                ErrorCode::UnknownCommandLineOption
            } else {
                ErrorCode::UnknownCommandLineArgument
            }
        },
        ErrorKind::ValueValidation => ErrorCode::InvalidNumber,
        _ => ErrorCode::UnknownCommandLineArgument,
    }
}

fn main() -> ExitCode {
    // --- NO_COLOR and TTY detection ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, std::sync::atomic::Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp
                | ErrorKind::DisplayVersion
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => ExitCode::SUCCESS,
                _ => ExitCode::from(exit_status(Some(parse_error_code(&err)))),
            };
        },
    };

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "colibri v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = error_code(&err);
            let label = code.map_or_else(
                || "Colibri error:".to_string(),
                |c| format!("Colibri error ({}):", c.code()),
            );
            eprintln!("{} {err:#}", style(label).red().bold());
            ExitCode::from(exit_status(code))
        },
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    match &cli.command {
        Commands::Get { index } => cmd_get(cli, &config, index),
        Commands::Set { index, value } => cmd_set(cli, &config, index, value),
        Commands::Measure { last, json } => cmd_measure(cli, &config, last.as_deref(), *json),
        Commands::Baseline { json } => cmd_baseline(cli, &config, *json),
        Commands::Levelling { last, json } => {
            cmd_levelling(cli, &config, last.as_deref(), *json)
        },
        Commands::Selftest { json } => cmd_selftest(cli, &config, *json),
        Commands::Fwupdate { file } => cmd_fwupdate(cli, &config, file),
        Commands::Command { command } => cmd_command(cli, &config, command),
        Commands::Params { json } => cmd_params(*json),
        Commands::ListPorts { json } => cmd_list_ports(*json),
        Commands::Version => {
            cmd_version();
            Ok(())
        },
        Commands::Completions { shell } => {
            cmd_completions(*shell);
            Ok(())
        },
    }
}

/// Build the session options: flags and environment first, then config.
fn session_config(cli: &Cli, config: &Config) -> SessionConfig {
    let mut session = SessionConfig::new()
        .with_checksum(
            cli.use_checksum
                .or(config.connection.use_checksum)
                .unwrap_or(false),
        )
        .with_verbose(cli.verbose > 0);

    if let Some(port) = cli
        .port
        .as_ref()
        .or(config.connection.port.as_ref())
    {
        session = session.with_port(port.clone());
    }

    let timeout = cli
        .timeout
        .map(|secs| (secs > 0).then(|| Duration::from_secs(secs)))
        .or_else(|| config.response_timeout());
    if let Some(timeout) = timeout {
        session = session.with_response_timeout(timeout);
    }

    session
}
