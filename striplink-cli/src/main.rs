//! striplink CLI - command-line host for serial LED-strip controllers.
//!
//! ## Features
//!
//! - Receive frames on one or more ports and write them to a file
//! - Send a frame and wait for the checksum acknowledgement
//! - Query a controller's capabilities
//! - Serial port discovery
//! - Shell completion generation
//! - Environment variable and config file support

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use log::debug;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

mod commands;
mod config;
mod sink;

use config::Config;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Set by the Ctrl-C handler.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Check if animations should be used (TTY and colors enabled).
pub(crate) fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// Whether Ctrl-C was pressed.
pub(crate) fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

/// Errors that map to a specific exit code.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Bad arguments or missing input.
    #[error("{0}")]
    Usage(String),
    /// Interrupted by the user.
    #[error("Operation cancelled")]
    Cancelled,
    /// The peer never confirmed the frame.
    #[error("{0}")]
    SendFailed(String),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => 2,
            Self::Cancelled => 130,
            Self::SendFailed(_) => 1,
        }
    }
}

/// striplink - Host side of the line-framed LED-strip protocol.
///
/// Environment variables:
///   STRIPLINK_PORT     - Default serial port
///   STRIPLINK_BAUD     - Baud rate (default: 115200)
///   STRIPLINK_OUTPUT   - File receiving frames in `listen`
#[derive(Parser)]
#[command(name = "striplink")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// Serial port to use (auto-detected if not specified).
    #[arg(short, long, global = true, env = "STRIPLINK_PORT")]
    port: Option<String>,

    /// Baud rate.
    #[arg(short, long, global = true, env = "STRIPLINK_BAUD")]
    baud: Option<u32>,

    /// Verbose output level (-v, -vv for increasing detail).
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

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Receive frames and write each one to the output file.
    Listen {
        /// Ports to listen on (defaults to --port or auto-detection).
        ports: Vec<String>,

        /// File overwritten with every received frame (stdout if unset).
        #[arg(short, long, env = "STRIPLINK_OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Send one frame and wait for the acknowledgement.
    Send {
        /// Frame payload; newlines separate lines.
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        message: Option<String>,

        /// Read the payload from a file.
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Ask a controller to announce its capabilities.
    Probe {
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

    /// Generate shell completion scripts.
    Completions {
        /// Shell type.
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err
                .downcast_ref::<CliError>()
                .map_or(1, CliError::exit_code);
            if !matches!(err.downcast_ref::<CliError>(), Some(CliError::Cancelled)) {
                eprintln!("{} {err:#}", style("Error:").red().bold());
            }
            ExitCode::from(code)
        },
    }
}

fn run() -> Result<()> {
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        // Disable all color output
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();

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
        "striplink v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    install_interrupt_handler();

    // Load configuration
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    match &cli.command {
        Commands::Listen { ports, output } => {
            commands::listen::cmd_listen(&cli, &config, ports, output.as_deref())?;
        },
        Commands::Send { message, file } => {
            commands::send::cmd_send(&cli, &config, message.as_deref(), file.as_deref())?;
        },
        Commands::Probe { json } => {
            commands::probe::cmd_probe(&cli, &config, *json)?;
        },
        Commands::ListPorts { json } => {
            commands::ports::cmd_list_ports(*json);
        },
        Commands::Completions { shell } => {
            commands::completions::cmd_completions(*shell);
        },
    }

    Ok(())
}

/// First Ctrl-C asks running loops to stop; a second one exits right away.
fn install_interrupt_handler() {
    let result = ctrlc::set_handler(|| {
        if INTERRUPTED.swap(true, Ordering::Relaxed) {
            std::process::exit(130);
        }
    });
    if let Err(e) = result {
        debug!("Cannot install Ctrl-C handler: {e}");
    }
    striplink::set_interrupt_checker(was_interrupted);
}

/// Resolve the port: flag or env, then config file, then auto-detection.
pub(crate) fn get_port(cli: &Cli, config: &Config) -> Result<String> {
    if let Some(port) = cli
        .port
        .as_ref()
        .or(config
            .connection
            .port
            .as_ref())
    {
        return Ok(port.clone());
    }

    match striplink::auto_detect_port() {
        Ok(port) => {
            if !cli.quiet {
                eprintln!(
                    "{} Using {} [{}]",
                    style("→").green().bold(),
                    style(&port.name).cyan(),
                    port.device.name()
                );
            }
            Ok(port.name)
        },
        Err(striplink::Error::PortNotFound) => Err(CliError::Usage(
            "No serial port found; pass --port or set STRIPLINK_PORT".to_string(),
        )
        .into()),
        Err(e) => Err(e.into()),
    }
}

/// Serial settings for a port, honouring --baud and the config file.
pub(crate) fn serial_config(cli: &Cli, config: &Config, port: &str) -> striplink::SerialConfig {
    let mut serial = striplink::SerialConfig::new(port);
    if let Some(baud) = cli.baud.or(config.connection.baud) {
        serial = serial.with_baud_rate(baud);
    }
    serial
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Usage(String::new()).exit_code(), 2);
        assert_eq!(CliError::Cancelled.exit_code(), 130);
        assert_eq!(CliError::SendFailed(String::new()).exit_code(), 1);
    }

    #[test]
    fn test_send_requires_message_or_file() {
        assert!(Cli::try_parse_from(["striplink", "send"]).is_err());
        assert!(Cli::try_parse_from(["striplink", "send", "A", "--file", "x"]).is_err());
        assert!(Cli::try_parse_from(["striplink", "send", "--file", "x"]).is_ok());
    }

    #[test]
    fn test_listen_accepts_several_ports() {
        let cli = Cli::try_parse_from([
            "striplink",
            "listen",
            "/dev/ttyUSB0",
            "/dev/ttyUSB1",
            "--output",
            "frame.txt",
        ])
        .unwrap();
        match cli.command {
            Commands::Listen { ports, output } => {
                assert_eq!(ports, vec!["/dev/ttyUSB0", "/dev/ttyUSB1"]);
                assert_eq!(output, Some(PathBuf::from("frame.txt")));
            },
            _ => panic!("expected listen"),
        }
    }

    #[test]
    fn test_port_from_config_when_flag_absent() {
        let cli = Cli::try_parse_from(["striplink", "probe"]).unwrap();
        let mut config = Config::default();
        config.connection.port = Some("/dev/ttyACM0".to_string());
        config.connection.baud = Some(57600);
        if cli.port.is_none() {
            assert_eq!(get_port(&cli, &config).unwrap(), "/dev/ttyACM0");
        }
        if cli.baud.is_none() {
            assert_eq!(serial_config(&cli, &config, "/dev/ttyACM0").baud_rate, 57600);
        }
    }
}
