//! # fifokit CLI
//!
//! A command-line interface for creating, watching and writing to named pipes.
//!
//! ## Usage
//!
//! ```bash
//! # Make sure a FIFO exists
//! fifokit create --path /tmp/bridge.fifo
//!
//! # Print everything written to it
//! fifokit listen --path /tmp/bridge.fifo
//!
//! # Write a message
//! fifokit send --path /tmp/bridge.fifo "Hello, World!"
//!
//! # Inspect it
//! fifokit info --path /tmp/bridge.fifo --format json
//! ```

mod commands;
mod config;
mod logging;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use logging::{LogFormat, LogLevel};
use std::path::PathBuf;

/// Named pipe toolkit
#[derive(Parser)]
#[command(name = "fifokit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "FIFOKIT_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output (debug logging for fifokit targets)
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Log level for diagnostics on stderr
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a named pipe if it does not exist
    Create {
        /// Pipe path
        #[arg(short, long)]
        path: PathBuf,
    },

    /// Read from a pipe and print what arrives
    Listen {
        /// Pipe path
        #[arg(short, long)]
        path: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Read on this thread instead of a background worker
        #[arg(long)]
        blocking: bool,

        /// Stop after this many milliseconds (0 = no timeout)
        #[arg(long, default_value = "0")]
        timeout: u64,
    },

    /// Write a message to a pipe
    Send {
        /// Pipe path
        #[arg(short, long)]
        path: PathBuf,

        /// Message to send (use '-' for stdin)
        #[arg(default_value = "-")]
        message: String,

        /// Read message from file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Write on this thread instead of a background worker
        #[arg(long)]
        blocking: bool,

        /// Give up waiting for a reader after this many milliseconds (0 = wait forever)
        #[arg(long, default_value = "0")]
        timeout: u64,
    },

    /// Show pipe information
    Info {
        /// Pipe path
        #[arg(short, long)]
        path: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON
    Json,
    /// Hex dump
    Hex,
}

fn main() {
    let cli = Cli::parse();

    logging::init_logging(cli.log_format, cli.log_level, cli.verbose);

    if let Err(e) = run(cli) {
        commands::print_error(&format!("Error: {}", e));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Create { path } => commands::create(&path, cli.verbose),

        Commands::Listen {
            path,
            format,
            blocking,
            timeout,
        } => commands::listen(
            &path,
            &settings,
            format,
            blocking,
            timeout,
            cli.verbose,
        ),

        Commands::Send {
            path,
            message,
            file,
            blocking,
            timeout,
        } => commands::send(
            &path,
            &settings,
            &message,
            file,
            blocking,
            timeout,
            cli.verbose,
        ),

        Commands::Info { path, format } => commands::info(&path, format, cli.verbose),

        Commands::Completions { shell } => {
            commands::completions(shell);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_listen() {
        let cli = Cli::parse_from([
            "fifokit", "listen", "--path", "/tmp/x.fifo", "--format", "hex", "--blocking",
        ]);
        match cli.command {
            Commands::Listen {
                path,
                format,
                blocking,
                timeout,
            } => {
                assert_eq!(path, PathBuf::from("/tmp/x.fifo"));
                assert_eq!(format, OutputFormat::Hex);
                assert!(blocking);
                assert_eq!(timeout, 0);
            }
            _ => panic!("expected listen"),
        }
    }

    #[test]
    fn test_parse_send_defaults_to_stdin() {
        let cli = Cli::parse_from(["fifokit", "-v", "send", "-p", "/tmp/x.fifo"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Send { message, file, .. } => {
                assert_eq!(message, "-");
                assert!(file.is_none());
            }
            _ => panic!("expected send"),
        }
    }
}
