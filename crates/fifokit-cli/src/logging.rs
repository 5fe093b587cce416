//! Diagnostics on stderr
//!
//! `FIFOKIT_LOG` takes `tracing` filter directives and overrides the
//! command-line level, e.g. `FIFOKIT_LOG=warn,fifokit::channel=debug`.

use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Environment variable holding filter directives
pub const LOG_ENV: &str = "FIFOKIT_LOG";

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Filter directives for `level`.
///
/// `verbose` raises everything under the `fifokit` target (pipe worker
/// events included) to debug without touching other targets.
pub fn directives(level: LogLevel, verbose: bool) -> String {
    let base = level.as_filter().to_string().to_lowercase();
    if verbose && level.as_filter() < LevelFilter::DEBUG {
        format!("{},fifokit=debug", base)
    } else {
        base
    }
}

pub fn init_logging(format: LogFormat, level: LogLevel, verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(directives(level, verbose)));

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(verbose)
        .with_thread_names(true);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives() {
        assert_eq!(directives(LogLevel::Warn, false), "warn");
        assert_eq!(directives(LogLevel::Warn, true), "warn,fifokit=debug");
        assert_eq!(directives(LogLevel::Error, true), "error,fifokit=debug");
        // Already at least as verbose as debug.
        assert_eq!(directives(LogLevel::Debug, true), "debug");
        assert_eq!(directives(LogLevel::Trace, true), "trace");
    }

    #[test]
    fn test_directives_parse() {
        for level in LogLevel::value_variants() {
            for verbose in [false, true] {
                assert!(EnvFilter::try_new(directives(*level, verbose)).is_ok());
            }
        }
    }
}
