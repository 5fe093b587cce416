//! CLI command implementations

mod completions;
mod create;
mod info;
mod listen;
mod send;

pub use completions::completions;
pub use create::create;
pub use info::info;
pub use listen::listen;
pub use send::send;

use crate::config::Settings;
use crate::OutputFormat;
use console::{style, StyledObject, Term};
use fifokit::{ChannelConfig, Mode, Role};
use std::fmt::Write as _;
use std::io::Write;

fn status_line(term: Term, marker: StyledObject<&str>, msg: &str) {
    let _ = writeln!(&term, "{} {}", marker.bold(), msg);
}

pub fn print_success(msg: &str) {
    status_line(Term::stdout(), style("✓").green(), msg);
}

pub fn print_info(msg: &str) {
    status_line(Term::stdout(), style("ℹ").blue(), msg);
}

/// Warnings and errors go to stderr.
pub fn print_warning(msg: &str) {
    status_line(Term::stderr(), style("⚠").yellow(), msg);
}

pub fn print_error(msg: &str) {
    status_line(Term::stderr(), style("✗").red(), msg);
}

/// Channel configuration for one command, from the loaded settings
pub fn channel_config(settings: &Settings, blocking: bool, role: Role) -> ChannelConfig {
    let mut config = settings.channel.clone();
    config.mode = if blocking {
        Mode::Blocking
    } else {
        Mode::NonBlocking
    };
    config.initial_role = role;
    config
}

/// Render a chunk as `offset  hex bytes  |ascii|`, sixteen bytes per row.
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (row, line) in data.chunks(16).enumerate() {
        let _ = write!(out, "{:08x}  ", row * 16);
        for col in 0..16 {
            match line.get(col) {
                Some(byte) => {
                    let _ = write!(out, "{:02x} ", byte);
                }
                None => out.push_str("   "),
            }
            if col == 7 {
                out.push(' ');
            }
        }
        let ascii: String = line
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        let _ = writeln!(out, " |{}|", ascii);
    }
    out
}

/// Render one received chunk for `listen`.
///
/// JSON mode pretty-prints payloads that are already JSON and wraps
/// anything else in `{"data": ..., "length": ...}`.
pub fn format_output(data: &[u8], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => String::from_utf8_lossy(data).into_owned(),
        OutputFormat::Hex => hex_dump(data),
        OutputFormat::Json => serde_json::from_slice::<serde_json::Value>(data)
            .ok()
            .and_then(|value| serde_json::to_string_pretty(&value).ok())
            .unwrap_or_else(|| {
                serde_json::json!({
                    "data": String::from_utf8_lossy(data),
                    "length": data.len(),
                })
                .to_string()
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_dump() {
        let dump = hex_dump(b"hello");
        assert!(dump.starts_with("00000000  68 65 6c 6c 6f"));
        assert!(dump.ends_with("|hello|\n"));
        assert_eq!(hex_dump(&[0u8; 17]).lines().count(), 2);
    }

    #[test]
    fn test_format_output() {
        assert_eq!(format_output(b"plain", OutputFormat::Text), "plain");

        let wrapped = format_output(b"not json", OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&wrapped).unwrap();
        assert_eq!(value["data"], "not json");
        assert_eq!(value["length"], 8);

        let pretty = format_output(br#"{"a":1}"#, OutputFormat::Json);
        assert!(pretty.contains("\"a\": 1"));
    }

    #[test]
    fn test_channel_config() {
        let settings = Settings::default();
        let config = channel_config(&settings, true, Role::Writing);
        assert_eq!(config.mode, Mode::Blocking);
        assert_eq!(config.initial_role, Role::Writing);
        assert_eq!(config.name, "fifokit-cli");
    }
}
