//! Listen command implementation

use super::{channel_config, format_output, print_info, print_warning};
use crate::config::Settings;
use crate::OutputFormat;
use fifokit::{PipeChannel, Role};
use std::path::Path;
use std::time::{Duration, Instant};

pub fn listen(
    path: &Path,
    settings: &Settings,
    format: OutputFormat,
    blocking: bool,
    timeout_ms: u64,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = channel_config(settings, blocking, Role::Reading);
    let poll_interval = config.idle_interval;
    let channel = PipeChannel::with_config(path, config)?;

    print_info(&format!("Listening on '{}'...", path.display()));
    if verbose {
        println!("{}", channel);
    }

    let deadline = (timeout_ms > 0).then(|| Instant::now() + Duration::from_millis(timeout_ms));
    if blocking && deadline.is_some() {
        print_warning("Timeout is only checked between writers in blocking mode");
    }

    loop {
        if let Some(data) = channel.read()? {
            println!("{}", format_output(&data, format));
        }

        if let Some(err) = channel.take_last_error() {
            print_warning(&format!("Read error: {}", err));
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }

        if !blocking {
            std::thread::sleep(poll_interval);
        }
    }

    channel.stop_timeout(poll_interval * 4)?;

    // Anything that arrived between the last poll and the stop
    if let Some(data) = channel.read()? {
        println!("{}", format_output(&data, format));
    }

    print_info("Listener stopped");
    Ok(())
}
