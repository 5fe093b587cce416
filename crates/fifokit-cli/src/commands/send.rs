//! Send command implementation

use super::{channel_config, print_success, print_warning};
use crate::config::Settings;
use fifokit::{FifoError, PipeChannel, Role};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub fn send(
    path: &Path,
    settings: &Settings,
    message: &str,
    file: Option<PathBuf>,
    blocking: bool,
    timeout_ms: u64,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Get message data
    let data = if let Some(file) = file {
        if verbose {
            println!("Reading message from file: {:?}", file);
        }
        fs::read(&file)?
    } else if message == "-" {
        if verbose {
            println!("Reading message from stdin...");
        }
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer)?;
        buffer
    } else {
        message.as_bytes().to_vec()
    };

    if verbose {
        println!("Sending {} bytes to '{}'", data.len(), path.display());
    }

    let config = channel_config(settings, blocking, Role::Writing);
    let channel = PipeChannel::with_config(path, config)?;

    if blocking {
        if timeout_ms > 0 {
            print_warning("Timeout is ignored in blocking mode");
        }
        channel.write(&data)?;
    } else {
        channel.write(&data)?;
        wait_for_reader(&channel, timeout_ms)?;
        if let Some(err) = channel.take_last_error() {
            return Err(err.into());
        }
        channel.stop_timeout(Duration::from_secs(1))?;
    }

    print_success(&format!(
        "Sent {} bytes to pipe '{}'",
        data.len(),
        path.display()
    ));
    Ok(())
}

fn wait_for_reader(channel: &PipeChannel, timeout_ms: u64) -> Result<(), FifoError> {
    if timeout_ms > 0 {
        return channel.wait_flushed(Duration::from_millis(timeout_ms));
    }

    loop {
        match channel.wait_flushed(Duration::from_secs(60)) {
            Err(FifoError::Timeout) => continue,
            other => return other,
        }
    }
}
