//! Create command implementation

use super::{print_info, print_success};
use fifokit::{ensure_fifo, FifoStatus};
use std::path::Path;

pub fn create(path: &Path, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    if verbose {
        println!("Ensuring named pipe: {}", path.display());
    }

    match ensure_fifo(path)? {
        FifoStatus::Created => print_success(&format!("Created named pipe '{}'", path.display())),
        FifoStatus::Exists => print_info(&format!("Named pipe '{}' already exists", path.display())),
    }

    Ok(())
}
