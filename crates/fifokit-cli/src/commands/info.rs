//! Info command implementation

use crate::OutputFormat;
use console::style;
use fifokit::FifoInfo;
use std::path::Path;

pub fn info(
    path: &Path,
    format: OutputFormat,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let info = FifoInfo::inspect(path);

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!();
    println!("{}", style("Pipe Information").bold().underlined());
    println!();
    println!("  Path:   {}", info.path);

    if !info.exists {
        println!("  Status: {}", style("Does not exist").red());
    } else if info.is_fifo {
        println!("  Status: {}", style("Named pipe").green());
    } else {
        println!("  Status: {}", style("Not a named pipe").yellow());
    }

    if let Some(mode) = info.permissions {
        println!("  Mode:   {:04o}", mode);
    }

    if verbose && info.is_fifo {
        println!(
            "  Note:   opening blocks until the other end attaches; use `fifokit listen` to drain it"
        );
    }

    println!();

    Ok(())
}
