//! Example: alternating a channel between writing and reading
//!
//! Run with: cargo run -p fifokit --example pipe_example

use fifokit::{ensure_fifo, fifo, Mode, PipeChannel, Result, Role};
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    let path = std::env::temp_dir().join(format!("example_fifo_{}", std::process::id()));
    ensure_fifo(&path)?;

    let channel = PipeChannel::builder(&path)
        .name("example")
        .mode(Mode::NonBlocking)
        .role(Role::Writing)
        .idle_interval(Duration::from_millis(50))
        .spawn()?;
    println!("{}", channel);

    // Peer: read one message, then answer
    let peer = thread::spawn({
        let path = path.clone();
        move || -> Result<()> {
            let request = fifo::read_to_end(&path)?;
            println!("[Peer] Received: {}", String::from_utf8_lossy(&request));
            fifo::write_all(&path, b"Hello from peer!")?;
            Ok(())
        }
    });

    channel.write("Hello from channel!")?;
    channel.wait_flushed(Duration::from_secs(5))?;
    println!("[Channel] Sent");

    channel.switch_role(Role::Reading)?;
    peer.join().expect("peer thread panicked")?;

    loop {
        if let Some(reply) = channel.read_text()? {
            println!("[Channel] Received: {}", reply);
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }

    channel.stop_timeout(Duration::from_secs(1))?;
    std::fs::remove_file(&path)?;
    println!("\nDone!");

    Ok(())
}
