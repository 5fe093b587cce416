//! # fifokit
//!
//! Managed named pipes (FIFOs) for Unix.
//!
//! ## Features
//!
//! - **Pipe Channel**: one FIFO path driven either synchronously or by a
//!   background worker that alternates between reading and writing
//! - **FIFO helpers**: create, inspect and do one-shot transfers on a FIFO
//! - **Graceful shutdown**: stop channels uniformly and wait for their workers
//!
//! Diagnostics go through [`tracing`]; install any subscriber to see them.
//!
//! ## Example
//!
//! ```rust,no_run
//! use fifokit::{ensure_fifo, FifoError, Mode, PipeChannel, Role};
//!
//! fn main() -> Result<(), FifoError> {
//!     ensure_fifo("/tmp/my_pipe")?;
//!
//!     // Background worker drains the pipe into the read buffer
//!     let channel = PipeChannel::new("/tmp/my_pipe", Mode::NonBlocking, Role::Reading)?;
//!
//!     // In another process: echo hi > /tmp/my_pipe
//!     if let Some(text) = channel.read_text()? {
//!         println!("{}", text);
//!     }
//!
//!     channel.stop();
//!     Ok(())
//! }
//! ```

#[cfg(not(unix))]
compile_error!("fifokit only supports Unix platforms");

pub mod channel;
pub mod config;
pub mod error;
pub mod fifo;
pub mod graceful;

// Re-exports
pub use channel::{ChannelStats, PipeChannel, PipeChannelBuilder};
pub use config::{ChannelConfig, Mode, Role, DEFAULT_IDLE_INTERVAL, DEFAULT_READ_CHUNK_SIZE};
pub use error::{FifoError, Result};
pub use fifo::{ensure_fifo, is_fifo, FifoInfo, FifoStatus};
pub use graceful::{shutdown_all, GracefulChannel};
