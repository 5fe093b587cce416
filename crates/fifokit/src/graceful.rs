//! Graceful shutdown for pipe channels
//!
//! Hosts that own several channels can stop them through one trait
//! without caring which mode each runs in.
//!
//! # Example
//!
//! ```rust,no_run
//! use fifokit::{GracefulChannel, PipeChannel};
//! use std::time::Duration;
//!
//! fn main() -> fifokit::Result<()> {
//!     let channel = PipeChannel::builder("/tmp/my_pipe").spawn()?;
//!
//!     // ... use the channel ...
//!
//!     channel.shutdown_timeout(Duration::from_secs(1))?;
//!     Ok(())
//! }
//! ```

use crate::error::Result;
use std::time::Duration;

/// Trait for channels that support graceful shutdown
pub trait GracefulChannel {
    /// Signal the channel to shutdown
    ///
    /// After calling this method:
    /// - No new pipe I/O is started
    /// - Writes are no longer accepted
    /// - `is_shutdown()` will return `true`
    fn shutdown(&self);

    /// Check if the channel has been signaled to shutdown
    fn is_shutdown(&self) -> bool;

    /// Shutdown and wait for background work to finish
    ///
    /// Returns `FifoError::Timeout` if it doesn't finish within the timeout.
    fn shutdown_timeout(&self, timeout: Duration) -> Result<()>;
}

/// Shut down every channel, then wait for each in turn.
///
/// All channels are signaled before any wait starts, so one slow worker
/// does not delay the others from stopping. Returns the first failure.
pub fn shutdown_all<C: GracefulChannel>(channels: &[C], timeout: Duration) -> Result<()> {
    for channel in channels {
        channel.shutdown();
    }

    let mut first_err = None;
    for channel in channels {
        if let Err(err) = channel.shutdown_timeout(timeout) {
            if first_err.is_none() {
                first_err = Some(err);
            }
        }
    }

    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FifoError;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Flag {
        down: AtomicBool,
        stuck: bool,
    }

    impl Flag {
        fn new(stuck: bool) -> Self {
            Self {
                down: AtomicBool::new(false),
                stuck,
            }
        }
    }

    impl GracefulChannel for Flag {
        fn shutdown(&self) {
            self.down.store(true, Ordering::SeqCst);
        }

        fn is_shutdown(&self) -> bool {
            self.down.load(Ordering::SeqCst)
        }

        fn shutdown_timeout(&self, _timeout: Duration) -> Result<()> {
            self.shutdown();
            if self.stuck {
                Err(FifoError::Timeout)
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_shutdown_all() {
        let channels = [Flag::new(false), Flag::new(false)];
        shutdown_all(&channels, Duration::from_millis(10)).unwrap();
        assert!(channels.iter().all(|c| c.is_shutdown()));
    }

    #[test]
    fn test_shutdown_all_reports_failure() {
        let channels = [Flag::new(true), Flag::new(false)];
        let result = shutdown_all(&channels, Duration::from_millis(10));

        assert!(matches!(result, Err(FifoError::Timeout)));
        assert!(channels.iter().all(|c| c.is_shutdown()));
    }
}
