//! Error types for fifokit

use std::io;
use std::path::Path;
use thiserror::Error;

/// Result type alias for fifokit operations
pub type Result<T> = std::result::Result<T, FifoError>;

/// FIFO channel error types
#[derive(Error, Debug)]
pub enum FifoError {
    /// I/O error from the underlying system
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The channel was constructed or reconfigured with invalid settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The pipe path does not exist
    #[error("Pipe not found: {0}")]
    NotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Something other than a FIFO occupies the path
    #[error("Not a FIFO: {0}")]
    NotAFifo(String),

    /// The channel has been stopped
    #[error("Channel closed")]
    Closed,

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Timeout occurred
    #[error("Operation timed out")]
    Timeout,

    /// Would block (for non-blocking operations)
    #[error("Operation would block")]
    WouldBlock,
}

impl FifoError {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Map an error raised while opening `path` onto the matching variant.
    pub fn from_open(err: io::Error, path: &Path) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.display().to_string()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.display().to_string()),
            _ => Self::Io(err),
        }
    }

    /// Check if this is a "would block" error
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::WouldBlock)
            || matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::WouldBlock)
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
            || matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::TimedOut)
    }

    /// Check if this error came from the operating system
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::NotFound(_) | Self::PermissionDenied(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_open_maps_kinds() {
        let path = Path::new("/tmp/missing.fifo");

        let err = FifoError::from_open(io::Error::from(io::ErrorKind::NotFound), path);
        assert!(matches!(err, FifoError::NotFound(ref p) if p == "/tmp/missing.fifo"));

        let err = FifoError::from_open(io::Error::from(io::ErrorKind::PermissionDenied), path);
        assert!(matches!(err, FifoError::PermissionDenied(_)));

        let err = FifoError::from_open(io::Error::from(io::ErrorKind::BrokenPipe), path);
        assert!(matches!(err, FifoError::Io(_)));
        assert!(err.is_io());
    }

    #[test]
    fn test_would_block_and_timeout() {
        assert!(FifoError::WouldBlock.is_would_block());
        assert!(FifoError::Io(io::Error::from(io::ErrorKind::WouldBlock)).is_would_block());
        assert!(FifoError::Timeout.is_timeout());
        assert!(!FifoError::Closed.is_timeout());
        assert!(!FifoError::configuration("empty path").is_io());
    }
}
