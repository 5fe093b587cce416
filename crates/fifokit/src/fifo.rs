//! Named pipe (FIFO) helpers
//!
//! Thin wrappers over the filesystem side of a FIFO: making sure one
//! exists, inspecting it, and opening it for a single read or write.
//!
//! Opening a FIFO is itself a rendezvous: a plain open for reading blocks
//! until a writer shows up and vice versa. [`read_to_end`] and
//! [`write_all`] keep that behaviour. The background worker instead uses
//! [`open_reader`] and [`try_open_writer`], which never block on open.

use crate::error::{FifoError, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt, PermissionsExt};
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::time::Duration;

/// Outcome of [`ensure_fifo`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FifoStatus {
    /// A FIFO was already present at the path
    Exists,
    /// The FIFO was just created
    Created,
}

/// Create a FIFO at `path` unless one is already there.
///
/// Fails with [`FifoError::NotAFifo`] if some other kind of file occupies
/// the path.
pub fn ensure_fifo<P: AsRef<Path>>(path: P) -> Result<FifoStatus> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(FifoError::configuration("pipe path is empty"));
    }

    let mut c_path = path.as_os_str().as_bytes().to_vec();
    if c_path.contains(&0) {
        return Err(FifoError::configuration("pipe path contains a NUL byte"));
    }
    c_path.push(0);

    // rw-rw-rw-, narrowed by the process umask
    let ret = unsafe { libc::mkfifo(c_path.as_ptr().cast(), 0o666) };
    if ret == 0 {
        tracing::debug!(path = %path.display(), "created fifo");
        return Ok(FifoStatus::Created);
    }

    let err = io::Error::last_os_error();
    if err.kind() != io::ErrorKind::AlreadyExists {
        return Err(FifoError::from_open(err, path));
    }

    if is_fifo(path) {
        Ok(FifoStatus::Exists)
    } else {
        Err(FifoError::NotAFifo(path.display().to_string()))
    }
}

/// Check whether `path` names a FIFO.
pub fn is_fifo<P: AsRef<Path>>(path: P) -> bool {
    fs::metadata(path)
        .map(|meta| meta.file_type().is_fifo())
        .unwrap_or(false)
}

/// Filesystem facts about a pipe path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FifoInfo {
    /// The inspected path
    pub path: String,
    /// Whether anything exists at the path
    pub exists: bool,
    /// Whether the path is a FIFO
    pub is_fifo: bool,
    /// Permission bits, when the path exists
    pub permissions: Option<u32>,
}

impl FifoInfo {
    /// Inspect `path` without opening it.
    pub fn inspect<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::metadata(path) {
            Ok(meta) => Self {
                path: path.display().to_string(),
                exists: true,
                is_fifo: meta.file_type().is_fifo(),
                permissions: Some(meta.permissions().mode() & 0o7777),
            },
            Err(_) => Self {
                path: path.display().to_string(),
                exists: false,
                is_fifo: false,
                permissions: None,
            },
        }
    }
}

/// Open the pipe for reading and read until every writer has closed.
///
/// Blocks until a writer attaches.
pub fn read_to_end<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| FifoError::from_open(e, path))?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    Ok(data)
}

/// Open the pipe for writing, write all of `data`, then close it.
///
/// Blocks until a reader attaches, and for as long as the reader leaves
/// the pipe full. There is no timeout.
pub fn write_all<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| FifoError::from_open(e, path))?;
    file.write_all(data)?;
    file.flush()?;
    Ok(())
}

/// Open the read end without waiting for a writer.
///
/// The returned file is non-blocking; pair it with [`wait_readable`].
pub fn open_reader<P: AsRef<Path>>(path: P) -> Result<File> {
    let path = path.as_ref();
    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .map_err(|e| FifoError::from_open(e, path))
}

/// Open the write end if a reader is attached.
///
/// Returns `Ok(None)` when no reader is present. A returned file has been
/// switched back to blocking writes.
pub fn try_open_writer<P: AsRef<Path>>(path: P) -> Result<Option<File>> {
    match try_open_writer_nonblocking(path)? {
        Some(file) => {
            set_blocking(&file)?;
            Ok(Some(file))
        }
        None => Ok(None),
    }
}

/// Like [`try_open_writer`], but the returned file stays non-blocking.
///
/// Pair it with [`wait_writable`].
pub fn try_open_writer_nonblocking<P: AsRef<Path>>(path: P) -> Result<Option<File>> {
    let path = path.as_ref();
    match OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
    {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.raw_os_error() == Some(libc::ENXIO) => Ok(None),
        Err(e) => Err(FifoError::from_open(e, path)),
    }
}

fn set_blocking(file: &File) -> io::Result<()> {
    let fd = file.as_raw_fd();
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    let ret = unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// What [`wait_readable`] observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Data can be read
    Readable,
    /// The writer side went away
    Hangup,
    /// Nothing happened within the timeout
    Timeout,
}

/// Wait up to `timeout` for the read end to become readable.
pub fn wait_readable(file: &File, timeout: Duration) -> io::Result<Readiness> {
    let revents = poll_one(file, libc::POLLIN, timeout)?;
    if revents & libc::POLLIN != 0 {
        Ok(Readiness::Readable)
    } else if revents & (libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0 {
        Ok(Readiness::Hangup)
    } else {
        Ok(Readiness::Timeout)
    }
}

/// Wait up to `timeout` for room in the pipe.
///
/// Returns `true` when a write would make progress, including when the
/// reader has gone and the write will fail with `EPIPE`.
pub fn wait_writable(file: &File, timeout: Duration) -> io::Result<bool> {
    let revents = poll_one(file, libc::POLLOUT, timeout)?;
    Ok(revents & (libc::POLLOUT | libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0)
}

/// Poll a single descriptor. A timeout or signal reports no events.
fn poll_one(file: &File, events: libc::c_short, timeout: Duration) -> io::Result<libc::c_short> {
    let mut pfd = libc::pollfd {
        fd: file.as_raw_fd(),
        events,
        revents: 0,
    };
    let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

    let ret = unsafe { libc::poll(&mut pfd, 1, millis) };
    if ret < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(0);
        }
        return Err(err);
    }
    if ret == 0 {
        return Ok(0);
    }
    Ok(pfd.revents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_ensure_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.fifo");

        assert_eq!(ensure_fifo(&path).unwrap(), FifoStatus::Created);
        assert_eq!(ensure_fifo(&path).unwrap(), FifoStatus::Exists);
        assert!(is_fifo(&path));
    }

    #[test]
    fn test_ensure_fifo_rejects_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.txt");
        fs::write(&path, b"not a pipe").unwrap();

        let result = ensure_fifo(&path);
        assert!(matches!(result, Err(FifoError::NotAFifo(_))));
        assert!(!is_fifo(&path));
    }

    #[test]
    fn test_ensure_fifo_empty_path() {
        let result = ensure_fifo("");
        assert!(matches!(result, Err(FifoError::Configuration(_))));
    }

    #[test]
    fn test_inspect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("info.fifo");

        let info = FifoInfo::inspect(&path);
        assert!(!info.exists);
        assert_eq!(info.permissions, None);

        ensure_fifo(&path).unwrap();
        let info = FifoInfo::inspect(&path);
        assert!(info.exists);
        assert!(info.is_fifo);
        assert!(info.permissions.is_some());
    }

    #[test]
    fn test_try_open_writer_without_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lonely.fifo");
        ensure_fifo(&path).unwrap();

        assert!(try_open_writer(&path).unwrap().is_none());
    }

    #[test]
    fn test_open_missing_pipe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.fifo");

        assert!(matches!(open_reader(&path), Err(FifoError::NotFound(_))));
        assert!(matches!(read_to_end(&path), Err(FifoError::NotFound(_))));
    }

    #[test]
    fn test_blocking_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rt.fifo");
        ensure_fifo(&path).unwrap();

        let handle = thread::spawn({
            let path = path.clone();
            move || write_all(&path, b"Hello, FIFO!").unwrap()
        });

        let data = read_to_end(&path).unwrap();
        assert_eq!(data, b"Hello, FIFO!");

        handle.join().unwrap();
    }

    #[test]
    fn test_wait_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poll.fifo");
        ensure_fifo(&path).unwrap();

        let mut reader = open_reader(&path).unwrap();
        assert_eq!(
            wait_readable(&reader, Duration::from_millis(20)).unwrap(),
            Readiness::Timeout
        );

        let mut writer = try_open_writer(&path).unwrap().unwrap();
        writer.write_all(b"ping").unwrap();
        assert_eq!(
            wait_readable(&reader, Duration::from_secs(1)).unwrap(),
            Readiness::Readable
        );

        let mut buf = [0u8; 16];
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping");

        drop(writer);
        assert_eq!(
            wait_readable(&reader, Duration::from_secs(1)).unwrap(),
            Readiness::Hangup
        );
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_wait_writable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("full.fifo");
        ensure_fifo(&path).unwrap();

        let mut reader = open_reader(&path).unwrap();
        let mut writer = try_open_writer_nonblocking(&path).unwrap().unwrap();
        assert!(wait_writable(&writer, Duration::from_millis(20)).unwrap());

        // Fill the pipe until the kernel refuses more.
        let block = [0u8; 4096];
        loop {
            match writer.write(&block) {
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => panic!("unexpected write error: {}", e),
            }
        }
        assert!(!wait_writable(&writer, Duration::from_millis(20)).unwrap());

        let mut buf = vec![0u8; 65536];
        while reader.read(&mut buf).map(|n| n > 0).unwrap_or(false) {}
        assert!(wait_writable(&writer, Duration::from_secs(1)).unwrap());
    }
}
