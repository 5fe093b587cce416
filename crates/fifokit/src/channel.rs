//! Managed pipe channel
//!
//! A [`PipeChannel`] owns one named pipe path and lets a process alternate
//! between reading and writing it.
//!
//! - In [`Mode::Blocking`] every [`read`](PipeChannel::read) and
//!   [`write`](PipeChannel::write) opens the pipe on the caller's thread and
//!   returns once the transfer is complete.
//! - In [`Mode::NonBlocking`] a background worker services the pipe
//!   according to the current [`Role`], and callers only touch the read
//!   and write buffers.
//!
//! # Example
//!
//! ```rust,no_run
//! use fifokit::{ensure_fifo, PipeChannel, Role};
//! use std::time::Duration;
//!
//! fn main() -> fifokit::Result<()> {
//!     ensure_fifo("/tmp/bridge.fifo")?;
//!
//!     let channel = PipeChannel::builder("/tmp/bridge.fifo")
//!         .name("bridge")
//!         .role(Role::Writing)
//!         .spawn()?;
//!
//!     channel.write("hello")?;
//!     channel.wait_flushed(Duration::from_secs(5))?;
//!
//!     channel.switch_role(Role::Reading)?;
//!     if let Some(reply) = channel.read()? {
//!         println!("{}", String::from_utf8_lossy(&reply));
//!     }
//!
//!     channel.stop();
//!     Ok(())
//! }
//! ```

use crate::config::{ChannelConfig, Mode, Role};
use crate::error::{FifoError, Result};
use crate::fifo::{self, Readiness};
use crate::graceful::GracefulChannel;
use bytes::{Bytes, BytesMut};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn};

/// Counters describing what a channel has moved so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStats {
    /// Bytes read from the pipe
    pub bytes_read: u64,
    /// Bytes written to the pipe
    pub bytes_written: u64,
    /// Completed read sessions (a writer attached and then closed)
    pub read_turns: u64,
    /// Completed flushes of the write buffer
    pub write_turns: u64,
}

#[derive(Debug, Default)]
struct Counters {
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    read_turns: AtomicU64,
    write_turns: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> ChannelStats {
        ChannelStats {
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            read_turns: self.read_turns.load(Ordering::Relaxed),
            write_turns: self.write_turns.load(Ordering::Relaxed),
        }
    }
}

/// Bytes staged for the pipe, plus the slice the worker is writing now.
#[derive(Debug, Default)]
struct WriteState {
    pending: BytesMut,
    in_flight: usize,
}

impl WriteState {
    fn is_drained(&self) -> bool {
        self.pending.is_empty() && self.in_flight == 0
    }
}

/// State shared between the channel handle and its worker.
struct Shared {
    name: RwLock<String>,
    path: RwLock<PathBuf>,
    role: Mutex<Role>,
    role_changed: Condvar,
    read_buffer: Mutex<BytesMut>,
    write_state: Mutex<WriteState>,
    data_ready: Condvar,
    flushed: Condvar,
    last_error: Mutex<Option<FifoError>>,
    /// Held by the worker around every pipe syscall. Taken by `stop` after
    /// the role is set, so no syscall begins once `stop` has returned.
    io_gate: Mutex<()>,
    counters: Counters,
    idle_interval: Duration,
    read_chunk_size: usize,
}

impl Shared {
    fn role(&self) -> Role {
        *self.role.lock()
    }

    fn name(&self) -> String {
        self.name.read().clone()
    }

    fn path(&self) -> PathBuf {
        self.path.read().clone()
    }

    fn record_error(&self, err: FifoError) {
        *self.last_error.lock() = Some(err);
    }

    /// Sleep for one idle interval, waking early on a role change.
    fn idle_wait(&self) {
        let mut role = self.role.lock();
        if role.is_stopped() {
            return;
        }
        self.role_changed.wait_for(&mut role, self.idle_interval);
    }

    fn wake_all(&self) {
        self.role_changed.notify_all();
        // Taking the lock orders the notify after any check-then-wait
        // in progress on the write side.
        let _write = self.write_state.lock();
        self.data_ready.notify_all();
        self.flushed.notify_all();
    }

    fn run(self: Arc<Self>, exited: Sender<()>) {
        let span = info_span!("fifo_worker", channel = %self.name());
        let _enter = span.enter();
        info!("worker started");

        let mut duty = Role::Idle;
        loop {
            let role = self.role();
            if role != duty {
                match duty {
                    Role::Reading => info!("stopped reading"),
                    Role::Writing => info!("stopped writing"),
                    _ => {}
                }
                match role {
                    Role::Reading => info!(path = %self.path().display(), "started reading"),
                    Role::Writing => info!(path = %self.path().display(), "started writing"),
                    _ => {}
                }
                duty = role;
            }

            let outcome = match role {
                Role::Reading => self.read_turn(),
                Role::Writing => self.write_turn(),
                Role::Idle => {
                    self.idle_wait();
                    Ok(())
                }
                Role::Stopped => break,
            };

            if let Err(err) = outcome {
                warn!(error = %err, "pipe {} failed", role);
                self.record_error(err);
                self.idle_wait();
            }
        }

        info!("worker exited");
        let _ = exited.send(());
    }

    /// Read one writer session into the read buffer.
    ///
    /// Before any writer shows up the turn gives way to a role change.
    /// Once bytes have arrived it drains to end-of-stream, and only
    /// `Stopped` cuts it short.
    fn read_turn(&self) -> Result<()> {
        let path = self.path();
        let mut file = fifo::open_reader(&path)?;
        let mut chunk = vec![0u8; self.read_chunk_size];
        let mut attached = false;

        loop {
            let role = self.role();
            if role.is_stopped() || (!attached && role != Role::Reading) {
                return Ok(());
            }

            match fifo::wait_readable(&file, self.idle_interval)? {
                Readiness::Timeout => continue,
                Readiness::Readable | Readiness::Hangup => {}
            }

            let _gate = self.io_gate.lock();
            if self.role().is_stopped() {
                return Ok(());
            }
            match file.read(&mut chunk) {
                Ok(0) => {
                    if attached {
                        self.counters.read_turns.fetch_add(1, Ordering::Relaxed);
                        debug!("writer closed the pipe");
                    }
                    return Ok(());
                }
                Ok(n) => {
                    attached = true;
                    self.read_buffer.lock().extend_from_slice(&chunk[..n]);
                    self.counters
                        .bytes_read
                        .fetch_add(n as u64, Ordering::Relaxed);
                    debug!(bytes = n, "read from pipe");
                }
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(FifoError::Io(e)),
            }
        }
    }

    /// Flush everything staged so far, once a reader is attached.
    ///
    /// Staged bytes stay in the buffer until the pipe is open, so a role
    /// change or stop before that point loses nothing.
    fn write_turn(&self) -> Result<()> {
        {
            let mut state = self.write_state.lock();
            while state.pending.is_empty() {
                if self.role() != Role::Writing {
                    return Ok(());
                }
                self.data_ready.wait_for(&mut state, self.idle_interval);
            }
        }

        let path = self.path();
        let mut file = loop {
            if self.role() != Role::Writing {
                return Ok(());
            }
            match fifo::try_open_writer_nonblocking(&path)? {
                Some(file) => break file,
                None => self.idle_wait(),
            }
        };

        let payload = {
            let mut state = self.write_state.lock();
            if self.role().is_stopped() {
                return Ok(());
            }
            let payload = state.pending.split().freeze();
            state.in_flight = payload.len();
            payload
        };

        let result = self.write_payload(&mut file, &payload);
        drop(file);

        {
            let mut state = self.write_state.lock();
            state.in_flight = 0;
            self.flushed.notify_all();
        }

        result
    }

    /// Write `payload` one syscall at a time, giving up on stop.
    ///
    /// Bytes not yet written when the channel stops are dropped.
    fn write_payload(&self, file: &mut File, payload: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < payload.len() {
            {
                let _gate = self.io_gate.lock();
                if self.role().is_stopped() {
                    debug!(
                        dropped = payload.len() - written,
                        "stopped during flush"
                    );
                    return Ok(());
                }
                match file.write(&payload[written..]) {
                    Ok(0) => return Err(FifoError::Io(io::ErrorKind::WriteZero.into())),
                    Ok(n) => {
                        written += n;
                        self.counters
                            .bytes_written
                            .fetch_add(n as u64, Ordering::Relaxed);
                        continue;
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(e) => return Err(FifoError::Io(e)),
                }
            }
            fifo::wait_writable(file, self.idle_interval)?;
        }

        self.counters.write_turns.fetch_add(1, Ordering::Relaxed);
        debug!(bytes = payload.len(), "flushed to pipe");
        Ok(())
    }
}

struct Worker {
    handle: JoinHandle<()>,
    exited: Receiver<()>,
}

/// A named pipe managed in blocking or background-worker mode.
///
/// Dropping the channel stops its worker without waiting for it.
pub struct PipeChannel {
    shared: Arc<Shared>,
    mode: Mode,
    worker: Mutex<Option<Worker>>,
}

impl PipeChannel {
    /// Create a channel with the given mode and starting role.
    ///
    /// In non-blocking mode this spawns the worker right away.
    pub fn new<P: AsRef<Path>>(path: P, mode: Mode, initial_role: Role) -> Result<Self> {
        Self::builder(path).mode(mode).role(initial_role).spawn()
    }

    /// Create a channel from a full configuration.
    pub fn with_config<P: AsRef<Path>>(path: P, config: ChannelConfig) -> Result<Self> {
        Self::builder(path).config(config).spawn()
    }

    /// Start building a channel for `path`.
    pub fn builder<P: AsRef<Path>>(path: P) -> PipeChannelBuilder {
        PipeChannelBuilder::new(path)
    }

    fn spawn(path: PathBuf, config: ChannelConfig) -> Result<Self> {
        check_path(&path)?;
        config.validate()?;

        let shared = Arc::new(Shared {
            name: RwLock::new(config.name.clone()),
            path: RwLock::new(path),
            role: Mutex::new(config.initial_role),
            role_changed: Condvar::new(),
            read_buffer: Mutex::new(BytesMut::new()),
            write_state: Mutex::new(WriteState::default()),
            data_ready: Condvar::new(),
            flushed: Condvar::new(),
            last_error: Mutex::new(None),
            io_gate: Mutex::new(()),
            counters: Counters::default(),
            idle_interval: config.idle_interval,
            read_chunk_size: config.read_chunk_size,
        });

        let worker = if config.mode.is_non_blocking() {
            let (tx, rx) = crossbeam_channel::bounded(1);
            let handle = thread::Builder::new()
                .name(format!("{}-worker", config.name))
                .spawn({
                    let shared = Arc::clone(&shared);
                    move || shared.run(tx)
                })?;
            Some(Worker {
                handle,
                exited: rx,
            })
        } else {
            None
        };

        Ok(Self {
            shared,
            mode: config.mode,
            worker: Mutex::new(worker),
        })
    }

    /// Get the diagnostic name
    pub fn name(&self) -> String {
        self.shared.name()
    }

    /// Set the diagnostic name
    pub fn set_name(&self, name: &str) {
        *self.shared.name.write() = name.to_string();
    }

    /// Get the pipe path
    pub fn path(&self) -> PathBuf {
        self.shared.path()
    }

    /// Point the channel at another pipe.
    ///
    /// The worker picks the new path up at its next turn.
    pub fn set_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        check_path(path)?;
        *self.shared.path.write() = path.to_path_buf();
        Ok(())
    }

    /// Get the concurrency mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Get the current role
    pub fn role(&self) -> Role {
        self.shared.role()
    }

    /// Check if the channel has been stopped
    pub fn is_stopped(&self) -> bool {
        self.role().is_stopped()
    }

    /// Read whatever the pipe has produced.
    ///
    /// - Blocking mode: opens the pipe, waits for a writer and reads until
    ///   it closes. Fails with [`FifoError::Closed`] once stopped.
    /// - Non-blocking mode: takes the read buffer, leaving it empty. Never
    ///   touches the pipe, and still drains leftovers after a stop.
    ///
    /// Returns `None` when there is nothing to deliver.
    pub fn read(&self) -> Result<Option<Bytes>> {
        match self.mode {
            Mode::Blocking => {
                if self.is_stopped() {
                    return Err(FifoError::Closed);
                }
                let data = fifo::read_to_end(self.path())?;
                self.shared
                    .counters
                    .bytes_read
                    .fetch_add(data.len() as u64, Ordering::Relaxed);
                if data.is_empty() {
                    return Ok(None);
                }
                self.shared
                    .counters
                    .read_turns
                    .fetch_add(1, Ordering::Relaxed);
                Ok(Some(Bytes::from(data)))
            }
            Mode::NonBlocking => {
                let mut buffer = self.shared.read_buffer.lock();
                if buffer.is_empty() {
                    return Ok(None);
                }
                Ok(Some(buffer.split().freeze()))
            }
        }
    }

    /// [`read`](Self::read), decoded as UTF-8 with invalid sequences replaced.
    pub fn read_text(&self) -> Result<Option<String>> {
        Ok(self
            .read()?
            .map(|data| String::from_utf8_lossy(&data).into_owned()))
    }

    /// Send `payload` to the pipe.
    ///
    /// - Blocking mode: opens the pipe, writes everything and closes it.
    ///   This waits for a reader to attach, indefinitely.
    /// - Non-blocking mode: appends to the write buffer for the worker to
    ///   flush on its next writing turn. `true` means accepted, not
    ///   delivered; use [`wait_flushed`](Self::wait_flushed) for the latter.
    ///
    /// Returns `false` once the channel is stopped. An empty payload is
    /// accepted and changes nothing.
    pub fn write<B: AsRef<[u8]>>(&self, payload: B) -> Result<bool> {
        let payload = payload.as_ref();
        if self.is_stopped() {
            return Ok(false);
        }
        if payload.is_empty() {
            return Ok(true);
        }

        match self.mode {
            Mode::Blocking => {
                fifo::write_all(self.path(), payload)?;
                self.shared
                    .counters
                    .bytes_written
                    .fetch_add(payload.len() as u64, Ordering::Relaxed);
                self.shared
                    .counters
                    .write_turns
                    .fetch_add(1, Ordering::Relaxed);
            }
            Mode::NonBlocking => {
                let mut state = self.shared.write_state.lock();
                state.pending.extend_from_slice(payload);
                self.shared.data_ready.notify_all();
            }
        }
        Ok(true)
    }

    /// Change the worker's duty.
    ///
    /// The switch is honoured once the worker's current operation is done:
    /// a read with an attached writer drains to end-of-stream first.
    /// Switching to [`Role::Stopped`] is the same as [`stop`](Self::stop).
    /// In blocking mode the role is only recorded.
    pub fn switch_role(&self, role: Role) -> Result<()> {
        if role.is_stopped() {
            self.stop();
            return Ok(());
        }

        {
            let mut current = self.shared.role.lock();
            if current.is_stopped() {
                return Err(FifoError::Closed);
            }
            if *current == role {
                return Ok(());
            }
            let from = *current;
            *current = role;
            debug!(channel = %self.name(), from = %from, to = %role, "switching role");
        }
        self.shared.wake_all();
        Ok(())
    }

    /// Stop the channel. No pipe I/O starts after this returns.
    ///
    /// The worker exits at its next scheduling point; this does not wait
    /// for it. Stopping twice is a no-op.
    pub fn stop(&self) {
        {
            let mut role = self.shared.role.lock();
            if role.is_stopped() {
                return;
            }
            *role = Role::Stopped;
        }
        info!(channel = %self.name(), "stopping channel");
        self.shared.wake_all();
        // Wait out a syscall already under way.
        drop(self.shared.io_gate.lock());
    }

    /// Stop the channel and wait up to `timeout` for the worker to exit.
    ///
    /// On [`FifoError::Timeout`] the worker is still owned by the channel
    /// and a later call may wait again.
    pub fn stop_timeout(&self, timeout: Duration) -> Result<()> {
        self.stop();

        let mut slot = self.worker.lock();
        let Some(worker) = slot.take() else {
            return Ok(());
        };

        match worker.exited.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                worker
                    .handle
                    .join()
                    .map_err(|_| FifoError::InvalidState("pipe worker panicked".into()))
            }
            Err(RecvTimeoutError::Timeout) => {
                *slot = Some(worker);
                Err(FifoError::Timeout)
            }
        }
    }

    /// Wait until every byte accepted by [`write`](Self::write) so far has
    /// been handed to the pipe.
    ///
    /// A flush that failed still counts as done; check
    /// [`take_last_error`](Self::take_last_error) afterwards.
    pub fn wait_flushed(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.write_state.lock();
        while !state.is_drained() {
            if self.is_stopped() {
                return Err(FifoError::Closed);
            }
            if self
                .shared
                .flushed
                .wait_until(&mut state, deadline)
                .timed_out()
                && !state.is_drained()
            {
                return Err(FifoError::Timeout);
            }
        }
        Ok(())
    }

    /// Take the most recent worker failure, if any.
    pub fn take_last_error(&self) -> Option<FifoError> {
        self.shared.last_error.lock().take()
    }

    /// Bytes waiting in the read buffer
    pub fn buffered_read_len(&self) -> usize {
        self.shared.read_buffer.lock().len()
    }

    /// Bytes staged and not yet flushed, including a flush in progress
    pub fn pending_write_len(&self) -> usize {
        let state = self.shared.write_state.lock();
        state.pending.len() + state.in_flight
    }

    /// Get a snapshot of the transfer counters
    pub fn stats(&self) -> ChannelStats {
        self.shared.counters.snapshot()
    }
}

impl GracefulChannel for PipeChannel {
    fn shutdown(&self) {
        self.stop();
    }

    fn is_shutdown(&self) -> bool {
        self.is_stopped()
    }

    fn shutdown_timeout(&self, timeout: Duration) -> Result<()> {
        self.stop_timeout(timeout)
    }
}

impl Drop for PipeChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Display for PipeChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FIFO {}:", self.name())?;
        writeln!(f, "path:    {}", self.path().display())?;
        writeln!(f, "mode:    {}", self.mode)?;
        writeln!(f, "role:    {}", self.role())?;
        write!(
            f,
            "buffers: read={} bytes, write={} bytes",
            self.buffered_read_len(),
            self.pending_write_len()
        )
    }
}

impl fmt::Debug for PipeChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipeChannel")
            .field("name", &self.name())
            .field("path", &self.path())
            .field("mode", &self.mode)
            .field("role", &self.role())
            .field("has_worker", &self.worker.lock().is_some())
            .finish()
    }
}

fn check_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(FifoError::configuration("pipe path is empty"));
    }
    Ok(())
}

/// Builder for [`PipeChannel`].
#[derive(Debug, Clone)]
pub struct PipeChannelBuilder {
    path: PathBuf,
    config: ChannelConfig,
}

impl PipeChannelBuilder {
    /// Create a builder with the default configuration.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            config: ChannelConfig::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the diagnostic name.
    pub fn name(mut self, name: &str) -> Self {
        self.config.name = name.to_string();
        self
    }

    /// Set the concurrency mode.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Set the starting role.
    pub fn role(mut self, role: Role) -> Self {
        self.config.initial_role = role;
        self
    }

    /// Set the idle interval.
    pub fn idle_interval(mut self, interval: Duration) -> Self {
        self.config.idle_interval = interval;
        self
    }

    /// Set the read chunk size.
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.config.read_chunk_size = size;
        self
    }

    /// Validate the settings and create the channel.
    pub fn spawn(self) -> Result<PipeChannel> {
        PipeChannel::spawn(self.path, self.config)
    }
}
