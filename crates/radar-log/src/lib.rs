#![deny(
    trivial_numeric_casts,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    unused_results
)]
#![warn(rust_2021_compatibility, unreachable_pub)]

//! A buffered, severity-filtered log sink.
//!
//! This is the component every other `radar-*` crate depends on for its
//! `log(level, message)` contract. It is deliberately independent from
//! `tracing`'s own subscriber machinery so that the buffering/flush
//! behaviour of spec section 4.A (flush at ~3840 bytes, or immediately on an
//! `Error`-level message, with the write happening outside the buffer lock)
//! is exact and testable; [`layer::RadarLogLayer`] then bridges `tracing`
//! events emitted across the workspace into this sink, so call sites still
//! just use `tracing::info!`/`warn!`/`error!` like the rest of the crate
//! graph.

pub mod layer;

use std::{
    fmt::Write as _,
    io::{self, Write as IoWrite},
    sync::Mutex,
    time::{SystemTime, UNIX_EPOCH},
};

/// Buffer size, in bytes, above which [`Logger::log`] triggers a flush.
const FLUSH_THRESHOLD: usize = 3_840;

/// Total ordering of log severities; `Off` disables logging entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Fine-grained diagnostic detail.
    Trace,
    /// Diagnostic detail useful during development.
    Debug,
    /// Notable, expected events.
    Info,
    /// Recoverable but noteworthy conditions.
    Warning,
    /// Failures that do not abort the program.
    Error,
    /// Disables logging.
    Off,
}

impl Level {
    fn name(self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARN",
            Level::Error => "ERROR",
            Level::Off => "OFF",
        }
    }
}

/// A pluggable destination for flushed log bytes.
pub trait Writer: Send {
    /// Writes a chunk of already-formatted log bytes.
    fn write(&mut self, bytes: &[u8]);
}

/// The default writer: the process's standard error stream.
#[derive(Default)]
struct StderrWriter;

impl Writer for StderrWriter {
    fn write(&mut self, bytes: &[u8]) {
        let mut stderr = io::stderr();
        // Best-effort: a failing log must never abort the program (spec section 7).
        let _ = stderr.write_all(bytes);
    }
}

/// A leveled, buffered, thread-safe log sink.
///
/// Messages strictly below the configured filter level are dropped with no
/// side effect. Accepted messages are appended to an internal buffer under a
/// mutex; the buffer is flushed (and the write performed outside the lock)
/// once it exceeds [`FLUSH_THRESHOLD`] bytes or immediately for any message
/// at `Level::Error` or above.
pub struct Logger {
    level: Mutex<Level>,
    buffer: Mutex<Vec<u8>>,
    writer: Mutex<Box<dyn Writer>>,
}

impl Default for Logger {
    fn default() -> Self {
        Self {
            level: Mutex::new(Level::Info),
            buffer: Mutex::new(Vec::with_capacity(FLUSH_THRESHOLD)),
            writer: Mutex::new(Box::new(StderrWriter)),
        }
    }
}

impl Logger {
    /// Creates a new logger at the default `Info` level, writing to stderr.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum severity that will be appended to the buffer.
    pub fn set_level(&self, level: Level) {
        *self.level.lock().expect("log level lock poisoned") = level;
    }

    /// Replaces the flush destination.
    pub fn set_writer(&self, writer: Box<dyn Writer>) {
        *self.writer.lock().expect("log writer lock poisoned") = writer;
    }

    /// Appends a message to the buffer, subject to the current filter level.
    ///
    /// Flushes immediately if the message is at `Error` severity or if the
    /// buffer has grown past [`FLUSH_THRESHOLD`].
    pub fn log(&self, level: Level, message: &str) {
        if level < *self.level.lock().expect("log level lock poisoned") {
            return;
        }

        let line = format_line(level, message);

        let should_flush = {
            let mut buffer = self.buffer.lock().expect("log buffer lock poisoned");
            buffer.extend_from_slice(line.as_bytes());
            buffer.len() >= FLUSH_THRESHOLD
        };

        if should_flush || level >= Level::Error {
            self.flush();
        }
    }

    /// Atomically swaps the buffer out and writes its contents, outside the
    /// buffer lock.
    pub fn flush(&self) {
        let residue = {
            let mut buffer = self.buffer.lock().expect("log buffer lock poisoned");
            std::mem::take(&mut *buffer)
        };

        if residue.is_empty() {
            return;
        }

        self.writer
            .lock()
            .expect("log writer lock poisoned")
            .write(&residue);
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.flush();
    }
}

fn format_line(level: Level, message: &str) -> String {
    let thread_id = format!("{:?}", std::thread::current().id());
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros())
        .unwrap_or_default();

    let mut line = String::with_capacity(message.len() + 48);
    // Intentionally hand-formatted rather than routed through `tracing-subscriber`'s
    // fmt layer: this is the buffered sink itself, not a consumer of it.
    let _ = write!(line, "[{thread_id}] {timestamp} {:>5} {message}\n", level.name());
    line
}
