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

//! The persistence interface spec section 6 specifies at its boundary: "the
//! data-port handler calls `writer(bytes, size)` once per decoded frame. If
//! no writer is configured, the bytes are written to standard output."
//!
//! The core (`radar-data`) depends only on the [`FrameSink`] trait below, in
//! the manner the teacher's `exporter::EffectHandler` abstracts a pipeline's
//! output over several backends without leaking that choice into the
//! component that produces the data.

use std::{
    fs::{File, OpenOptions},
    io::{self, Stdout, Write},
    path::Path,
    sync::Mutex,
};

/// Errors that can occur opening or writing to a [`FrameSink`].
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The output file could not be opened for writing.
    #[error("failed to open sink file '{path}': {source}")]
    Open {
        /// The path that failed to open.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Where a decoded frame's rendered JSON bytes are written.
///
/// Writers are not required to flush (spec section 6); ordering across
/// calls is preserved since `radar-data` calls `write` synchronously from
/// its single read-task per endpoint.
pub trait FrameSink: Send + Sync {
    /// Writes one already-rendered record's bytes.
    fn write(&self, bytes: &[u8]);
}

/// The default sink: the process's standard output.
#[derive(Default)]
pub struct StdoutSink {
    stdout: Mutex<Stdout>,
}

impl StdoutSink {
    /// Creates a new sink writing to standard output.
    pub fn new() -> Self {
        Self { stdout: Mutex::new(io::stdout()) }
    }
}

impl FrameSink for StdoutSink {
    fn write(&self, bytes: &[u8]) {
        let mut stdout = self.stdout.lock().expect("stdout sink lock poisoned");
        // Best-effort: a sink failure must not take down frame decoding.
        if let Err(error) = stdout.write_all(bytes) {
            tracing::error!(%error, "writing frame record to stdout failed");
        }
    }
}

/// A sink that appends every record to a file on disk.
pub struct FileSink {
    file: Mutex<File>,
}

impl FileSink {
    /// Opens (creating if absent, appending if present) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = OpenOptions::new().create(true).append(true).open(path).map_err(|source| Error::Open {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl FrameSink for FileSink {
    fn write(&self, bytes: &[u8]) {
        let mut file = self.file.lock().expect("file sink lock poisoned");
        if let Err(error) = file.write_all(bytes) {
            tracing::error!(%error, "writing frame record to file failed");
        }
    }
}
