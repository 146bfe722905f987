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

//! The control-port handler (spec section 4.D): a serial endpoint wired to
//! the radar's CLI port at 115,200 baud whose inbound bytes are echoed
//! verbatim to the operator's console.

use std::{
    io::{self, Write},
    sync::Arc,
};

use radar_reactor::Endpoint;
use radar_serial::{Handler, SerialEndpoint};
use radar_signal::SignalReceiver;

pub use radar_serial::Error;

/// Baud rate the radar's CLI port is wired to (spec section 6).
pub const BAUD_RATE: u32 = 115_200;

/// A serial endpoint that echoes every inbound byte to standard output.
pub struct ControlHandler {
    serial: SerialEndpoint,
}

impl Default for ControlHandler {
    fn default() -> Self {
        Self { serial: SerialEndpoint::new() }
    }
}

impl ControlHandler {
    /// Creates an uninitialized control-port handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `port_name` at [`BAUD_RATE`] and starts echoing its inbound
    /// bytes to stdout.
    pub fn initialize(&self, port_name: &str, signal: SignalReceiver) -> Result<(), Error> {
        self.serial.initialize(port_name, BAUD_RATE, Arc::new(ConsoleEcho), signal)
    }

    /// Forwards an operator command to the radar's CLI port (spec section
    /// 4.G: each non-`exit` stdin line, with a trailing `\n`, is forwarded
    /// here).
    pub fn async_write(&self, bytes: &[u8]) -> Result<(), Error> {
        self.serial.async_write(bytes)
    }
}

impl Endpoint for ControlHandler {
    fn name(&self) -> &str {
        "control"
    }
}

struct ConsoleEcho;

impl Handler for ConsoleEcho {
    fn on_read(&self, bytes: &[u8]) {
        let mut stdout = io::stdout();
        if let Err(error) = stdout.write_all(bytes).and_then(|()| stdout.flush()) {
            tracing::error!(%error, "writing control-port bytes to stdout failed");
        }
    }
}
