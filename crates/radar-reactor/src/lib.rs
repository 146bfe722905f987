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

//! The I/O reactor (spec section 4.C): owns the completion queue and the
//! registry of endpoints it dispatches completions to.
//!
//! The original design is a single blocking loop over an OS completion
//! queue, where `run()` dequeues completions with an infinite timeout and
//! routes each to the endpoint it was registered for, until a sentinel
//! completion posted by `quit()` (a reserved, impossible endpoint address)
//! is observed. spec section 9's Design Notes call out a portable
//! replacement: tag each outstanding operation rather than compare
//! addresses, and prefer composition over the original's inheritance chain.
//!
//! This implementation takes that redesign one step further by making the
//! "completion dispatch" structural instead of explicit: each endpoint
//! (`radar-control`, `radar-data`) spawns its own read/write tasks against a
//! shared [`radar_signal::SignalReceiver`] when it is initialized — those
//! tasks *are* the completion handlers the original dispatches to by
//! address. The reactor's remaining job is exactly the registry and the
//! sentinel: [`Reactor::register`] records which endpoints are live (and
//! rejects a duplicate name, standing in for spec section 4.C's "if the OS
//! rejects association, returns an error"), [`Reactor::run`] blocks the
//! dedicated reactor thread until the sentinel is posted, and
//! [`Reactor::quit`] posts it. The sentinel can never be mistaken for a
//! registered endpoint because it is carried on a distinct channel
//! ([`radar_signal::Signal`]) rather than sharing an address space with
//! endpoint completions at all.

use std::sync::Mutex;

use radar_signal::{SignalReceiver, SignalSender};

/// Errors the reactor's registry can report.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// An endpoint with this name is already registered.
    #[error("endpoint '{endpoint}' is already registered with the reactor")]
    RegistrationFailed {
        /// The name of the endpoint that failed to register.
        endpoint: String,
    },
}

/// Something the reactor can register: named, and notified once
/// registration succeeds (spec section 4.C: "on success, calls
/// `endpoint.on_register()` once").
pub trait Endpoint {
    /// The name this endpoint is registered under, used in logs.
    fn name(&self) -> &str;

    /// Called once, synchronously, immediately after a successful
    /// [`Reactor::register`].
    fn on_register(&self) {}
}

/// Owns the shutdown signal broadcast to every registered endpoint and the
/// bookkeeping of which endpoints are currently registered.
pub struct Reactor {
    signal_tx: SignalSender,
    signal_rx: SignalReceiver,
    registered: Mutex<Vec<String>>,
}

impl Default for Reactor {
    fn default() -> Self {
        let (signal_tx, signal_rx) = radar_signal::channel();
        Self { signal_tx, signal_rx, registered: Mutex::new(Vec::new()) }
    }
}

impl Reactor {
    /// Creates a reactor with an empty completion queue (spec section 4.C:
    /// "creates an empty completion queue").
    pub fn new() -> Self {
        Self::default()
    }

    /// The shutdown receiver an endpoint should race its I/O against.
    ///
    /// Every endpoint gets its own clone of the same underlying channel, so
    /// `quit()` reaches all of them at once; cloning is unbounded (spec
    /// section 4.C: "a registered endpoint stays registered until either the
    /// reactor or the endpoint is destroyed").
    pub fn endpoint_signal(&self) -> SignalReceiver {
        self.signal_rx.clone()
    }

    /// Registers `endpoint` with the reactor.
    ///
    /// Calls [`Endpoint::on_register`] exactly once on success. Returns
    /// [`Error::RegistrationFailed`] if an endpoint under the same name is
    /// already registered, the portable analogue of the OS rejecting a
    /// duplicate handle association.
    pub fn register(&self, endpoint: &dyn Endpoint) -> Result<(), Error> {
        let name = endpoint.name().to_string();
        let mut registered = self.registered.lock().expect("reactor registry lock poisoned");
        if registered.iter().any(|existing| existing == &name) {
            return Err(Error::RegistrationFailed { endpoint: name });
        }
        registered.push(name.clone());
        drop(registered);

        endpoint.on_register();
        tracing::info!(endpoint = %name, "endpoint registered with reactor");
        Ok(())
    }

    /// Runs the reactor: blocks until [`Reactor::quit`] posts the shutdown
    /// sentinel, then returns.
    ///
    /// This does not cancel any endpoint's outstanding I/O (spec section 5:
    /// "`reactor.quit()` ... does not cancel outstanding I/O") — each
    /// endpoint's own tasks observe the same signal and unwind themselves.
    pub async fn run(&self) {
        tracing::info!("reactor started, waiting for completions");
        let mut signal_rx = self.signal_rx.clone();
        let _: radar_signal::Signal = signal_rx.recv().await;
        tracing::info!("reactor observed the shutdown sentinel, exiting run loop");
    }

    /// Posts the shutdown sentinel (spec section 4.C: "posts an in-band
    /// sentinel completion"). Idempotent.
    pub fn quit(&self) {
        tracing::info!("posting shutdown sentinel to reactor");
        self.signal_tx.quit();
    }
}
