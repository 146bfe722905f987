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

//! The shutdown signal broadcast from the reactor (spec section 4.C) to
//! every endpoint task it has registered.
//!
//! The original design posts an in-band sentinel completion with a reserved
//! key (`UINTPTR_MAX`) into the completion queue; `run()` recognizes that key
//! and returns. The portable equivalent used here is a single-value
//! `tokio::sync::watch` channel: every endpoint task holds a receiver and
//! races it against its I/O with `tokio::select!`, so the sentinel can never
//! be confused with a completion belonging to a registered endpoint — the
//! channel carries no endpoint identity at all, it is a distinct type.

use tokio::sync::watch;

/// The one signal an endpoint task can receive from the reactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Signal {
    /// The reactor has been asked to shut down; stop reading/writing and
    /// return.
    Stop,
}

/// The reactor's handle for broadcasting shutdown to every registered
/// endpoint.
#[derive(Clone)]
pub struct SignalSender {
    tx: watch::Sender<bool>,
}

/// An endpoint's handle for observing the shutdown signal.
#[derive(Clone)]
pub struct SignalReceiver {
    rx: watch::Receiver<bool>,
}

/// Creates a connected sender/receiver pair, unset (not stopped) initially.
pub fn channel() -> (SignalSender, SignalReceiver) {
    let (tx, rx) = watch::channel(false);
    (SignalSender { tx }, SignalReceiver { rx })
}

impl SignalSender {
    /// Posts the shutdown sentinel. Idempotent: calling it more than once
    /// has no additional effect.
    pub fn quit(&self) {
        // `send` only errors when every receiver has been dropped, which is not
        // an error for a shutdown signal nobody is listening to anymore.
        let _ = self.tx.send(true);
    }
}

impl SignalReceiver {
    /// Resolves once the reactor has posted the shutdown sentinel.
    ///
    /// If the sender has already been dropped without posting, this
    /// resolves immediately with `Signal::Stop` as well: an endpoint whose
    /// reactor disappeared should not spin forever waiting for a shutdown
    /// that will never arrive.
    pub async fn recv(&mut self) -> Signal {
        if *self.rx.borrow() {
            return Signal::Stop;
        }
        if self.rx.changed().await.is_err() {
            return Signal::Stop;
        }
        Signal::Stop
    }

    /// Non-blocking check used by loops that must also observe I/O
    /// readiness via `tokio::select!`.
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn quit_wakes_all_receivers() {
        let (tx, mut rx1) = channel();
        let mut rx2 = rx1.clone();

        assert!(!rx1.is_stopped());
        tx.quit();

        assert_eq!(rx1.recv().await, Signal::Stop);
        assert_eq!(rx2.recv().await, Signal::Stop);
    }

    #[tokio::test]
    async fn dropped_sender_is_treated_as_stop() {
        let (tx, mut rx) = channel();
        drop(tx);
        assert_eq!(rx.recv().await, Signal::Stop);
    }
}
