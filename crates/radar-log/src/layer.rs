//! Bridges `tracing` events emitted across the workspace into a [`crate::Logger`].
//!
//! Every other `radar-*` crate logs with the ordinary `tracing::{debug,
//! info, warn, error}!` macros, matching the idiom of the teacher pipeline
//! crates. This layer is the process-wide subscriber piece that routes
//! those events through the buffered sink described in spec section 4.A,
//! rather than straight to stderr via `tracing_subscriber::fmt`.

use std::sync::Arc;

use tracing::{field::Field, Event, Level as TracingLevel, Subscriber};
use tracing_subscriber::{field::Visit, layer::Context, Layer};

use crate::{Level, Logger};

/// A `tracing_subscriber::Layer` that forwards formatted events to a shared
/// [`Logger`].
pub struct RadarLogLayer {
    logger: Arc<Logger>,
}

impl RadarLogLayer {
    /// Creates a new layer writing into `logger`.
    pub fn new(logger: Arc<Logger>) -> Self {
        Self { logger }
    }
}

impl<S: Subscriber> Layer<S> for RadarLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = map_level(*event.metadata().level());
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let message = match visitor.message {
            Some(message) => format!("{} {}", event.metadata().target(), message),
            None => event.metadata().target().to_string(),
        };

        self.logger.log(level, &message);
    }
}

fn map_level(level: TracingLevel) -> Level {
    match level {
        TracingLevel::TRACE => Level::Trace,
        TracingLevel::DEBUG => Level::Debug,
        TracingLevel::INFO => Level::Info,
        TracingLevel::WARN => Level::Warning,
        TracingLevel::ERROR => Level::Error,
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::prelude::*;

    use super::*;
    use crate::Writer;

    #[derive(Clone, Default)]
    struct VecWriter(Arc<Mutex<Vec<u8>>>);

    impl Writer for VecWriter {
        fn write(&mut self, bytes: &[u8]) {
            self.0.lock().unwrap().extend_from_slice(bytes);
        }
    }

    #[test]
    fn tracing_events_reach_the_logger() {
        let logger = Arc::new(Logger::new());
        let sink = VecWriter::default();
        logger.set_writer(Box::new(sink.clone()));
        logger.set_level(Level::Trace);

        let subscriber = tracing_subscriber::registry().with(RadarLogLayer::new(logger.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!("bridge smoke test");
        });

        assert!(String::from_utf8_lossy(&sink.0.lock().unwrap()).contains("bridge smoke test"));
    }
}
