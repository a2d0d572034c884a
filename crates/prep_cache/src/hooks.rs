//! Injectable log and debug sinks.
//!
//! Every message is emitted through `tracing` first. Embedders that route
//! messages elsewhere (a GUI console, a per-run log) can additionally install
//! callbacks on the cache handle.

use std::fmt;
use std::sync::Arc;

/// A callback receiving one fully formatted message.
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// The pair of optional sinks carried by a cache handle.
#[derive(Clone, Default)]
pub struct Hooks {
    log: Option<LogSink>,
    debug: Option<LogSink>,
}

impl Hooks {
    /// Installs the sink receiving warnings.
    pub fn set_log(&mut self, sink: LogSink) {
        self.log = Some(sink);
    }

    /// Installs the sink receiving diagnostic messages.
    pub fn set_debug(&mut self, sink: LogSink) {
        self.debug = Some(sink);
    }

    pub(crate) fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!("{args}");
        if let Some(sink) = &self.log {
            sink(&args.to_string());
        }
    }

    pub(crate) fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!("{args}");
        if let Some(sink) = &self.debug {
            sink(&args.to_string());
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("log", &self.log.is_some())
            .field("debug", &self.debug.is_some())
            .finish()
    }
}
