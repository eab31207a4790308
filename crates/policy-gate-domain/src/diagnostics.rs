//! Debug-gated diagnostic logging.
//!
//! Every message goes to `tracing`. Messages also fan out to the remote
//! timeline and to the in-memory buffer returned to synchronous callers, but
//! only when debug mode is on or the message is marked always-log.

use std::sync::{Arc, Mutex};

use tracing::info;

use crate::request::Variables;

/// Line terminator appended to buffered messages.
const LINE_TERMINATOR: &str = "\r\n";

/// Destination for progress lines streamed to a pipeline timeline.
///
/// Appends must not block on the network; implementations queue and deliver
/// in the background.
pub trait TimelineSink: Send + Sync {
    fn append(&self, line: &str);
}

/// Fan-out logger owned by one evaluation invocation.
#[derive(Default)]
pub struct DiagnosticLog {
    debug: bool,
    timeline: Option<Arc<dyn TimelineSink>>,
    buffer: Option<Mutex<String>>,
}

impl DiagnosticLog {
    /// Logger whose debug flag comes from the caller's `system.debug` variable.
    pub fn new(variables: &Variables) -> Self {
        Self::with_debug(variables.is_debug_enabled())
    }

    pub fn with_debug(debug: bool) -> Self {
        Self {
            debug,
            ..Self::default()
        }
    }

    /// Also stream gated messages to a remote timeline.
    pub fn with_timeline(mut self, timeline: Arc<dyn TimelineSink>) -> Self {
        self.timeline = Some(timeline);
        self
    }

    /// Also collect gated messages in memory for a synchronous response.
    pub fn with_buffer(mut self) -> Self {
        self.buffer = Some(Mutex::new(String::new()));
        self
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug
    }

    /// Verbose step message; reaches the remote sinks only in debug mode.
    pub fn log(&self, message: &str) {
        self.emit(message, false);
    }

    /// Lifecycle message; always reaches every sink.
    pub fn log_always(&self, message: &str) {
        self.emit(message, true);
    }

    fn emit(&self, message: &str, always: bool) {
        if always || self.debug {
            if let Some(timeline) = &self.timeline {
                timeline.append(message);
            }
            if let Some(buffer) = &self.buffer {
                let mut buffer = buffer.lock().unwrap_or_else(|e| e.into_inner());
                buffer.push_str(message);
                buffer.push_str(LINE_TERMINATOR);
            }
        }

        info!(target: "policy_gate::diagnostics", "{}", message);
    }

    /// Snapshot of the in-memory buffer (empty when no buffer is attached).
    pub fn buffered(&self) -> String {
        self.buffer
            .as_ref()
            .map(|b| b.lock().unwrap_or_else(|e| e.into_inner()).clone())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for DiagnosticLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticLog")
            .field("debug", &self.debug)
            .field("timeline", &self.timeline.is_some())
            .field("buffer", &self.buffer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        lines: Mutex<Vec<String>>,
    }

    impl TimelineSink for RecordingSink {
        fn append(&self, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }
    }

    fn vars(debug: &str) -> Variables {
        [("system.debug", debug)].into_iter().collect()
    }

    #[test]
    fn test_debug_disabled_keeps_buffer_empty() {
        let log = DiagnosticLog::new(&vars("false")).with_buffer();
        log.log("Sample message");
        assert_eq!(log.buffered(), "");
    }

    #[test]
    fn test_unparsable_debug_keeps_buffer_empty() {
        let log = DiagnosticLog::new(&vars("verbose")).with_buffer();
        log.log("Sample message");
        assert_eq!(log.buffered(), "");

        let log = DiagnosticLog::new(&Variables::new()).with_buffer();
        log.log("Sample message");
        assert_eq!(log.buffered(), "");
    }

    #[test]
    fn test_debug_enabled_buffers_every_message() {
        let log = DiagnosticLog::new(&vars("true")).with_buffer();
        log.log("Sample message");
        log.log("Second");
        assert_eq!(log.buffered(), "Sample message\r\nSecond\r\n");
    }

    #[test]
    fn test_always_log_bypasses_debug_gate() {
        let log = DiagnosticLog::new(&vars("false")).with_buffer();
        log.log_always("Sample message");
        assert_eq!(log.buffered(), "Sample message\r\n");
    }

    #[test]
    fn test_timeline_receives_gated_messages() {
        let sink = Arc::new(RecordingSink::default());
        let log = DiagnosticLog::with_debug(false).with_timeline(sink.clone());
        log.log("verbose step");
        log.log_always("Initiating evaluation");

        let lines = sink.lines.lock().unwrap();
        assert_eq!(*lines, vec!["Initiating evaluation".to_string()]);
    }

    #[test]
    fn test_no_sinks_is_trace_only() {
        let log = DiagnosticLog::with_debug(true);
        log.log_always("nothing to see");
        assert_eq!(log.buffered(), "");
    }
}
