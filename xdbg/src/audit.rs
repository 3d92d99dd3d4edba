//! Structured audit trail: a pluggable sink consuming [`AuditRecord`]s.
//!
//! Independent of the ambient `tracing` logging the rest of the crate
//! emits — this is the operator/compliance-facing record described by
//! the data model, not developer-facing diagnostics.

use std::io::Write;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::peer::IdentityInfo;

/// Kind of lifecycle/command event recorded in an [`AuditRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AuditEvent {
    /// The server completed `Start`.
    ServerStart,
    /// The server completed `Stop`.
    ServerStop,
    /// A session was accepted.
    SessionStart,
    /// A session ended (any cause).
    SessionEnd,
    /// A command was dispatched.
    Command,
    /// A command completed successfully.
    CommandSuccess,
    /// A command failed (not found, error, panic, timeout).
    CommandFailed,
    /// A command was denied by the whitelist.
    CommandForbidden,
}

/// One structured audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Wall-clock time the event was recorded.
    pub timestamp: SystemTime,
    /// The event kind.
    pub event: AuditEvent,
    /// The connected peer, if the event is session/command scoped.
    pub identity: Option<IdentityInfo>,
    /// The command name, for `Command`-family events.
    pub command: Option<String>,
    /// The command arguments, for `Command`-family events.
    pub args: Option<Vec<String>>,
    /// Command execution duration, for completion events.
    pub duration: Option<Duration>,
    /// Error text, for failure events.
    pub error: Option<String>,
    /// Free-form extra context (e.g. accept-loop backoff diagnostics).
    pub extra: Option<String>,
}

impl AuditRecord {
    /// Builds a minimal record for `event` with everything else unset.
    pub fn new(event: AuditEvent) -> Self {
        Self {
            timestamp: SystemTime::now(),
            event,
            identity: None,
            command: None,
            args: None,
            duration: None,
            error: None,
            extra: None,
        }
    }

    /// Attaches peer identity.
    pub fn with_identity(mut self, identity: IdentityInfo) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Attaches a command name and its arguments.
    pub fn with_command(mut self, command: impl Into<String>, args: &[String]) -> Self {
        self.command = Some(command.into());
        self.args = Some(args.to_vec());
        self
    }

    /// Attaches an execution duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Attaches error text.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attaches free-form extra context.
    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }
}

/// A redactor applied to audit record arguments before they reach a
/// sink, e.g. to scrub secrets passed as command arguments. Optional;
/// when absent, arguments are recorded verbatim.
pub trait Redactor: Send + Sync {
    /// Returns a redacted copy of `args`.
    fn redact(&self, args: &[String]) -> Vec<String>;
}

/// Destination for audit records. Implementations must serialize their
/// own writes internally (the server calls `write` concurrently from
/// multiple sessions).
pub trait Sink: Send + Sync {
    /// Records one event.
    fn write(&self, record: &AuditRecord);

    /// Flushes and releases any held resources. Called exactly once, on
    /// server `Stop`.
    fn close(&self) {}
}

/// Wraps an inner sink, applying a [`Redactor`] to `args` before
/// forwarding each record.
pub struct RedactingSink<S: Sink> {
    inner: S,
    redactor: Box<dyn Redactor>,
}

impl<S: Sink> RedactingSink<S> {
    /// Wraps `inner`, redacting arguments through `redactor`.
    pub fn new(inner: S, redactor: Box<dyn Redactor>) -> Self {
        Self { inner, redactor }
    }
}

impl<S: Sink> Sink for RedactingSink<S> {
    fn write(&self, record: &AuditRecord) {
        let mut record = record.clone();
        if let Some(args) = &record.args {
            record.args = Some(self.redactor.redact(args));
        }
        self.inner.write(&record);
    }

    fn close(&self) {
        self.inner.close();
    }
}

/// Human-readable text sink, one line per record, written to any
/// `Write` destination (a file, stdout, a `Vec<u8>` in tests).
pub struct TextSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> TextSink<W> {
    /// Wraps `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> Sink for TextSink<W> {
    fn write(&self, record: &AuditRecord) {
        let mut line = format!("{:?}", record.event);
        if let Some(identity) = &record.identity {
            line.push_str(&format!(" peer={}", identity.display_user()));
        }
        if let Some(command) = &record.command {
            line.push_str(&format!(" command={command}"));
        }
        if let Some(args) = &record.args {
            line.push_str(&format!(" args={args:?}"));
        }
        if let Some(duration) = record.duration {
            line.push_str(&format!(" duration={duration:?}"));
        }
        if let Some(error) = &record.error {
            line.push_str(&format!(" error={error:?}"));
        }
        if let Some(extra) = &record.extra {
            line.push_str(&format!(" extra={extra}"));
        }
        if let Ok(mut w) = self.writer.lock() {
            let _ = writeln!(w, "{line}");
        }
    }

    fn close(&self) {
        if let Ok(mut w) = self.writer.lock() {
            let _ = w.flush();
        }
    }
}

/// Line-delimited JSON sink: one serialized [`AuditRecord`] per line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Wraps `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> Sink for JsonLinesSink<W> {
    fn write(&self, record: &AuditRecord) {
        let Ok(line) = serde_json::to_string(record) else {
            return;
        };
        if let Ok(mut w) = self.writer.lock() {
            let _ = writeln!(w, "{line}");
        }
    }

    fn close(&self) {
        if let Ok(mut w) = self.writer.lock() {
            let _ = w.flush();
        }
    }
}

/// A sink that discards every record; the framework's default when no
/// sink is supplied via [`crate::options::ServerOptions`].
#[derive(Debug, Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn write(&self, _record: &AuditRecord) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_sink_formats_a_line_per_record() {
        let sink = TextSink::new(Vec::<u8>::new());
        sink.write(&AuditRecord::new(AuditEvent::ServerStart));
        sink.write(&AuditRecord::new(AuditEvent::ServerStop).with_error("boom"));
        let buf = sink.writer.lock().unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("ServerStart"));
        assert!(text.contains("error=\"boom\""));
    }

    #[test]
    fn json_lines_sink_round_trips() {
        let sink = JsonLinesSink::new(Vec::<u8>::new());
        sink.write(&AuditRecord::new(AuditEvent::SessionStart).with_command("stack", &[]));
        let buf = sink.writer.lock().unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        let parsed: AuditRecord = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(parsed.event, AuditEvent::SessionStart);
        assert_eq!(parsed.command.as_deref(), Some("stack"));
    }

    struct StarRedactor;
    impl Redactor for StarRedactor {
        fn redact(&self, args: &[String]) -> Vec<String> {
            args.iter().map(|_| "***".to_owned()).collect()
        }
    }

    #[test]
    fn redacting_sink_masks_args_before_forwarding() {
        let inner = JsonLinesSink::new(Vec::<u8>::new());
        let sink = RedactingSink::new(inner, Box::new(StarRedactor));
        let record =
            AuditRecord::new(AuditEvent::Command).with_command("setlog", &["secret-token".to_owned()]);
        sink.write(&record);
        let buf = sink.inner.writer.lock().unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(!text.contains("secret-token"));
        assert!(text.contains("***"));
    }

    #[test]
    fn null_sink_never_panics() {
        let sink = NullSink;
        sink.write(&AuditRecord::new(AuditEvent::ServerStart));
        sink.close();
    }
}
