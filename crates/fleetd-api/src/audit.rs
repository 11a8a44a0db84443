// crates/fleetd-api/src/audit.rs
// ============================================================================
// Module: API Audit Logging
// Description: Structured audit events for authorization and registry reloads.
// Purpose: Emit redacted JSON-line audit records without a logging framework.
// Dependencies: fleetd-core, serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! Every authorization decision and every registry reload produces one JSON
//! object on a single line. Tokens never appear in events; only a short
//! SHA-256 fingerprint is recorded so operators can correlate requests.
//!
//! The stderr and file sinks never write on the request path. Events are
//! serialized by the caller and handed to a bounded queue drained by a
//! dedicated writer thread. When the queue is full the event is dropped and
//! counted in [`AuditWriter::dropped_events`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use fleetd_core::AuthVerdict;
use fleetd_core::PermissionRequirement;
use fleetd_core::RegistryError;
use fleetd_core::ReloadSummary;
use fleetd_core::token_fingerprint;
use serde::Serialize;
use tokio::sync::mpsc;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum number of serialized events waiting for the writer thread.
pub const AUDIT_QUEUE_CAPACITY: usize = 1024;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Authorization audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct AuthAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Decision outcome (`allow` or `deny`).
    pub decision: &'static str,
    /// Verdict label.
    pub verdict: &'static str,
    /// Permission requirement guarding the route.
    pub requirement: String,
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Presented server identifier, when any.
    pub server_id: Option<String>,
    /// Presented token fingerprint, when any.
    pub token_fingerprint: Option<String>,
}

/// Request attributes attached to an authorization audit event.
pub struct AuthAuditParams<'a> {
    /// Permission requirement guarding the route.
    pub requirement: &'a PermissionRequirement,
    /// Verdict returned by the gate.
    pub verdict: AuthVerdict,
    /// HTTP method.
    pub method: &'a str,
    /// Request path.
    pub path: &'a str,
    /// Presented server identifier.
    pub server_id: Option<&'a str>,
    /// Presented token.
    pub token: Option<&'a str>,
}

impl AuthAuditEvent {
    /// Builds an authorization event. The token is reduced to a fingerprint.
    #[must_use]
    pub fn new(params: AuthAuditParams<'_>) -> Self {
        Self {
            event: "api_authz",
            timestamp_ms: now_ms(),
            decision: if params.verdict.is_allowed() { "allow" } else { "deny" },
            verdict: params.verdict.label(),
            requirement: params.requirement.to_string(),
            method: params.method.to_string(),
            path: params.path.to_string(),
            server_id: params.server_id.filter(|id| !id.is_empty()).map(str::to_string),
            token_fingerprint: params.token.filter(|t| !t.is_empty()).map(token_fingerprint),
        }
    }
}

/// Registry reload audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Reload outcome (`published` or `failed`).
    pub outcome: &'static str,
    /// Description of the record source.
    pub source: String,
    /// Generation live before the attempt.
    pub previous_generation: u64,
    /// Generation live after the attempt.
    pub generation: u64,
    /// Servers in the live snapshot after the attempt.
    pub server_count: usize,
    /// Failure message for rejected reloads.
    pub error: Option<String>,
}

impl RegistryAuditEvent {
    /// Builds an event for a published snapshot.
    #[must_use]
    pub fn published(source: impl Into<String>, summary: &ReloadSummary) -> Self {
        Self {
            event: "registry_reload",
            timestamp_ms: now_ms(),
            outcome: "published",
            source: source.into(),
            previous_generation: summary.previous_generation,
            generation: summary.generation,
            server_count: summary.server_count,
            error: None,
        }
    }

    /// Builds an event for a rejected reload; the live generation is unchanged.
    #[must_use]
    pub fn failed(
        source: impl Into<String>,
        generation: u64,
        server_count: usize,
        error: &RegistryError,
    ) -> Self {
        Self {
            event: "registry_reload",
            timestamp_ms: now_ms(),
            outcome: "failed",
            source: source.into(),
            previous_generation: generation,
            generation,
            server_count,
            error: Some(error.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for API events.
pub trait AuditSink: Send + Sync {
    /// Records an authorization decision.
    fn record_auth(&self, event: &AuthAuditEvent);

    /// Records a registry reload attempt.
    fn record_registry(&self, event: &RegistryAuditEvent);
}

/// Background JSON-line writer shared by the stderr and file sinks.
///
/// # Invariants
/// - [`AuditWriter::push`] never blocks; a full queue drops the event.
/// - Dropping the writer drains queued events before the thread exits.
pub struct AuditWriter {
    /// Queue feeding the writer thread; `None` once shutdown has begun.
    sender: Option<mpsc::Sender<String>>,
    /// Writer thread handle, joined on drop.
    worker: Option<JoinHandle<()>>,
    /// Events discarded because the queue was full.
    dropped: AtomicU64,
}

impl AuditWriter {
    /// Spawns a writer thread that appends one line per event to `out`.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn<W>(name: &str, mut out: W, capacity: usize) -> io::Result<Self>
    where
        W: Write + Send + 'static,
    {
        let (sender, mut receiver) = mpsc::channel::<String>(capacity.max(1));
        let worker = std::thread::Builder::new().name(name.to_string()).spawn(move || {
            while let Some(line) = receiver.blocking_recv() {
                let _ = writeln!(out, "{line}");
                let _ = out.flush();
            }
        })?;
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            dropped: AtomicU64::new(0),
        })
    }

    /// Serializes an event and queues it for the writer thread.
    pub fn push<T: Serialize>(&self, event: &T) {
        let Ok(payload) = serde_json::to_string(event) else {
            return;
        };
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.try_send(payload).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Returns the number of events dropped because the queue was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for AuditWriter {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Audit sink that writes JSON lines to stderr.
pub struct StderrAuditSink {
    /// Background writer bound to stderr.
    writer: AuditWriter,
}

impl StderrAuditSink {
    /// Starts the stderr writer thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer thread cannot be spawned.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            writer: AuditWriter::spawn("fleetd-audit-stderr", io::stderr(), AUDIT_QUEUE_CAPACITY)?,
        })
    }

    /// Returns the number of events dropped because the queue was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.writer.dropped_events()
    }
}

impl AuditSink for StderrAuditSink {
    fn record_auth(&self, event: &AuthAuditEvent) {
        self.writer.push(event);
    }

    fn record_registry(&self, event: &RegistryAuditEvent) {
        self.writer.push(event);
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// Background writer bound to the append-only log file.
    writer: AuditWriter,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode and starts its writer thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the thread cannot be
    /// spawned.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: AuditWriter::spawn("fleetd-audit-file", file, AUDIT_QUEUE_CAPACITY)?,
        })
    }

    /// Returns the number of events dropped because the queue was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.writer.dropped_events()
    }
}

impl AuditSink for FileAuditSink {
    fn record_auth(&self, event: &AuthAuditEvent) {
        self.writer.push(event);
    }

    fn record_registry(&self, event: &RegistryAuditEvent) {
        self.writer.push(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_auth(&self, _event: &AuthAuditEvent) {}

    fn record_registry(&self, _event: &RegistryAuditEvent) {}
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Milliseconds since the Unix epoch, zero if the clock is before it.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions use unwrap for clarity."
    )]

    use std::sync::Arc;

    use super::*;

    #[test]
    fn auth_event_never_carries_the_raw_token() {
        let requirement = PermissionRequirement::parse("s:test").unwrap();
        let event = AuthAuditEvent::new(AuthAuditParams {
            requirement: &requirement,
            verdict: AuthVerdict::DeniedForbidden,
            method: "GET",
            path: "/api/server",
            server_id: Some("existingserver"),
            token: Some("existingspecificskey"),
        });
        let payload = serde_json::to_string(&event).unwrap();
        assert!(!payload.contains("existingspecificskey"));
        assert_eq!(event.decision, "deny");
        assert_eq!(event.verdict, "forbidden");
        let expected = token_fingerprint("existingspecificskey");
        assert_eq!(event.token_fingerprint.as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn empty_headers_are_recorded_as_absent() {
        let requirement = PermissionRequirement::parse("c:list").unwrap();
        let event = AuthAuditEvent::new(AuthAuditParams {
            requirement: &requirement,
            verdict: AuthVerdict::DeniedMissingToken,
            method: "GET",
            path: "/api/servers",
            server_id: Some(""),
            token: None,
        });
        assert!(event.server_id.is_none());
        assert!(event.token_fingerprint.is_none());
        assert_eq!(event.requirement, "c:list");
    }

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let sink = FileAuditSink::new(&path).unwrap();
        let summary = ReloadSummary {
            previous_generation: 0,
            generation: 1,
            server_count: 2,
        };
        sink.record_registry(&RegistryAuditEvent::published("servers", &summary));
        sink.record_registry(&RegistryAuditEvent::failed(
            "servers",
            1,
            2,
            &RegistryError::ConfigurationLoadFailure("bad file".to_string()),
        ));
        assert_eq!(sink.dropped_events(), 0);
        drop(sink);
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let failed: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(failed["outcome"], "failed");
        assert_eq!(failed["generation"], 1);
    }

    /// Writer that blocks on its first write until released.
    struct GatedWriter {
        /// Release signal for the first write.
        gate: Option<std::sync::mpsc::Receiver<()>>,
        /// Bytes written so far.
        written: Arc<std::sync::Mutex<Vec<u8>>>,
    }

    impl Write for GatedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(gate) = self.gate.take() {
                let _ = gate.recv();
            }
            self.written.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn stalled_writer_drops_events_instead_of_blocking() {
        let (release, gate) = std::sync::mpsc::channel();
        let written = Arc::new(std::sync::Mutex::new(Vec::new()));
        let writer = AuditWriter::spawn(
            "fleetd-audit-test",
            GatedWriter {
                gate: Some(gate),
                written: Arc::clone(&written),
            },
            2,
        )
        .unwrap();
        let summary = ReloadSummary {
            previous_generation: 0,
            generation: 1,
            server_count: 1,
        };
        let event = RegistryAuditEvent::published("servers", &summary);
        let total = 8_u64;
        for _ in 0 .. total {
            writer.push(&event);
        }
        let dropped = writer.dropped_events();
        assert!(dropped >= total - 3, "only {dropped} of {total} events dropped");

        release.send(()).unwrap();
        drop(writer);
        let contents = String::from_utf8(written.lock().unwrap().clone()).unwrap();
        let lines = u64::try_from(contents.lines().count()).unwrap();
        assert_eq!(lines, total - dropped);
        for line in contents.lines() {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["event"], "registry_reload");
        }
    }
}
