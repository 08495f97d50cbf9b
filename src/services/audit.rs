use opentelemetry::{KeyValue, global, metrics::Counter};
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    High,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub name: &'static str,
    pub severity: Severity,
    pub fields: Vec<(&'static str, String)>,
}

impl AuditEvent {
    #[must_use]
    pub const fn new(name: &'static str, severity: Severity) -> Self {
        Self { name, severity, fields: Vec::new() }
    }

    #[must_use]
    pub fn with(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.fields.push((key, value.to_string()));
        self
    }

    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }
}

/// Destination for security audit events. Emission cannot fail the caller.
pub trait AuditSink: Send + Sync + fmt::Debug {
    fn emit(&self, event: AuditEvent);
}

#[derive(Clone, Debug)]
pub struct TracingAuditSink {
    events_total: Counter<u64>,
}

impl TracingAuditSink {
    #[must_use]
    pub fn new() -> Self {
        let meter = global::meter("helpdesk-auth");
        Self {
            events_total: meter
                .u64_counter("auth_audit_events_total")
                .with_description("Security audit events by name and severity")
                .build(),
        }
    }
}

impl Default for TracingAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let fields = event.fields.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(" ");
        match event.severity {
            Severity::Info => tracing::info!(target: "audit", event = event.name, %fields),
            Severity::Warning => tracing::warn!(target: "audit", event = event.name, %fields),
            Severity::High => tracing::error!(target: "audit", event = event.name, %fields),
        }
        self.events_total.add(
            1,
            &[KeyValue::new("event", event.name), KeyValue::new("severity", event.severity.as_str())],
        );
    }
}

/// Keeps every event in memory. Used by tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<AuditEvent> {
        self.events().into_iter().rev().find(|e| e.name == name)
    }
}

impl AuditSink for MemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
