//! Audit events: structured records of what a run decided and did.
//!
//! Grounded on this codebase's `broadcast::Sender<String>` fan-out in
//! `server.rs` (every subscriber gets every event); here the sink trait
//! lets the process-wide `TracingAuditSink` and any additional sink share
//! the same mandatory-redaction entry point.

use crate::safety::redaction::{redact, RedactionOptions};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    AgentDecision,
    ToolCall,
    LlmRequest,
    Error,
    RunStart,
    RunProgress,
    RunComplete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: i64,
    pub tenant_id: Option<String>,
    pub request_id: String,
    pub event_type: AuditEventType,
    pub data: Value,
}

impl AuditEvent {
    pub fn new(timestamp: i64, request_id: impl Into<String>, event_type: AuditEventType, data: Value) -> Self {
        Self { timestamp, tenant_id: None, request_id: request_id.into(), event_type, data }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent);
}

/// Logs every event via `tracing`. Redaction happens once, upstream in
/// `AuditLogger::record`, before any sink — including this one — ever sees
/// `data`.
#[derive(Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: &AuditEvent) {
        info!(
            request_id = %event.request_id,
            tenant_id = ?event.tenant_id,
            event_type = ?event.event_type,
            data = %event.data,
            "audit event"
        );
    }
}

/// Records through every configured sink; a failing sink cannot block the
/// others since `AuditSink::record` has no error channel. `data` is
/// redacted exactly once here, before any sink is called, so no sink — in
/// or out of this crate — is ever handed unredacted event data.
pub struct AuditLogger {
    sinks: Vec<Box<dyn AuditSink>>,
    redaction: RedactionOptions,
}

impl AuditLogger {
    pub fn new(sinks: Vec<Box<dyn AuditSink>>) -> Self {
        Self { sinks, redaction: RedactionOptions::default() }
    }

    pub async fn record(&self, mut event: AuditEvent) {
        event.data = redact(&event.data, &self.redaction);
        for sink in &self.sinks {
            sink.record(&event).await;
        }
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new(vec![Box::new(TracingAuditSink::default())])
    }
}
