// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit logging and the session-history trail.
//!
//! `AuditSink` is the verb-level audit log the dispatcher writes to on
//! every request and every async response. It is a
//! trait so an embedder can fan it out to disk, a remote collector, or
//! nowhere at all. `SessionHistory` is the small in-process ring of
//! login/reconnect outcomes — unlike `AuditSink` this one has a
//! concrete, bounded implementation because its retention policy (at
//! most 10 records) is part of the contract, not an embedder choice.

use std::collections::VecDeque;
use std::time::SystemTime;

use tokio::sync::Mutex;

/// Verb-level audit trail. Default implementation logs via `tracing`.
pub trait AuditSink: Send + Sync {
    fn record_request(&self, req_id: &str, method: &str);
    fn record_response(&self, req_id: &str, method: &str, success: bool);
}

/// Audits every request/response pair through `tracing` at info level.
#[derive(Debug, Default)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record_request(&self, req_id: &str, method: &str) {
        tracing::info!(req_id, method, "request received");
    }

    fn record_response(&self, req_id: &str, method: &str, success: bool) {
        tracing::info!(req_id, method, success, "response sent");
    }
}

/// One login/reconnect outcome.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub timestamp: SystemTime,
    pub success: bool,
    pub message: String,
}

/// Bounded, append-only ring of the most recent login/reconnect outcomes,
/// out of the dispatcher's critical path.
pub struct SessionHistory {
    capacity: usize,
    records: Mutex<VecDeque<LoginOutcome>>,
}

impl SessionHistory {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, records: Mutex::new(VecDeque::with_capacity(capacity)) }
    }

    /// Append one outcome, evicting the oldest record if at capacity.
    pub async fn record(&self, success: bool, message: impl Into<String>) {
        let mut records = self.records.lock().await;
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(LoginOutcome {
            timestamp: SystemTime::now(),
            success,
            message: message.into(),
        });
    }

    /// True if any retained outcome was a failure.
    pub async fn has_any_failures(&self) -> bool {
        self.records.lock().await.iter().any(|r| !r.success)
    }

    /// The most recently recorded outcome, if any.
    pub async fn latest(&self) -> Option<LoginOutcome> {
        self.records.lock().await.back().cloned()
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
