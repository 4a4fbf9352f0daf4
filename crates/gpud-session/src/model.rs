// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire types exchanged with the control plane.
//!
//! `Body` is the outer envelope shared by both directions of the duplex
//! transport. `Request`/`Response` are the JSON objects carried inside
//! `Body.data`.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque message envelope. Identical shape for inbound requests and
/// outbound responses; `req_id` is echoed verbatim on the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Body {
    #[serde(with = "base64_bytes")]
    pub data: Bytes,
    pub req_id: String,
}

/// `data` travels as base64 text inside the JSON envelope, matching a
/// control plane that marshals a byte slice the conventional way rather
/// than as a numeric array.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, s: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(bytes).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(d)?;
        let decoded = STANDARD.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)?;
        Ok(Bytes::from(decoded))
    }
}

/// Decoded request payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Request {
    pub method: String,
    pub components: Vec<String>,
    pub start_time_unix_ms: Option<i64>,
    pub end_time_unix_ms: Option<i64>,
    pub since_seconds: Option<u64>,
    pub update_version: Option<String>,
    pub update_config: Option<HashMap<String, String>>,
    pub bootstrap: Option<BootstrapRequest>,
    pub component_name: Option<String>,
    pub tag_name: Option<String>,
    pub custom_plugin_spec: Option<Value>,
    pub custom_plugin_specs: Option<Vec<Value>>,
    pub inject_fault_request: Option<InjectFaultRequest>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapRequest {
    pub script_base64: String,
    pub timeout_in_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectFaultRequest {
    KernelMessage { message: Option<String> },
    Xid { id: u32 },
}

/// Response payload. `error` is empty iff success.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Response {
    pub error: String,
    pub error_code: i32,
    pub states: Option<Vec<ComponentHealthStates>>,
    pub events: Option<Vec<ComponentEvents>>,
    pub metrics: Option<Vec<ComponentMetrics>>,
    pub bootstrap: Option<BootstrapResult>,
    pub gossip_request: Option<Value>,
    pub package_status: Option<Vec<PackageStatusEntry>>,
    pub custom_plugin_specs: Option<Vec<Value>>,
    pub token: Option<String>,
}

impl Response {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn with_error(code: crate::error::ErrorCode, message: impl Into<String>) -> Self {
        Self { error: message.into(), error_code: code.as_i32(), ..Self::default() }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapResult {
    pub output: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Healthy,
    Unhealthy,
    Initializing,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthState {
    pub name: String,
    pub health: Health,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealthStates {
    pub component: String,
    pub states: Vec<HealthState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentEvent {
    pub name: String,
    pub unix_seconds: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentEvents {
    pub component: String,
    pub start_time_unix_ms: i64,
    pub end_time_unix_ms: i64,
    pub events: Vec<ComponentEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub labels: HashMap<String, String>,
    pub value: f64,
    pub unix_milliseconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentMetrics {
    pub component: String,
    pub metrics: Vec<Metric>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageInstallState {
    Skipped,
    Installed,
    Installing,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageStatusEntry {
    pub name: String,
    pub install_state: PackageInstallState,
    pub status: String,
}

/// Verbs handled asynchronously: the dispatcher returns immediately and the
/// spawned handler sends its own response.
pub const ASYNC_METHODS: &[&str] = &["triggerComponent", "triggerComponentCheck", "gossip"];

pub fn is_async_method(method: &str) -> bool {
    ASYNC_METHODS.contains(&method)
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
