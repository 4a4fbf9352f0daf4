// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interfaces to the systems this crate treats as external collaborators:
//! component registry, metrics store, metadata store, process runner,
//! updater, host primitives, fault injector, gossip source.
//!
//! None of these are implemented here. Capability probes — optional
//! traits a [`Component`] may additionally implement — model the
//! "some components also expose deregister/mark-healthy/custom-plugin"
//! shape without an inheritance hierarchy.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde_json::Value;

pub use crate::model::{ComponentEvent, HealthState, Metric};

/// The base contract every registered component exposes.
#[async_trait]
pub trait Component: Send + Sync {
    fn name(&self) -> &str;
    fn tags(&self) -> &[String];
    fn is_supported(&self) -> bool;

    /// Run an on-demand check and return the resulting health states.
    async fn check(&self) -> anyhow::Result<Vec<HealthState>>;

    /// Return the most recently observed health states without probing.
    async fn last_health_states(&self) -> Vec<HealthState>;

    /// Return events in `[since, now]`.
    async fn events(&self, since: SystemTime) -> anyhow::Result<Vec<ComponentEvent>>;

    async fn start(&self) -> anyhow::Result<()>;
    async fn close(&self) -> anyhow::Result<()>;

    /// Capability probe: components that can be marked healthy out of band.
    fn as_health_settable(&self) -> Option<&dyn HealthSettable> {
        None
    }

    /// Capability probe: components that may be deregistered and closed.
    fn as_deregisterable(&self) -> Option<&dyn Deregisterable> {
        None
    }

    /// Capability probe: components whose definition came from a
    /// control-plane-pushed plugin spec.
    fn custom_plugin_spec(&self) -> Option<Value> {
        None
    }
}

pub trait HealthSettable: Send + Sync {
    fn mark_healthy(&self) -> anyhow::Result<()>;
}

pub trait Deregisterable: Send + Sync {
    /// Whether this instance currently allows deregistration.
    fn can_deregister(&self) -> bool {
        true
    }
}

/// The dynamic component registry (implemented by the embedder, not here).
#[async_trait]
pub trait ComponentRegistry: Send + Sync {
    fn get(&self, name: &str) -> Option<std::sync::Arc<dyn Component>>;
    fn all(&self) -> Vec<std::sync::Arc<dyn Component>>;
    fn names(&self) -> Vec<String> {
        self.all().iter().map(|c| c.name().to_owned()).collect()
    }

    /// Register a new component under an init function, honoring the
    /// "already registered" conflict.
    async fn register(
        &self,
        name: &str,
        init: Box<dyn FnOnce() -> std::sync::Arc<dyn Component> + Send>,
    ) -> Result<(), RegistryError>;

    async fn deregister(&self, name: &str) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("component already registered: {0}")]
    AlreadyRegistered(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Row shape read back from the metrics store.
pub struct MetricRow {
    pub name: String,
    pub labels: std::collections::HashMap<String, String>,
    pub value: f64,
    pub unix_milliseconds: i64,
}

#[async_trait]
pub trait MetricsStore: Send + Sync {
    async fn read_since(&self, component: &str, since: SystemTime) -> anyhow::Result<Vec<MetricRow>>;
}

impl MetricRow {
    pub fn into_metric(self) -> Metric {
        Metric {
            name: self.name,
            labels: self.labels,
            value: self.value,
            unix_milliseconds: self.unix_milliseconds,
        }
    }
}

/// Key/value metadata table holding at minimum the current bearer token.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    async fn purge_all(&self) -> anyhow::Result<()>;
}

/// Runs bootstrap scripts with a timeout and a detach-grace for
/// descendants that outlive the script.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run_script(
        &self,
        script: &[u8],
        timeout: Duration,
        detach_grace: Duration,
    ) -> anyhow::Result<ScriptOutcome>;
}

pub struct ScriptOutcome {
    pub output: String,
    pub exit_code: i32,
}

/// Software/package updater.
#[async_trait]
pub trait Updater: Send + Sync {
    async fn update_package(&self, package: &str, version: &str) -> anyhow::Result<()>;
    fn is_systemd_managed(&self) -> bool;
}

/// Host reboot/stop primitives.
#[async_trait]
pub trait HostControl: Send + Sync {
    async fn reboot(&self, delay: Duration) -> anyhow::Result<()>;
    async fn stop(&self, delay: Duration) -> anyhow::Result<()>;
    /// Host boot time as Unix seconds, queried directly rather than by
    /// shelling out to `uptime` to avoid locale/timezone hazards.
    async fn boot_unix_seconds(&self) -> anyhow::Result<i64>;
}

/// Fault injector used by `injectFault`.
#[async_trait]
pub trait FaultInjector: Send + Sync {
    async fn inject_kernel_message(&self, message: &str) -> anyhow::Result<()>;
    async fn inject_xid(&self, id: u32) -> anyhow::Result<()>;
}

/// NVML/GPU probe used to assemble gossip payloads.
#[async_trait]
pub trait GossipSource: Send + Sync {
    async fn gossip_payload(&self) -> anyhow::Result<Value>;
}

/// Package manager status/cleanup surface used by `packageStatus`/`delete`.
pub struct PackageState {
    pub name: String,
    pub skipped: bool,
    pub is_installed: bool,
    pub installing: bool,
    pub healthy: bool,
}

#[async_trait]
pub trait PackageManager: Send + Sync {
    async fn status(&self) -> anyhow::Result<Vec<PackageState>>;
    /// Walk the packages directory and create a `needDelete` marker in
    /// each first-level subdirectory.
    async fn mark_all_for_delete(&self) -> anyhow::Result<()>;
}
