// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `updateConfig` handler.
//!
//! The per-component "apply default X" operations are dependency-injected
//! as [`ConfigSetters`] callbacks rather than wired directly, so the
//! handler can tolerate an absent setter and an embedder can supply only
//! the components it actually runs.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ErrorCode;
use crate::model::Response;

#[derive(Debug, Deserialize)]
pub struct InfinibandConfig {
    pub at_least_ports: u32,
    pub at_least_rate: u32,
}

#[derive(Debug, Deserialize)]
pub struct NvlinkConfig {
    pub at_least_gpus_with_all_links_feature_enabled: u32,
}

#[derive(Debug, Deserialize)]
pub struct GpuCountsConfig {
    pub count: u32,
}

#[derive(Debug, Deserialize)]
pub struct XidConfig {
    pub threshold: u32,
}

#[derive(Debug, Deserialize)]
pub struct TemperatureConfig {
    pub celsius_slowdown_margin: i32,
}

type Setter<T> = Arc<dyn Fn(T) -> anyhow::Result<()> + Send + Sync>;
type NameSetter = Arc<dyn Fn(&str) -> anyhow::Result<()> + Send + Sync>;
type NfsValidate = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;
type NfsApply = Arc<dyn Fn(Value) -> anyhow::Result<()> + Send + Sync>;

/// Dependency-injected per-component setter callbacks. Every field is
/// optional; an absent setter is silently skipped.
#[derive(Default, Clone)]
pub struct ConfigSetters {
    pub infiniband: Option<Setter<InfinibandConfig>>,
    pub nvlink: Option<Setter<NvlinkConfig>>,
    pub gpu_counts: Option<Setter<GpuCountsConfig>>,
    pub error_xid: Option<Setter<XidConfig>>,
    pub temperature: Option<Setter<TemperatureConfig>>,
    pub nfs_validate: Option<NfsValidate>,
    pub nfs_apply: Option<NfsApply>,
    /// Best-effort "apply empty defaults" fallback, called for every
    /// component name regardless of whether a named setter matched.
    /// Intentional defensive sweep, not a bug.
    pub fallback: Option<NameSetter>,
}

const COMPONENT_INFINIBAND: &str = "accelerator-nvidia-infiniband";
const COMPONENT_NVLINK: &str = "accelerator-nvidia-nvlink";
const COMPONENT_GPU_COUNTS: &str = "accelerator-nvidia-gpu-counts";
const COMPONENT_ERROR_XID: &str = "accelerator-nvidia-error-xid";
const COMPONENT_TEMPERATURE: &str = "accelerator-nvidia-temperature";
const COMPONENT_NFS: &str = "nfs";

/// Apply an `updateConfig` payload. Malformed JSON in any entry is
/// surfaced as `Response.error`; semantic validation failures are only
/// logged.
pub fn apply_update_config(setters: &ConfigSetters, update: HashMap<String, String>) -> Response {
    let mut first_error: Option<String> = None;

    for (name, payload) in update {
        let value: Value = match serde_json::from_str(&payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(component = %name, error = %e, "malformed updateConfig payload");
                first_error.get_or_insert_with(|| format!("{name}: invalid JSON: {e}"));
                continue;
            }
        };

        apply_named(setters, &name, &value);

        if let Some(fallback) = &setters.fallback {
            if let Err(e) = fallback(&name) {
                tracing::warn!(component = %name, error = %e, "fallback default-apply failed");
            }
        }
    }

    match first_error {
        Some(msg) => Response::with_error(ErrorCode::BadRequest, msg),
        None => Response::ok(),
    }
}

fn apply_named(setters: &ConfigSetters, name: &str, value: &Value) {
    match name {
        COMPONENT_INFINIBAND => {
            apply_typed(setters.infiniband.as_ref(), name, value);
        }
        COMPONENT_NVLINK => {
            apply_typed(setters.nvlink.as_ref(), name, value);
        }
        COMPONENT_GPU_COUNTS => {
            apply_typed(setters.gpu_counts.as_ref(), name, value);
        }
        COMPONENT_ERROR_XID => {
            apply_typed(setters.error_xid.as_ref(), name, value);
        }
        COMPONENT_TEMPERATURE => {
            apply_typed(setters.temperature.as_ref(), name, value);
        }
        COMPONENT_NFS => {
            apply_nfs(setters, value.clone());
        }
        _ => {}
    }
}

fn apply_typed<T: for<'de> Deserialize<'de>>(setter: Option<&Setter<T>>, name: &str, value: &Value) {
    let Some(setter) = setter else { return };
    match serde_json::from_value::<T>(value.clone()) {
        Ok(parsed) => {
            if let Err(e) = setter(parsed) {
                tracing::warn!(component = %name, error = %e, "config setter failed");
            }
        }
        Err(e) => {
            tracing::warn!(component = %name, error = %e, "config payload did not match expected schema");
        }
    }
}

/// NFS validation touches the filesystem, so it (and the subsequent
/// apply) run on a background task.
fn apply_nfs(setters: &ConfigSetters, value: Value) {
    let validate = setters.nfs_validate.clone();
    let apply = setters.nfs_apply.clone();
    tokio::spawn(async move {
        if let Some(validate) = validate {
            if let Err(e) = validate(&value) {
                tracing::warn!(error = %e, "nfs config validation failed");
            }
        }
        if let Some(apply) = apply {
            if let Err(e) = apply(value) {
                tracing::warn!(error = %e, "nfs config apply failed");
            }
        }
    });
}

#[cfg(test)]
#[path = "config_updater_tests.rs"]
mod tests;
