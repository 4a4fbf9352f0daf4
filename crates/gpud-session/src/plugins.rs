// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin lifecycle: register/update/deregister a component, and
//! persist/reload the set of custom plugin specs.

use std::sync::Arc;

use serde_json::Value;

use crate::collaborators::{Component, ComponentRegistry, MetadataStore, RegistryError};
use crate::error::ErrorCode;
use crate::model::Response;

const PLUGIN_SPECS_KEY: &str = "custom_plugin_specs";

fn plugin_name(spec: &Value) -> Result<&str, Response> {
    spec.get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Response::with_error(ErrorCode::BadRequest, "plugin spec missing \"name\""))
}

/// `registerPlugin`: conflicts with an existing registration are
/// surfaced as 409, never silently replaced. On success the new
/// component is started before the response is returned.
pub async fn register_plugin(
    registry: &dyn ComponentRegistry,
    spec: Value,
    factory: impl FnOnce(Value) -> Arc<dyn Component> + Send + 'static,
) -> Response {
    let name = match plugin_name(&spec) {
        Ok(n) => n.to_owned(),
        Err(resp) => return resp,
    };

    match registry.register(&name, Box::new(move || factory(spec))).await {
        Ok(()) => {
            if let Some(component) = registry.get(&name) {
                if let Err(e) = component.start().await {
                    return Response::with_error(ErrorCode::Internal, format!("plugin failed to start: {e}"));
                }
            }
            Response::ok()
        }
        Err(RegistryError::AlreadyRegistered(name)) => {
            Response::with_error(ErrorCode::Conflict, format!("plugin already registered: {name}"))
        }
        Err(RegistryError::Other(e)) => Response::with_error(ErrorCode::Internal, e.to_string()),
    }
}

/// `updatePlugin`: deregisters the existing instance, closes it, then
/// registers the replacement. No rollback is attempted if the new
/// registration fails — the component is left absent. Intentional, not
/// an oversight.
pub async fn update_plugin(
    registry: &dyn ComponentRegistry,
    name: &str,
    spec: Value,
    factory: impl FnOnce(Value) -> Arc<dyn Component> + Send + 'static,
) -> Response {
    let Some(existing) = registry.get(name) else {
        return Response::with_error(ErrorCode::NotFound, format!("plugin not found: {name}"));
    };
    registry.deregister(name).await;
    if let Err(e) = existing.close().await {
        tracing::warn!(component = %name, error = %e, "failed to close previous plugin instance during updatePlugin");
    }
    register_plugin(registry, spec, factory).await
}

/// `deregisterComponent`: only allowed for components that
/// opt into it via the `Deregisterable` capability probe, and only
/// deregistered from the registry once `close` has actually succeeded.
pub async fn deregister_component(registry: &dyn ComponentRegistry, name: &str) -> Response {
    let Some(component) = registry.get(name) else {
        return Response::with_error(ErrorCode::NotFound, format!("component not found: {name}"));
    };

    match component.as_deregisterable() {
        Some(d) if d.can_deregister() => {}
        _ => {
            return Response::with_error(
                ErrorCode::BadRequest,
                format!("component does not support deregistration: {name}"),
            )
        }
    }

    if let Err(e) = component.close().await {
        return Response::with_error(ErrorCode::Internal, format!("failed to close component: {e}"));
    }
    registry.deregister(name).await;
    Response::ok()
}

/// `getPlugins`: names of components that were registered from a
/// plugin spec.
pub fn get_plugins(registry: &dyn ComponentRegistry) -> Vec<String> {
    registry
        .all()
        .into_iter()
        .filter(|c| c.custom_plugin_spec().is_some())
        .map(|c| c.name().to_owned())
        .collect()
}

/// `getPluginSpecs`: the specs themselves, one per plugin component.
pub fn get_plugin_specs(registry: &dyn ComponentRegistry) -> Vec<Value> {
    registry.all().into_iter().filter_map(|c| c.custom_plugin_spec()).collect()
}

/// `setPluginSpecs`: persists the full spec set for reload across
/// restarts. Returns whether the stored set actually changed, so the
/// dispatcher can decide whether a restart is warranted.
pub async fn set_plugin_specs(metadata: &dyn MetadataStore, specs: &[Value]) -> anyhow::Result<bool> {
    let encoded = serde_json::to_string(specs)?;
    let previous = metadata.get(PLUGIN_SPECS_KEY).await?;
    let changed = previous.as_deref() != Some(encoded.as_str());
    metadata.set(PLUGIN_SPECS_KEY, &encoded).await?;
    Ok(changed)
}

/// `loadPluginSpecs`: reads the persisted spec set, defaulting to
/// empty when nothing was ever stored.
pub async fn load_plugin_specs(metadata: &dyn MetadataStore) -> anyhow::Result<Vec<Value>> {
    match metadata.get(PLUGIN_SPECS_KEY).await? {
        Some(encoded) => Ok(serde_json::from_str(&encoded)?),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
#[path = "plugins_tests.rs"]
mod tests;
