// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request dispatcher: decode, classify, route, respond.
//!
//! [`serve`] owns the loop that pulls decoded `Body` values off the
//! inbound queue and spawns one task per request. [`process_request`]
//! does the actual verb routing and is also reachable directly from
//! tests without going through the queue.

mod handlers;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::audit::{AuditSink, SessionHistory};
use crate::collaborators::{
    Component, ComponentRegistry, FaultInjector, GossipSource, MetadataStore, MetricsStore, PackageManager,
    ProcessRunner, Updater,
};
use crate::config::SessionTunables;
use crate::config_updater::{self, ConfigSetters};
use crate::error::ErrorCode;
use crate::health;
use crate::lifecycle::{self, UpdatePreconditions};
use crate::model::{Body, Request, Response};
use crate::plugins;
use crate::token;

type TokenValidator =
    dyn Fn(String) -> std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>> + Send + Sync;
type PluginFactory = dyn Fn(Value) -> Arc<dyn Component> + Send + Sync;

/// Every collaborator and tunable a running session needs to answer a
/// request. Constructed once per [`crate::session::Session`] and shared
/// across all in-flight request tasks.
pub struct Handlers {
    pub registry: Arc<dyn ComponentRegistry>,
    pub metrics_store: Arc<dyn MetricsStore>,
    pub metadata_store: Option<Arc<dyn MetadataStore>>,
    pub process_runner: Arc<dyn ProcessRunner>,
    pub updater: Arc<dyn Updater>,
    pub host_control: Arc<dyn crate::collaborators::HostControl>,
    pub fault_injector: Option<Arc<dyn FaultInjector>>,
    pub gossip_source: Option<Arc<dyn GossipSource>>,
    pub package_manager: Arc<dyn PackageManager>,
    pub default_components: Vec<String>,
    pub tunables: SessionTunables,
    pub skip_update_config: bool,
    pub config_setters: ConfigSetters,
    pub update_preconditions: UpdatePreconditions,
    /// Shared with the transport supervisor, which reads it fresh on
    /// every reconnect.
    pub token_cache: Arc<RwLock<String>>,
    pub token_validator: Arc<TokenValidator>,
    pub plugin_factory: Arc<PluginFactory>,
    pub audit: Arc<dyn AuditSink>,
    pub history: Arc<SessionHistory>,
    /// The current generation's closer, swapped by the transport
    /// supervisor on every reconnect and shared with it so both sides
    /// agree on which generation is live; `updateToken` closes it to
    /// force a reconnect.
    pub closer_slot: Arc<RwLock<crate::closer::Closer>>,
}

/// Outcome of routing one request: `handled_async` made explicit as a
/// return value instead of an out-parameter.
pub enum Dispatched {
    /// A response is ready now; `restart_exit_code` mirrors the
    /// dispatcher's delayed-exit out-parameter.
    Sync { response: Response, restart_exit_code: Option<i32> },
    /// An async verb: a background task will send its own response.
    Async,
}

/// Run the dispatch loop until `lifetime` is cancelled, spawning one
/// task per inbound `Body`.
///
/// `reader` is shared (not owned outright) because the transport
/// supervisor briefly locks it between generations to drain stale
/// messages left over from a dead connection; the
/// dispatcher and the supervisor never hold the lock at the same time.
pub async fn serve(
    handlers: Arc<Handlers>,
    reader: Arc<Mutex<mpsc::Receiver<Body>>>,
    writer: mpsc::Sender<Body>,
    lifetime: CancellationToken,
) {
    loop {
        let body = {
            let mut reader = reader.lock().await;
            tokio::select! {
                _ = lifetime.cancelled() => break,
                body = reader.recv() => body,
            }
        };
        let Some(body) = body else { break };

        let handlers = Arc::clone(&handlers);
        let writer = writer.clone();
        let lifetime = lifetime.clone();
        tokio::spawn(async move {
            handle_body(&handlers, body, &writer, &lifetime).await;
        });
    }
}

async fn handle_body(handlers: &Handlers, body: Body, writer: &mpsc::Sender<Body>, lifetime: &CancellationToken) {
    let request: Request = match serde_json::from_slice(&body.data) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(req_id = %body.req_id, error = %e, "failed to decode request body");
            return;
        }
    };

    handlers.audit.record_request(&body.req_id, &request.method);

    let req_id = body.req_id.clone();
    let method = request.method.clone();
    let deadline = handlers.tunables.request_deadline;

    if crate::model::is_async_method(&method) {
        process_request_async(handlers, req_id, method, request, writer.clone()).await;
        return;
    }

    let result = tokio::select! {
        _ = lifetime.cancelled() => return,
        r = tokio::time::timeout(deadline, process_request(handlers, &request)) => r,
    };

    let Dispatched::Sync { response, restart_exit_code } = result.unwrap_or_else(|_| Dispatched::Sync {
        response: Response::with_error(ErrorCode::Internal, "request timed out"),
        restart_exit_code: None,
    }) else {
        return;
    };

    send_response(handlers, &req_id, &method, response, writer).await;

    if let Some(exit_code) = restart_exit_code {
        let ack_delay = handlers.tunables.restart_ack_delay;
        let lifetime = lifetime.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = lifetime.cancelled() => {}
                _ = tokio::time::sleep(ack_delay) => {}
            }
            std::process::exit(exit_code);
        });
    }
}

/// Marshal and enqueue a response, tolerating a writer that has already
/// been closed.
async fn send_response(handlers: &Handlers, req_id: &str, method: &str, response: Response, writer: &mpsc::Sender<Body>) {
    let success = response.is_ok();
    let data = match serde_json::to_vec(&response) {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(req_id, method, error = %e, "failed to serialize response");
            return;
        }
    };
    let _ = writer.send(Body { data: data.into(), req_id: req_id.to_owned() }).await;
    handlers.audit.record_response(req_id, method, success);
}

async fn process_request_async(handlers: &Handlers, req_id: String, method: String, request: Request, writer: mpsc::Sender<Body>) {
    let is_known = method == "triggerComponent" || method == "triggerComponentCheck" || method == "gossip";
    if !is_known {
        let response = Response::with_error(ErrorCode::BadRequest, format!("unsupported async method: {method}"));
        send_response(handlers, &req_id, &method, response, &writer).await;
        return;
    }

    let response = match method.as_str() {
        "triggerComponent" | "triggerComponentCheck" => handlers::trigger_component(handlers, &request).await,
        "gossip" => handlers::gossip(handlers).await,
        _ => unreachable!(),
    };
    send_response(handlers, &req_id, &method, response, &writer).await;
}

fn components_or_default(handlers: &Handlers, requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        handlers.default_components.clone()
    } else {
        requested.to_vec()
    }
}

/// Route one decoded request to its handler.
pub async fn process_request(handlers: &Handlers, request: &Request) -> Dispatched {
    let deadline = handlers.tunables.request_deadline;

    let response = match request.method.as_str() {
        "states" => {
            let components = components_or_default(handlers, &request.components);
            match crate::fanout::fan_out_states(&*handlers.registry, components, deadline).await {
                Ok(states) => {
                    let reboot_time = handlers::current_reboot_time(handlers).await;
                    let rewritten =
                        health::apply_reboot_grace(states, reboot_time, handlers.tunables.initialize_grace_period, std::time::SystemTime::now());
                    Response { states: Some(rewritten), ..Response::ok() }
                }
                Err(e) => Response::with_error(ErrorCode::Internal, e.to_string()),
            }
        }
        "events" => {
            let components = components_or_default(handlers, &request.components);
            let start = request.start_time_unix_ms.map(unix_ms_to_system_time);
            let end = request.end_time_unix_ms.map(unix_ms_to_system_time);
            match crate::fanout::fan_out_events(&*handlers.registry, components, start, end, deadline).await {
                Ok(events) => Response { events: Some(events), ..Response::ok() },
                Err(e) => Response::with_error(ErrorCode::Internal, e.to_string()),
            }
        }
        "metrics" => {
            let components = components_or_default(handlers, &request.components);
            let since = match request.since_seconds {
                Some(0) | None => handlers.tunables.default_metrics_window,
                Some(secs) => Duration::from_secs(secs),
            };
            match crate::fanout::fan_out_metrics(Arc::clone(&handlers.metrics_store), components, since, deadline).await {
                Ok(metrics) => Response { metrics: Some(metrics), ..Response::ok() },
                Err(e) => Response::with_error(ErrorCode::Internal, e.to_string()),
            }
        }
        "setHealthy" => handlers::set_healthy(handlers, &request.components).await,
        "delete" => handlers::delete(handlers),
        "reboot" => lifecycle::reboot(handlers.host_control.as_ref(), handlers.tunables.host_action_delay).await,
        "logout" => {
            let Some(metadata) = &handlers.metadata_store else {
                return Dispatched::Sync {
                    response: Response::with_error(ErrorCode::Internal, "metadata store not configured"),
                    restart_exit_code: None,
                };
            };
            lifecycle::logout(metadata.as_ref(), handlers.host_control.as_ref(), handlers.tunables.host_action_delay).await
        }
        "update" => {
            return handle_update(handlers, request).await;
        }
        "updateConfig" => {
            if handlers.skip_update_config {
                Response::ok()
            } else {
                config_updater::apply_update_config(&handlers.config_setters, request.update_config.clone().unwrap_or_default())
            }
        }
        "updateToken" => {
            let Some(new_token) = request.token.clone() else {
                return Dispatched::Sync {
                    response: Response::with_error(ErrorCode::BadRequest, "missing token"),
                    restart_exit_code: None,
                };
            };
            let validator = Arc::clone(&handlers.token_validator);
            let closer = handlers.closer_slot.read().await.clone();
            token::update_token(
                &handlers.token_cache,
                handlers.metadata_store.as_deref(),
                new_token,
                Box::new(move |t| validator(t)),
                handlers.tunables.token_validation_timeout,
                handlers.tunables.token_rotation_reconnect_delay,
                closer,
            )
            .await
        }
        "getToken" => token::get_token(&handlers.token_cache, handlers.metadata_store.as_deref()).await,
        "bootstrap" => handlers::bootstrap(handlers, request).await,
        "deregisterComponent" => {
            let Some(name) = &request.component_name else {
                return Dispatched::Sync {
                    response: Response::with_error(ErrorCode::BadRequest, "missing component_name"),
                    restart_exit_code: None,
                };
            };
            plugins::deregister_component(&*handlers.registry, name).await
        }
        "registerPlugin" => {
            let Some(spec) = request.custom_plugin_spec.clone() else {
                return Dispatched::Sync {
                    response: Response::with_error(ErrorCode::BadRequest, "missing custom_plugin_spec"),
                    restart_exit_code: None,
                };
            };
            let factory = Arc::clone(&handlers.plugin_factory);
            plugins::register_plugin(&*handlers.registry, spec, move |s| factory(s)).await
        }
        "updatePlugin" => {
            let (Some(name), Some(spec)) = (&request.component_name, request.custom_plugin_spec.clone()) else {
                return Dispatched::Sync {
                    response: Response::with_error(ErrorCode::BadRequest, "missing component_name or custom_plugin_spec"),
                    restart_exit_code: None,
                };
            };
            let factory = Arc::clone(&handlers.plugin_factory);
            plugins::update_plugin(&*handlers.registry, name, spec, move |s| factory(s)).await
        }
        "getPlugins" => {
            Response { custom_plugin_specs: Some(plugins::get_plugins(&*handlers.registry).into_iter().map(Value::String).collect()), ..Response::ok() }
        }
        "getPluginSpecs" => Response { custom_plugin_specs: Some(plugins::get_plugin_specs(&*handlers.registry)), ..Response::ok() },
        "setPluginSpecs" => {
            let Some(metadata) = &handlers.metadata_store else {
                return Dispatched::Sync {
                    response: Response::with_error(ErrorCode::Internal, "metadata store not configured"),
                    restart_exit_code: None,
                };
            };
            let specs = request.custom_plugin_specs.clone().unwrap_or_default();
            match plugins::set_plugin_specs(metadata.as_ref(), &specs).await {
                Ok(changed) => {
                    return Dispatched::Sync { response: Response::ok(), restart_exit_code: changed.then_some(0) };
                }
                Err(e) => Response::with_error(ErrorCode::Internal, e.to_string()),
            }
        }
        "loadPluginSpecs" => {
            let Some(metadata) = &handlers.metadata_store else {
                return Dispatched::Sync {
                    response: Response::with_error(ErrorCode::Internal, "metadata store not configured"),
                    restart_exit_code: None,
                };
            };
            match plugins::load_plugin_specs(metadata.as_ref()).await {
                Ok(specs) => Response { custom_plugin_specs: Some(specs), ..Response::ok() },
                Err(e) => Response::with_error(ErrorCode::Internal, e.to_string()),
            }
        }
        "packageStatus" => handlers::package_status(handlers).await,
        "injectFault" => handlers::inject_fault(handlers, request).await,
        _ => Response::ok(),
    };

    Dispatched::Sync { response, restart_exit_code: None }
}

async fn handle_update(handlers: &Handlers, request: &Request) -> Dispatched {
    let Some(version) = &request.update_version else {
        return Dispatched::Sync {
            response: Response::with_error(ErrorCode::BadRequest, "missing update_version"),
            restart_exit_code: None,
        };
    };

    if let Some((package, pkg_version)) = version.split_once(':') {
        let response = lifecycle::update_package(handlers.updater.as_ref(), package, pkg_version).await;
        return Dispatched::Sync { response, restart_exit_code: None };
    }

    let outcome = lifecycle::update_binary(handlers.updater.as_ref(), &handlers.update_preconditions, version);
    Dispatched::Sync { response: outcome.response, restart_exit_code: outcome.restart_exit_code }
}

fn unix_ms_to_system_time(ms: i64) -> std::time::SystemTime {
    if ms >= 0 {
        std::time::SystemTime::UNIX_EPOCH + Duration::from_millis(ms as u64)
    } else {
        std::time::SystemTime::UNIX_EPOCH
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
