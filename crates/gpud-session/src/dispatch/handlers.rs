// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-verb handlers that are simple enough not to warrant their own
//! top-level module: `setHealthy`, `delete`, `bootstrap`, `packageStatus`,
//! `injectFault`, `triggerComponent`, `gossip`.

use base64::Engine;

use super::Handlers;
use crate::model::{
    BootstrapResult, InjectFaultRequest, PackageInstallState, PackageStatusEntry, Request, Response,
};
use crate::error::ErrorCode;
use crate::health::RebootTime;
use crate::model::{ComponentHealthStates, Health, HealthState};

/// `setHealthy`: per-component failures are logged, never surfaced.
pub async fn set_healthy(handlers: &Handlers, components: &[String]) -> Response {
    for name in components {
        let Some(component) = handlers.registry.get(name) else { continue };
        let Some(settable) = component.as_health_settable() else { continue };
        if let Err(e) = settable.mark_healthy() {
            tracing::warn!(component = %name, error = %e, "setHealthy failed");
        }
    }
    Response::ok()
}

/// `delete`: marks packages for deletion in the background; the
/// package manager reaps them on its next cycle.
pub fn delete(handlers: &Handlers) -> Response {
    let package_manager = handlers.package_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = package_manager.mark_all_for_delete().await {
            tracing::warn!(error = %e, "delete: failed to mark packages for deletion");
        }
    });
    Response::ok()
}

/// `bootstrap`: base64-decodes the script and runs it with a
/// detach-grace so forked descendants survive the script's own exit.
pub async fn bootstrap(handlers: &Handlers, request: &Request) -> Response {
    let Some(bootstrap) = &request.bootstrap else {
        return Response::with_error(ErrorCode::BadRequest, "missing bootstrap payload");
    };

    let script = match base64::engine::general_purpose::STANDARD.decode(&bootstrap.script_base64) {
        Ok(bytes) => bytes,
        Err(e) => return Response::with_error(ErrorCode::BadRequest, format!("invalid script_base64: {e}")),
    };

    let timeout = if bootstrap.timeout_in_seconds == 0 {
        handlers.tunables.default_bootstrap_timeout
    } else {
        std::time::Duration::from_secs(bootstrap.timeout_in_seconds)
    };

    match handlers.process_runner.run_script(&script, timeout, handlers.tunables.bootstrap_detach_grace).await {
        Ok(outcome) => Response {
            bootstrap: Some(BootstrapResult { output: outcome.output, exit_code: outcome.exit_code }),
            ..Response::ok()
        },
        Err(e) => Response::with_error(ErrorCode::Internal, e.to_string()),
    }
}

/// `packageStatus`.
pub async fn package_status(handlers: &Handlers) -> Response {
    match handlers.package_manager.status().await {
        Ok(states) => {
            let entries = states
                .into_iter()
                .map(|s| PackageStatusEntry {
                    name: s.name,
                    install_state: if s.skipped {
                        PackageInstallState::Skipped
                    } else if s.installing {
                        PackageInstallState::Installing
                    } else if s.is_installed {
                        PackageInstallState::Installed
                    } else {
                        PackageInstallState::Unknown
                    },
                    status: if s.healthy { "Healthy".to_owned() } else { "Unhealthy".to_owned() },
                })
                .collect();
            Response { package_status: Some(entries), ..Response::ok() }
        }
        Err(e) => Response::with_error(ErrorCode::Internal, e.to_string()),
    }
}

/// `injectFault`.
pub async fn inject_fault(handlers: &Handlers, request: &Request) -> Response {
    let Some(fault) = &request.inject_fault_request else {
        return Response::with_error(ErrorCode::BadRequest, "missing inject_fault_request");
    };

    let Some(injector) = &handlers.fault_injector else {
        return Response::with_error(ErrorCode::Internal, "fault injector is not initialized");
    };

    let result = match fault {
        InjectFaultRequest::KernelMessage { message } => {
            let message = message.clone().unwrap_or_default();
            if message.is_empty() {
                return Response::with_error(ErrorCode::BadRequest, "kernel message must not be empty");
            }
            if message.len() > handlers.tunables.max_kernel_message_bytes {
                return Response::with_error(
                    ErrorCode::BadRequest,
                    format!("kernel message exceeds {} bytes", handlers.tunables.max_kernel_message_bytes),
                );
            }
            injector.inject_kernel_message(&message).await
        }
        InjectFaultRequest::Xid { id } => {
            if *id == 0 {
                return Response::with_error(ErrorCode::BadRequest, "xid must be greater than zero");
            }
            injector.inject_xid(*id).await
        }
    };

    match result {
        Ok(()) => Response::ok(),
        Err(e) => Response::with_error(ErrorCode::Internal, e.to_string()),
    }
}

/// `triggerComponent` (alias `triggerComponentCheck`): targeted
/// on-demand check, run as the async verb's background task.
pub async fn trigger_component(handlers: &Handlers, request: &Request) -> Response {
    if let Some(name) = &request.component_name {
        let Some(component) = handlers.registry.get(name) else {
            return Response::with_error(ErrorCode::NotFound, format!("component not found: {name}"));
        };
        let states = component.check().await.unwrap_or_default();
        return Response {
            states: Some(vec![ComponentHealthStates { component: name.clone(), states }]),
            ..Response::ok()
        };
    }

    if let Some(tag) = &request.tag_name {
        let mut out = Vec::new();
        for component in handlers.registry.all() {
            if !component.tags().iter().any(|t| t == tag) {
                continue;
            }
            let states = component.check().await.unwrap_or_else(|e| {
                vec![HealthState {
                    name: component.name().to_owned(),
                    health: Health::Unknown,
                    reason: String::new(),
                    error: e.to_string(),
                }]
            });
            out.push(ComponentHealthStates { component: component.name().to_owned(), states });
        }
        return Response { states: Some(out), ..Response::ok() };
    }

    Response { states: Some(Vec::new()), ..Response::ok() }
}

/// `gossip`, run as the async verb's background task.
pub async fn gossip(handlers: &Handlers) -> Response {
    let Some(source) = &handlers.gossip_source else {
        return Response::with_error(ErrorCode::Internal, "gossip source is not configured");
    };
    match source.gossip_payload().await {
        Ok(payload) => Response { gossip_request: Some(payload), ..Response::ok() },
        Err(e) => Response::with_error(ErrorCode::Internal, e.to_string()),
    }
}

/// Shared boot-time lookup used by the `states` handler.
pub async fn current_reboot_time(handlers: &Handlers) -> RebootTime {
    match handlers.host_control.boot_unix_seconds().await {
        Ok(unix) => RebootTime::from_unix_seconds(unix, std::time::SystemTime::now()),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read host boot time");
            RebootTime::Unknown
        }
    }
}
