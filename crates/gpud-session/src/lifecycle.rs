// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `update`, `reboot`, `logout`.
//!
//! `update` has two forms: a package update (delegates to the
//! `Updater` collaborator and runs inline) and a binary self-update
//! (only valid when auto-update is enabled, the process is
//! systemd-managed, and a restart exit code was configured — it never
//! runs the update itself, it only arranges the delayed exit that lets
//! the supervisor restart the binary).

use std::time::Duration;

use crate::collaborators::{HostControl, MetadataStore, Updater};
use crate::error::ErrorCode;
use crate::model::Response;

/// Preconditions gating the binary self-update path, owned by the
/// session rather than this module.
pub struct UpdatePreconditions {
    pub enable_auto_update: bool,
    pub restart_exit_code: Option<i32>,
}

/// Outcome of an `update` request: a response plus, for the binary
/// self-update path, the exit code the dispatcher's delayed-exit task
/// should use.
pub struct UpdateOutcome {
    pub response: Response,
    pub restart_exit_code: Option<i32>,
}

impl UpdateOutcome {
    fn ok(response: Response) -> Self {
        Self { response, restart_exit_code: None }
    }
}

/// `update` for an explicit package name (e.g. a component's own
/// package): delegates synchronously to the updater.
pub async fn update_package(updater: &dyn Updater, package: &str, version: &str) -> Response {
    match updater.update_package(package, version).await {
        Ok(()) => Response::ok(),
        Err(e) => Response::with_error(ErrorCode::Internal, e.to_string()),
    }
}

/// `update` with no package name: a binary self-update. Never arranges
/// the exit itself — it hands the preconfigured exit code back so the
/// dispatcher's generic delayed-exit task can let the ack
/// response drain first.
pub fn update_binary(updater: &dyn Updater, preconditions: &UpdatePreconditions, version: &str) -> UpdateOutcome {
    if version.is_empty() {
        return UpdateOutcome::ok(Response::with_error(ErrorCode::BadRequest, "version must not be empty"));
    }
    if !preconditions.enable_auto_update {
        return UpdateOutcome::ok(Response::with_error(ErrorCode::BadRequest, "auto-update is disabled"));
    }
    if !updater.is_systemd_managed() && preconditions.restart_exit_code.is_none() {
        return UpdateOutcome::ok(Response::with_error(
            ErrorCode::BadRequest,
            "process is not systemd-managed and no restart exit code is configured",
        ));
    }
    let Some(exit_code) = preconditions.restart_exit_code else {
        return UpdateOutcome::ok(Response::with_error(ErrorCode::BadRequest, "no restart exit code configured"));
    };

    UpdateOutcome { response: Response::ok(), restart_exit_code: Some(exit_code) }
}

/// `reboot`: delegates to the host control collaborator with a fixed
/// delay, surfacing any scheduling failure as `Response.error` rather
/// than only logging it.
pub async fn reboot(host: &dyn HostControl, delay: Duration) -> Response {
    match host.reboot(delay).await {
        Ok(()) => Response::ok(),
        Err(e) => Response::with_error(ErrorCode::Internal, e.to_string()),
    }
}

/// `logout`: purges all stored metadata, then stops the host-managed
/// workload with the same fixed delay. A purge failure is logged and
/// does not block the stop attempt; a stop failure is surfaced as
/// `Response.error`.
pub async fn logout(metadata: &dyn MetadataStore, host: &dyn HostControl, delay: Duration) -> Response {
    if let Err(e) = metadata.purge_all().await {
        tracing::error!(error = %e, "metadata purge failed during logout");
    }
    match host.stop(delay).await {
        Ok(()) => Response::ok(),
        Err(e) => Response::with_error(ErrorCode::Internal, e.to_string()),
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
