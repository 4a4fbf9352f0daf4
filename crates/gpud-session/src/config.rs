// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Internal tunables for the control session.
//!
//! Loading this struct from a file or environment is an embedder concern
//! (CLI argument parsing and config-file loading are out of scope here);
//! the struct and its defaults are the contract this crate relies on.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Depth of the bounded inbound/outbound queues between the transport and
/// the dispatcher.
pub const QUEUE_DEPTH: usize = 20;

/// Host identity that disables the server-affinity health probe.
pub const GATEWAY_HOST: &str = "gpud-gateway";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTunables {
    /// Delay between reconnection attempts (after the first).
    pub reconnect_delay: Duration,
    /// Grace period after closing a generation before draining stale messages.
    pub generation_teardown_grace: Duration,
    /// Maximum silence on the read stream before it is considered stale.
    pub stale_stream_window: Duration,
    /// Per-request and per-fan-out deadline.
    pub request_deadline: Duration,
    /// Post-boot window during which unhealthy states are reported as Initializing.
    pub initialize_grace_period: Duration,
    /// Default lookback window for `metrics` when `since` is zero/unset.
    pub default_metrics_window: Duration,
    /// Default timeout for `bootstrap` when unset.
    pub default_bootstrap_timeout: Duration,
    /// Detach grace the process runner gives bootstrap scripts' descendants.
    pub bootstrap_detach_grace: Duration,
    /// Delay before a delayed-exit restart takes effect, to let the ack response drain.
    pub restart_ack_delay: Duration,
    /// Delay before a token-rotation reconnect takes effect, to let the ack response drain.
    pub token_rotation_reconnect_delay: Duration,
    /// Timeout for the health probe used to validate a rotated token.
    pub token_validation_timeout: Duration,
    /// Fixed delay applied before `reboot`/`logout` host primitives execute.
    pub host_action_delay: Duration,
    /// Number of most-recent login outcomes retained by the session-history store.
    pub history_capacity: usize,
    /// Maximum kernel-message fault payload size, in bytes.
    pub max_kernel_message_bytes: usize,
}

impl Default for SessionTunables {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(3),
            generation_teardown_grace: Duration::from_millis(100),
            stale_stream_window: Duration::from_secs(120),
            request_deadline: Duration::from_secs(60),
            initialize_grace_period: Duration::from_secs(5 * 60),
            default_metrics_window: Duration::from_secs(30 * 60),
            default_bootstrap_timeout: Duration::from_secs(10),
            bootstrap_detach_grace: Duration::from_secs(2 * 60),
            restart_ack_delay: Duration::from_secs(10),
            token_rotation_reconnect_delay: Duration::from_secs(2),
            token_validation_timeout: Duration::from_secs(10),
            host_action_delay: Duration::from_secs(10),
            history_capacity: 10,
            max_kernel_message_bytes: 976,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
