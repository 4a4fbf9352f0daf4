// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reboot-aware health aggregator.
//!
//! Rewrites freshly-booted components' non-healthy states to
//! `Initializing` during a grace period, so the control plane does not
//! see spurious unhealthy states immediately after a reboot.

use std::time::{Duration, SystemTime};

use crate::model::{ComponentHealthStates, Health};

/// The host's reboot time, or "unknown" if it could not be determined
/// or looked implausible (zero or in the future).
#[derive(Debug, Clone, Copy)]
pub enum RebootTime {
    Unknown,
    At(SystemTime),
}

impl RebootTime {
    /// Build from a boot timestamp expressed as Unix seconds, treating
    /// a zero or future timestamp as implausible.
    pub fn from_unix_seconds(boot_unix: i64, now: SystemTime) -> Self {
        if boot_unix <= 0 {
            return Self::Unknown;
        }
        let candidate = SystemTime::UNIX_EPOCH + Duration::from_secs(boot_unix as u64);
        if candidate > now {
            return Self::Unknown;
        }
        Self::At(candidate)
    }
}

/// Rewrite unhealthy states to `Initializing` for components booted
/// within `grace_period`, leaving healthy states and components outside
/// the window untouched.
pub fn apply_reboot_grace(
    mut per_component: Vec<ComponentHealthStates>,
    reboot_time: RebootTime,
    grace_period: Duration,
    now: SystemTime,
) -> Vec<ComponentHealthStates> {
    let RebootTime::At(reboot_time) = reboot_time else {
        return per_component;
    };

    // `reboot_time` is never after `now` by construction (from_unix_seconds
    // already rejects future timestamps), so `elapsed` cannot be negative;
    // the explicit check is kept because this function also accepts callers
    // that construct `RebootTime::At` directly (e.g. tests).
    let Ok(elapsed) = now.duration_since(reboot_time) else {
        return per_component;
    };
    if elapsed >= grace_period {
        return per_component;
    }

    for component in &mut per_component {
        for state in &mut component.states {
            if state.health == Health::Healthy {
                continue;
            }
            if is_deadline_or_cancel(&state.error) {
                tracing::error!(
                    component = %component.component,
                    error = %state.error,
                    "unhealthy state during reboot grace period carries a context error"
                );
            }
            state.health = Health::Initializing;
        }
    }

    per_component
}

fn is_deadline_or_cancel(error: &str) -> bool {
    error.contains("context deadline exceeded") || error.contains("context canceled")
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
