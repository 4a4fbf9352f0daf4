// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::model::HealthState;

fn unhealthy(name: &str) -> ComponentHealthStates {
    ComponentHealthStates {
        component: name.to_owned(),
        states: vec![HealthState {
            name: "s".into(),
            health: Health::Unhealthy,
            reason: "bad".into(),
            error: String::new(),
        }],
    }
}

#[test]
fn unknown_reboot_time_disables_rewrite() {
    let now = SystemTime::now();
    let out = apply_reboot_grace(vec![unhealthy("c1")], RebootTime::Unknown, Duration::from_secs(300), now);
    assert_eq!(out[0].states[0].health, Health::Unhealthy);
}

#[test]
fn zero_and_future_boot_times_become_unknown() {
    let now = SystemTime::now();
    assert!(matches!(RebootTime::from_unix_seconds(0, now), RebootTime::Unknown));
    let future = now + Duration::from_secs(3600);
    let future_unix = future.duration_since(SystemTime::UNIX_EPOCH).unwrap().as_secs() as i64;
    assert!(matches!(RebootTime::from_unix_seconds(future_unix, now), RebootTime::Unknown));
}

#[test]
fn within_grace_period_rewrites_to_initializing() {
    let now = SystemTime::now();
    let reboot_unix =
        (now - Duration::from_secs(60)).duration_since(SystemTime::UNIX_EPOCH).unwrap().as_secs() as i64;
    let reboot = RebootTime::from_unix_seconds(reboot_unix, now);
    let out = apply_reboot_grace(vec![unhealthy("c1")], reboot, Duration::from_secs(300), now);
    assert_eq!(out[0].states[0].health, Health::Initializing);
    assert_eq!(out[0].states[0].reason, "bad");
}

#[test]
fn exactly_at_grace_boundary_is_not_rewritten() {
    let now = SystemTime::now();
    let reboot_time = now - Duration::from_secs(300);
    let out =
        apply_reboot_grace(vec![unhealthy("c1")], RebootTime::At(reboot_time), Duration::from_secs(300), now);
    assert_eq!(out[0].states[0].health, Health::Unhealthy);
}

#[test]
fn just_inside_grace_boundary_is_rewritten() {
    let now = SystemTime::now();
    let reboot_time = now - Duration::from_millis(299_999);
    let out =
        apply_reboot_grace(vec![unhealthy("c1")], RebootTime::At(reboot_time), Duration::from_secs(300), now);
    assert_eq!(out[0].states[0].health, Health::Initializing);
}

#[test]
fn healthy_states_pass_through_unchanged() {
    let now = SystemTime::now();
    let healthy = ComponentHealthStates {
        component: "c1".into(),
        states: vec![HealthState {
            name: "s".into(),
            health: Health::Healthy,
            reason: String::new(),
            error: String::new(),
        }],
    };
    let reboot_time = now - Duration::from_secs(10);
    let out = apply_reboot_grace(vec![healthy], RebootTime::At(reboot_time), Duration::from_secs(300), now);
    assert_eq!(out[0].states[0].health, Health::Healthy);
}
