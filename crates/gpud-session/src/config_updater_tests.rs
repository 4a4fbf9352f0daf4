// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use super::*;

#[test]
fn malformed_json_is_surfaced_as_response_error() {
    let setters = ConfigSetters::default();
    let mut update = HashMap::new();
    update.insert(COMPONENT_INFINIBAND.to_owned(), "{not json".to_owned());

    let response = apply_update_config(&setters, update);
    assert!(!response.is_ok());
    assert_eq!(response.error_code, ErrorCode::BadRequest.as_i32());
}

#[test]
fn absent_setter_is_silently_skipped() {
    let setters = ConfigSetters::default();
    let mut update = HashMap::new();
    update.insert(COMPONENT_GPU_COUNTS.to_owned(), r#"{"count": 8}"#.to_owned());

    let response = apply_update_config(&setters, update);
    assert!(response.is_ok());
}

#[test]
fn matching_setter_receives_parsed_payload() {
    let seen = Arc::new(AtomicU32::new(0));
    let seen_clone = Arc::clone(&seen);
    let setters = ConfigSetters {
        gpu_counts: Some(Arc::new(move |cfg: GpuCountsConfig| {
            seen_clone.store(cfg.count, Ordering::SeqCst);
            Ok(())
        })),
        ..Default::default()
    };
    let mut update = HashMap::new();
    update.insert(COMPONENT_GPU_COUNTS.to_owned(), r#"{"count": 8}"#.to_owned());

    let response = apply_update_config(&setters, update);
    assert!(response.is_ok());
    assert_eq!(seen.load(Ordering::SeqCst), 8);
}

#[test]
fn fallback_runs_even_when_named_setter_matched() {
    let fallback_calls = Arc::new(AtomicU32::new(0));
    let fallback_calls_clone = Arc::clone(&fallback_calls);
    let setters = ConfigSetters {
        gpu_counts: Some(Arc::new(|_: GpuCountsConfig| Ok(()))),
        fallback: Some(Arc::new(move |_name| {
            fallback_calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })),
        ..Default::default()
    };
    let mut update = HashMap::new();
    update.insert(COMPONENT_GPU_COUNTS.to_owned(), r#"{"count": 8}"#.to_owned());

    apply_update_config(&setters, update);
    assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn unknown_component_only_invokes_fallback() {
    let fallback_calls = Arc::new(AtomicU32::new(0));
    let fallback_calls_clone = Arc::clone(&fallback_calls);
    let setters = ConfigSetters {
        fallback: Some(Arc::new(move |_name| {
            fallback_calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })),
        ..Default::default()
    };
    let mut update = HashMap::new();
    update.insert("some-unrelated-component".to_owned(), "{}".to_owned());

    let response = apply_update_config(&setters, update);
    assert!(response.is_ok());
    assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn nfs_apply_runs_in_background() {
    let applied = Arc::new(AtomicU32::new(0));
    let applied_clone = Arc::clone(&applied);
    let setters = ConfigSetters {
        nfs_apply: Some(Arc::new(move |_value| {
            applied_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })),
        ..Default::default()
    };
    let mut update = HashMap::new();
    update.insert(COMPONENT_NFS.to_owned(), "[]".to_owned());

    apply_update_config(&setters, update);
    tokio::task::yield_now().await;
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    assert_eq!(applied.load(Ordering::SeqCst), 1);
}
