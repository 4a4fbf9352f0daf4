// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn retains_at_most_capacity_records() {
    let history = SessionHistory::new(3);
    for i in 0..5 {
        history.record(true, format!("attempt {i}")).await;
    }
    let latest = history.latest().await.unwrap();
    assert_eq!(latest.message, "attempt 4");
}

#[tokio::test]
async fn has_any_failures_reflects_retained_window_only() {
    let history = SessionHistory::new(2);
    history.record(false, "first failure").await;
    assert!(history.has_any_failures().await);

    // Evict the failure by pushing two successes.
    history.record(true, "ok 1").await;
    history.record(true, "ok 2").await;
    assert!(!history.has_any_failures().await);
}

#[tokio::test]
async fn latest_is_none_when_empty() {
    let history = SessionHistory::new(5);
    assert!(history.latest().await.is_none());
}
