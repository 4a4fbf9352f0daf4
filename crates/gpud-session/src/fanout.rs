// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Query fan-out for `states`/`events`/`metrics`.
//!
//! Each requested component is queried on its own task; results are
//! collected through a bounded channel sized to the component count and
//! the whole fan-out is bounded by a single deadline. Concurrency is
//! intentionally unbounded — the component count is small and each call
//! is expected to be fast.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::collaborators::{ComponentRegistry, MetricsStore};
use crate::model::{ComponentEvent, ComponentEvents, ComponentHealthStates, ComponentMetrics, HealthState};

/// `states` fan-out: default-list substitution happens in the caller.
pub async fn fan_out_states(
    registry: &dyn ComponentRegistry,
    requested: Vec<String>,
    deadline: Duration,
) -> anyhow::Result<Vec<ComponentHealthStates>> {
    let components: Vec<_> = requested
        .into_iter()
        .map(|name| (name.clone(), registry.get(&name)))
        .collect();

    let (tx, mut rx) = mpsc::channel(components.len().max(1));
    for (name, component) in components.clone() {
        let tx = tx.clone();
        tokio::spawn(async move {
            let states = match component {
                Some(c) => c.last_health_states().await,
                None => vec![HealthState {
                    name: name.clone(),
                    health: crate::model::Health::Unknown,
                    reason: "component not found".into(),
                    error: String::new(),
                }],
            };
            let _ = tx.send(ComponentHealthStates { component: name, states }).await;
        });
    }
    drop(tx);

    let n = components.len();
    let mut results = Vec::with_capacity(n);
    timeout(deadline, async {
        while let Some(r) = rx.recv().await {
            results.push(r);
            if results.len() == n {
                break;
            }
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("states fan-out deadline exceeded"))?;

    Ok(results)
}

/// `events` fan-out: defaults `start`/`end` to `now` when both are
/// zero, and preserves the requested window even when the component is
/// missing or errors.
pub async fn fan_out_events(
    registry: &dyn ComponentRegistry,
    requested: Vec<String>,
    start: Option<SystemTime>,
    end: Option<SystemTime>,
    deadline: Duration,
) -> anyhow::Result<Vec<ComponentEvents>> {
    let now = SystemTime::now();
    let start = start.unwrap_or(now);
    let end = end.unwrap_or(now);
    let start_ms = to_unix_ms(start);
    let end_ms = to_unix_ms(end);

    let (tx, mut rx) = mpsc::channel(requested.len().max(1));
    for name in requested.clone() {
        let component = registry.get(&name);
        let tx = tx.clone();
        tokio::spawn(async move {
            let events: Vec<ComponentEvent> = match component {
                Some(c) => c.events(start).await.unwrap_or_default(),
                None => Vec::new(),
            };
            let _ = tx
                .send(ComponentEvents { component: name, start_time_unix_ms: start_ms, end_time_unix_ms: end_ms, events })
                .await;
        });
    }
    drop(tx);

    let n = requested.len();
    let mut results = Vec::with_capacity(n);
    timeout(deadline, async {
        while let Some(r) = rx.recv().await {
            results.push(r);
            if results.len() == n {
                break;
            }
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("events fan-out deadline exceeded"))?;

    Ok(results)
}

/// `metrics` fan-out: reads from the metrics store, not the
/// component, filtered by `since = now - since` (default 30 min).
pub async fn fan_out_metrics(
    store: Arc<dyn MetricsStore>,
    requested: Vec<String>,
    since: Duration,
    deadline: Duration,
) -> anyhow::Result<Vec<ComponentMetrics>> {
    let cutoff = SystemTime::now() - since;

    let (tx, mut rx) = mpsc::channel(requested.len().max(1));
    for name in requested.clone() {
        let store = Arc::clone(&store);
        let tx = tx.clone();
        tokio::spawn(async move {
            let rows = store.read_since(&name, cutoff).await.unwrap_or_default();
            let metrics = rows.into_iter().map(|r| r.into_metric()).collect();
            let _ = tx.send(ComponentMetrics { component: name, metrics }).await;
        });
    }
    drop(tx);

    let n = requested.len();
    let mut results = Vec::with_capacity(n);
    timeout(deadline, async {
        while let Some(r) = rx.recv().await {
            results.push(r);
            if results.len() == n {
                break;
            }
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("metrics fan-out deadline exceeded"))?;

    Ok(results)
}

fn to_unix_ms(t: SystemTime) -> i64 {
    t.duration_since(SystemTime::UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

#[cfg(test)]
#[path = "fanout_tests.rs"]
mod tests;
