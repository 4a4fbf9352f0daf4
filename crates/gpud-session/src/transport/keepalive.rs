// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The reconnection supervisor: `keep_alive`.
//!
//! Runs until the session's lifetime token is cancelled, tearing down
//! and rebuilding the reader/writer pair on every reconnect. The
//! reconnect-gate delay here is fixed, not exponential: the failure
//! mode this guards against is overlapping reader/writer pairs racing
//! on the shared queues after a rapid reconnect, not overwhelming a
//! remote service, so backing off further buys nothing.

use std::sync::Arc;

use reqwest::cookie::Jar;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use super::client::{self, Endpoint};
use super::{reader, writer};
use crate::audit::SessionHistory;
use crate::closer::Closer;
use crate::config::SessionTunables;
use crate::model::Body;

/// Everything the supervisor loop needs, wired once at session startup.
pub struct KeepAliveContext {
    pub endpoint: Endpoint,
    pub token_cache: Arc<RwLock<String>>,
    pub closer_slot: Arc<RwLock<Closer>>,
    pub reader_tx: mpsc::Sender<Body>,
    pub reader_rx: Arc<Mutex<mpsc::Receiver<Body>>>,
    pub writer_rx: mpsc::Receiver<Body>,
    pub history: Arc<SessionHistory>,
    pub tunables: SessionTunables,
}

/// Run the supervisor loop until `lifetime` is cancelled.
pub async fn keep_alive(mut ctx: KeepAliveContext, lifetime: CancellationToken) {
    let mut first_iteration = true;

    loop {
        if lifetime.is_cancelled() {
            break;
        }

        // Step 1: reconnect gate.
        if !first_iteration {
            tokio::select! {
                _ = lifetime.cancelled() => break,
                _ = tokio::time::sleep(ctx.tunables.reconnect_delay) => {}
            }
        }
        first_iteration = false;

        // Step 2: generational cleanup.
        let previous = ctx.closer_slot.read().await.clone();
        previous.close();
        tokio::time::sleep(ctx.tunables.generation_teardown_grace).await;
        drain_stale(&ctx.reader_rx).await;

        // Step 3: allocate new generation.
        let generation = Closer::new();
        *ctx.closer_slot.write().await = generation.clone();
        let jar = Arc::new(Jar::default());
        let client = match client::build_client(Arc::clone(&jar)) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "failed to build HTTP client for new generation");
                continue;
            }
        };

        // Step 4: server-affinity probe.
        let token = ctx.token_cache.read().await.clone();
        match client::probe_healthz(&client, &ctx.endpoint, &token).await {
            Ok(()) => ctx.history.record(true, "server-affinity probe succeeded").await,
            Err(e) => {
                ctx.history.record(false, format!("server-affinity probe failed: {e}")).await;
                generation.close();
                continue;
            }
        }

        // Step 5 & 6: spawn the pair, wait for whichever exits first,
        // cancel the other generation's tasks, then wait for it too.
        let reader_handle = tokio::spawn(reader::run(
            client.clone(),
            ctx.endpoint.clone(),
            token.clone(),
            ctx.reader_tx.clone(),
            generation.clone(),
            ctx.tunables.stale_stream_window,
        ));
        let write_fut = writer::run(client, ctx.endpoint.clone(), token, &mut ctx.writer_rx, generation.clone());
        tokio::pin!(write_fut);
        let mut reader_handle = reader_handle;

        tokio::select! {
            _ = &mut reader_handle => {
                generation.close();
                write_fut.await;
            }
            _ = &mut write_fut => {
                generation.close();
                let _ = (&mut reader_handle).await;
            }
        }
    }

    let final_generation = ctx.closer_slot.read().await.clone();
    final_generation.close();
}

/// Non-blockingly drop any messages left over from the dying
/// generation so the dispatcher never sees a request meant for a
/// connection that is already gone.
async fn drain_stale(reader_rx: &Arc<Mutex<mpsc::Receiver<Body>>>) {
    let mut reader_rx = reader_rx.lock().await;
    let mut drained = 0u32;
    while reader_rx.try_recv().is_ok() {
        drained += 1;
    }
    if drained > 0 {
        tracing::debug!(drained, "dropped stale inbound messages during reconnect");
    }
}

#[cfg(test)]
#[path = "keepalive_tests.rs"]
mod tests;
