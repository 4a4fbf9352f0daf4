// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reader task: decode newline-delimited `Body` objects off the `read`
//! stream and hand each to the dispatcher's inbound queue.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::{Buf, BytesMut};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::client::{self, Endpoint};
use crate::closer::Closer;
use crate::model::Body;

fn now_unix_ms() -> i64 {
    SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

/// Timestamp of the last successfully enqueued package, polled by the
/// stale-stream watchdog.
struct LastPackage(AtomicI64);

impl LastPackage {
    fn new() -> Self {
        Self(AtomicI64::new(now_unix_ms()))
    }

    fn touch(&self) {
        self.0.store(now_unix_ms(), Ordering::Relaxed);
    }

    fn elapsed(&self) -> Duration {
        let delta = (now_unix_ms() - self.0.load(Ordering::Relaxed)).max(0);
        Duration::from_millis(delta as u64)
    }
}

/// Run the reader for one generation. Returns once the stream ends, the
/// closer fires, or the stale-stream watchdog aborts the connection.
pub async fn run(
    client: reqwest::Client,
    endpoint: Endpoint,
    token: String,
    reader_tx: mpsc::Sender<Body>,
    closer: Closer,
    stale_window: Duration,
) {
    let response = match client::open_read_stream(&client, &endpoint, &token).await {
        Ok(r) if r.status().is_success() => r,
        Ok(r) => {
            tracing::debug!(status = %r.status(), "read stream rejected, reconnecting");
            return;
        }
        Err(e) => {
            tracing::debug!(error = %e, "failed to open read stream");
            return;
        }
    };

    let last_package = Arc::new(LastPackage::new());
    let watchdog_cancel = CancellationToken::new();
    let watchdog = tokio::spawn(stale_stream_watchdog(Arc::clone(&last_package), stale_window, watchdog_cancel.clone()));

    let mut buffer = BytesMut::new();
    let mut stream = response.bytes_stream();

    loop {
        let chunk = tokio::select! {
            _ = closer.closed() => break,
            _ = watchdog_cancel.cancelled() => break,
            chunk = stream.next() => chunk,
        };
        let Some(chunk) = chunk else { break };
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(error = %e, "read stream error, reconnecting");
                break;
            }
        };
        buffer.extend_from_slice(&chunk);

        while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
            let line = buffer.split_to(pos);
            buffer.advance(1);
            if line.is_empty() {
                continue;
            }
            match serde_json::from_slice::<Body>(&line) {
                Ok(body) => {
                    last_package.touch();
                    if !offer(&reader_tx, body) {
                        watchdog.abort();
                        return;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "failed to decode body from read stream"),
            }
        }
    }

    watchdog.abort();
}

/// Offer one decoded `Body` to the inbound queue without blocking the
/// decoder: a full queue drops the message and logs, it never stalls
/// the stream. Returns `false` once the queue itself is gone.
fn offer(reader_tx: &mpsc::Sender<Body>, body: Body) -> bool {
    match reader_tx.try_send(body) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!("reader channel full, dropping message");
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

async fn stale_stream_watchdog(last_package: Arc<LastPackage>, stale_window: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                if last_package.elapsed() > stale_window {
                    tracing::warn!("read stream stale, aborting");
                    cancel.cancel();
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
