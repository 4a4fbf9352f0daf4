// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Writer task: stream outbound `Body` objects as the `write` stream's
//! request body.

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::client::{self, Endpoint};
use crate::closer::Closer;
use crate::model::Body;

/// Run the writer for one generation. `writer_rx` is shared with the
/// supervisor across generations (it outlives any single connection),
/// so this only ever borrows it — the request and the encode loop run
/// concurrently on the same task rather than as a spawned pair, since
/// the encode loop can't be `'static` while holding that borrow.
///
/// Exits when the closer fires or the write fails; either way the
/// chunk sender is dropped as `encode_loop` returns, which ends the
/// HTTP request body stream.
pub async fn run(client: reqwest::Client, endpoint: Endpoint, token: String, writer_rx: &mut mpsc::Receiver<Body>, closer: Closer) {
    let (chunk_tx, chunk_rx) = mpsc::channel::<reqwest::Result<Bytes>>(1);
    let body = reqwest::Body::wrap_stream(ReceiverStream::new(chunk_rx));

    let send_request = client::open_write_stream(&client, &endpoint, &token, body);
    let encode = encode_loop(chunk_tx, writer_rx, closer);

    let (result, ()) = tokio::join!(send_request, encode);
    match result {
        Ok(resp) if !resp.status().is_success() => {
            tracing::debug!(status = %resp.status(), "write stream rejected, reconnecting");
        }
        Err(e) => tracing::debug!(error = %e, "write stream failed, reconnecting"),
        Ok(_) => {}
    }
}

async fn encode_loop(chunk_tx: mpsc::Sender<reqwest::Result<Bytes>>, writer_rx: &mut mpsc::Receiver<Body>, closer: Closer) {
    loop {
        let body = tokio::select! {
            _ = closer.closed() => break,
            body = writer_rx.recv() => body,
        };
        let Some(body) = body else { break };

        let mut line = match serde_json::to_vec(&body) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode outbound body");
                continue;
            }
        };
        line.push(b'\n');
        if chunk_tx.send(Ok(Bytes::from(line))).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
