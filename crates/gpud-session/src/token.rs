// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer-token lifecycle: `updateToken`/`getToken`.
//!
//! A rotated token is validated against the control plane (via an
//! injected health probe, since constructing the HTTP client is a
//! transport concern) before it is persisted and adopted, and the
//! current connection is only torn down — forcing a reconnect under the
//! new token — after a short delay so the ack response can drain.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::closer::Closer;
use crate::collaborators::MetadataStore;
use crate::error::ErrorCode;
use crate::model::Response;

const METADATA_TOKEN_KEY: &str = "token";

type Validate<'a> = Box<dyn FnOnce(String) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send + 'a>;

/// `updateToken`. `validate` probes the control plane with the
/// candidate token and the caller is responsible for any timeout beyond
/// `validation_timeout`; this function enforces `validation_timeout` as
/// an outer bound regardless.
pub async fn update_token(
    cache: &RwLock<String>,
    metadata: Option<&dyn MetadataStore>,
    new_token: String,
    validate: Validate<'_>,
    validation_timeout: Duration,
    reconnect_delay: Duration,
    closer: Closer,
) -> Response {
    if new_token.is_empty() {
        return Response::with_error(ErrorCode::BadRequest, "token must not be empty");
    }

    if *cache.read().await == new_token {
        return Response::ok();
    }

    let Some(metadata) = metadata else {
        return Response::with_error(ErrorCode::Internal, "metadata store not configured");
    };

    match tokio::time::timeout(validation_timeout, validate(new_token.clone())).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Response::with_error(ErrorCode::Unauthorized, format!("token rejected: {e}")),
        Err(_) => return Response::with_error(ErrorCode::Unauthorized, "token validation timed out"),
    }

    if let Err(e) = metadata.set(METADATA_TOKEN_KEY, &new_token).await {
        return Response::with_error(ErrorCode::Internal, format!("failed to persist token: {e}"));
    }

    *cache.write().await = new_token;

    tokio::spawn(async move {
        tokio::time::sleep(reconnect_delay).await;
        closer.close();
    });

    Response::ok()
}

/// `getToken`: serves from the in-memory cache, falling back to
/// the metadata store (and repopulating the cache) on a cold start.
pub async fn get_token(cache: &RwLock<String>, metadata: Option<&dyn MetadataStore>) -> Response {
    {
        let current = cache.read().await;
        if !current.is_empty() {
            return Response { token: Some(current.clone()), ..Response::ok() };
        }
    }

    let Some(metadata) = metadata else {
        return Response::with_error(ErrorCode::NotFound, "no token available");
    };

    match metadata.get(METADATA_TOKEN_KEY).await {
        Ok(Some(token)) => {
            *cache.write().await = token.clone();
            Response { token: Some(token), ..Response::ok() }
        }
        Ok(None) => Response::with_error(ErrorCode::NotFound, "no token available"),
        Err(e) => Response::with_error(ErrorCode::Internal, format!("failed to read token: {e}")),
    }
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
