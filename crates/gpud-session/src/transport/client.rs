// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-generation HTTP client construction and request builders.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::{Client, Response};

use crate::config::GATEWAY_HOST;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
const HEALTHZ_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity of the control plane this session talks to.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub control_plane_url: String,
    pub machine_id: String,
}

impl Endpoint {
    fn session_url(&self) -> String {
        format!("{}/api/v1/session", self.control_plane_url.trim_end_matches('/'))
    }

    fn healthz_url(&self) -> String {
        format!("{}/healthz", self.control_plane_url.trim_end_matches('/'))
    }

    /// The gateway identity load-balances internally and has no single
    /// replica to pin via cookie, so the server-affinity probe is
    /// skipped for it.
    fn is_gateway(&self) -> bool {
        reqwest::Url::parse(&self.control_plane_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h == GATEWAY_HOST))
            .unwrap_or(false)
    }
}

/// Build a fresh HTTP client for one connection generation. Keep-alives
/// are disabled (`pool_max_idle_per_host(0)`): each direction is a
/// single long-lived request, so pooled reuse only complicates failure
/// semantics. `jar` scopes cookies to this generation so read, write,
/// and the health probe stick to the same control-plane replica.
pub fn build_client(jar: Arc<Jar>) -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_max_idle_per_host(0)
        .cookie_provider(jar)
        .build()
}

fn apply_headers(
    req: reqwest::RequestBuilder,
    endpoint: &Endpoint,
    token: &str,
    session_type: Option<&str>,
) -> reqwest::RequestBuilder {
    let req = req
        .header("X-GPUD-Machine-ID", &endpoint.machine_id)
        .header("machine_id", &endpoint.machine_id)
        .bearer_auth(token)
        .header("token", token);
    match session_type {
        Some(t) => req.header("X-GPUD-Session-Type", t).header("session_type", t),
        None => req,
    }
}

/// Open the `read` stream: the agent sends no body; the
/// response body is a stream of newline-delimited `Body` objects.
pub async fn open_read_stream(client: &Client, endpoint: &Endpoint, token: &str) -> reqwest::Result<Response> {
    let req = client.post(endpoint.session_url());
    apply_headers(req, endpoint, token, Some("read")).send().await
}

/// Open the `write` stream with `body` as the streamed
/// request body.
pub async fn open_write_stream(
    client: &Client,
    endpoint: &Endpoint,
    token: &str,
    body: reqwest::Body,
) -> reqwest::Result<Response> {
    let req = client.post(endpoint.session_url()).body(body);
    apply_headers(req, endpoint, token, Some("write")).send().await
}

/// `GET {control_plane}/healthz`. Populates
/// `client`'s cookie jar on success. Skipped entirely for the gateway
/// host identity.
pub async fn probe_healthz(client: &Client, endpoint: &Endpoint, token: &str) -> anyhow::Result<()> {
    if endpoint.is_gateway() {
        return Ok(());
    }
    let req = client.get(endpoint.healthz_url()).timeout(HEALTHZ_TIMEOUT);
    let resp = apply_headers(req, endpoint, token, None).send().await?;
    resp.error_for_status().map(|_| ()).map_err(anyhow::Error::from)
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
