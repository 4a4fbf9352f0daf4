// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level session: owns the lifetime token and wires the transport
//! supervisor to the dispatcher through the shared inbound and
//! outbound queues.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::audit::{AuditSink, SessionHistory, TracingAudit};
use crate::closer::Closer;
use crate::collaborators::{
    Component, ComponentRegistry, FaultInjector, GossipSource, HostControl, MetadataStore, MetricsStore,
    PackageManager, ProcessRunner, Updater,
};
use crate::config::{SessionTunables, QUEUE_DEPTH};
use crate::config_updater::ConfigSetters;
use crate::dispatch::{self, Handlers};
use crate::lifecycle::UpdatePreconditions;
use crate::transport::{self, Endpoint, KeepAliveContext};

type TokenValidator =
    dyn Fn(String) -> std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>> + Send + Sync;
type PluginFactory = dyn Fn(Value) -> Arc<dyn Component> + Send + Sync;

/// Everything an embedder supplies to stand up one session.
pub struct SessionConfig {
    pub control_plane_url: String,
    pub machine_id: String,
    pub initial_token: String,
    pub registry: Arc<dyn ComponentRegistry>,
    pub metrics_store: Arc<dyn MetricsStore>,
    pub metadata_store: Option<Arc<dyn MetadataStore>>,
    pub process_runner: Arc<dyn ProcessRunner>,
    pub updater: Arc<dyn Updater>,
    pub host_control: Arc<dyn HostControl>,
    pub fault_injector: Option<Arc<dyn FaultInjector>>,
    pub gossip_source: Option<Arc<dyn GossipSource>>,
    pub package_manager: Arc<dyn PackageManager>,
    pub default_components: Vec<String>,
    pub tunables: SessionTunables,
    pub skip_update_config: bool,
    pub config_setters: ConfigSetters,
    pub update_preconditions: UpdatePreconditions,
    pub token_validator: Arc<TokenValidator>,
    pub plugin_factory: Arc<PluginFactory>,
    pub audit: Option<Arc<dyn AuditSink>>,
}

/// A running control session: the supervisor and dispatcher tasks plus
/// the handles needed to shut them down cleanly.
pub struct Session {
    lifetime: CancellationToken,
    closer_slot: Arc<RwLock<Closer>>,
    supervisor: tokio::task::JoinHandle<()>,
    dispatcher: tokio::task::JoinHandle<()>,
}

impl Session {
    /// Build and start a session: spawns the transport supervisor and
    /// the dispatch loop, wired to each other through the shared
    /// inbound/outbound queues.
    pub fn start(config: SessionConfig) -> Self {
        let lifetime = CancellationToken::new();
        let history = Arc::new(SessionHistory::new(config.tunables.history_capacity));
        let closer_slot = Arc::new(RwLock::new(Closer::new()));

        let (reader_tx, reader_rx) = mpsc::channel(QUEUE_DEPTH);
        let (writer_tx, writer_rx) = mpsc::channel(QUEUE_DEPTH);
        let reader_rx = Arc::new(Mutex::new(reader_rx));

        let token_cache = Arc::new(RwLock::new(config.initial_token));

        let keepalive_ctx = KeepAliveContext {
            endpoint: Endpoint { control_plane_url: config.control_plane_url, machine_id: config.machine_id },
            token_cache: Arc::clone(&token_cache),
            closer_slot: Arc::clone(&closer_slot),
            reader_tx,
            reader_rx: Arc::clone(&reader_rx),
            writer_rx,
            history: Arc::clone(&history),
            tunables: config.tunables.clone(),
        };
        let supervisor = tokio::spawn(transport::keep_alive(keepalive_ctx, lifetime.child_token()));

        let handlers = Arc::new(Handlers {
            registry: config.registry,
            metrics_store: config.metrics_store,
            metadata_store: config.metadata_store,
            process_runner: config.process_runner,
            updater: config.updater,
            host_control: config.host_control,
            fault_injector: config.fault_injector,
            gossip_source: config.gossip_source,
            package_manager: config.package_manager,
            default_components: config.default_components,
            tunables: config.tunables,
            skip_update_config: config.skip_update_config,
            config_setters: config.config_setters,
            update_preconditions: config.update_preconditions,
            token_cache,
            token_validator: config.token_validator,
            plugin_factory: config.plugin_factory,
            audit: config.audit.unwrap_or_else(|| Arc::new(TracingAudit)),
            history,
            closer_slot: Arc::clone(&closer_slot),
        });

        let dispatcher = tokio::spawn(dispatch::serve(handlers, reader_rx, writer_tx, lifetime.child_token()));

        Self { lifetime, closer_slot, supervisor, dispatcher }
    }

    /// Cancel the session's lifetime token, close the live generation,
    /// and wait for both tasks to drain. After this returns no further
    /// requests are dispatched.
    pub async fn stop(self) {
        self.lifetime.cancel();
        self.closer_slot.read().await.close();
        let _ = tokio::join!(self.supervisor, self.dispatcher);
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
