// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::time::SystemTime;

use async_trait::async_trait;

use super::*;
use crate::audit::TracingAudit;
use crate::collaborators::{
    ComponentEvent, HealthState, HostControl, MetricRow, PackageState, RegistryError, ScriptOutcome,
};
use crate::closer::Closer;

#[derive(Default)]
struct FakeRegistry {
    components: std::sync::Mutex<HashMap<String, Arc<dyn Component>>>,
}

#[async_trait]
impl ComponentRegistry for FakeRegistry {
    fn get(&self, name: &str) -> Option<Arc<dyn Component>> {
        self.components.lock().unwrap_or_else(|e| e.into_inner()).get(name).cloned()
    }
    fn all(&self) -> Vec<Arc<dyn Component>> {
        self.components.lock().unwrap_or_else(|e| e.into_inner()).values().cloned().collect()
    }
    async fn register(&self, name: &str, init: Box<dyn FnOnce() -> Arc<dyn Component> + Send>) -> Result<(), RegistryError> {
        let mut components = self.components.lock().unwrap_or_else(|e| e.into_inner());
        if components.contains_key(name) {
            return Err(RegistryError::AlreadyRegistered(name.to_owned()));
        }
        components.insert(name.to_owned(), init());
        Ok(())
    }
    async fn deregister(&self, name: &str) -> bool {
        self.components.lock().unwrap_or_else(|e| e.into_inner()).remove(name).is_some()
    }
}

struct FakeMetricsStore;

#[async_trait]
impl MetricsStore for FakeMetricsStore {
    async fn read_since(&self, _component: &str, _since: SystemTime) -> anyhow::Result<Vec<MetricRow>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct FakeMetadataStore {
    entries: StdMutex<HashMap<String, String>>,
}

#[async_trait]
impl MetadataStore for FakeMetadataStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned())
    }
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).insert(key.to_owned(), value.to_owned());
        Ok(())
    }
    async fn purge_all(&self) -> anyhow::Result<()> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
        Ok(())
    }
}

struct FakeProcessRunner;

#[async_trait]
impl ProcessRunner for FakeProcessRunner {
    async fn run_script(&self, _script: &[u8], _timeout: Duration, _detach_grace: Duration) -> anyhow::Result<ScriptOutcome> {
        Ok(ScriptOutcome { output: "done".into(), exit_code: 0 })
    }
}

struct FakeUpdater;

#[async_trait]
impl Updater for FakeUpdater {
    async fn update_package(&self, _package: &str, _version: &str) -> anyhow::Result<()> {
        Ok(())
    }
    fn is_systemd_managed(&self) -> bool {
        true
    }
}

struct FakeHostControl;

#[async_trait]
impl HostControl for FakeHostControl {
    async fn reboot(&self, _delay: Duration) -> anyhow::Result<()> {
        Ok(())
    }
    async fn stop(&self, _delay: Duration) -> anyhow::Result<()> {
        Ok(())
    }
    async fn boot_unix_seconds(&self) -> anyhow::Result<i64> {
        Ok(0)
    }
}

struct FakePackageManager;

#[async_trait]
impl PackageManager for FakePackageManager {
    async fn status(&self) -> anyhow::Result<Vec<PackageState>> {
        Ok(vec![PackageState { name: "gpud".into(), skipped: false, is_installed: true, installing: false, healthy: true }])
    }
    async fn mark_all_for_delete(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

fn test_handlers() -> Handlers {
    Handlers {
        registry: Arc::new(FakeRegistry::default()),
        metrics_store: Arc::new(FakeMetricsStore),
        metadata_store: Some(Arc::new(FakeMetadataStore::default())),
        process_runner: Arc::new(FakeProcessRunner),
        updater: Arc::new(FakeUpdater),
        host_control: Arc::new(FakeHostControl),
        fault_injector: None,
        gossip_source: None,
        package_manager: Arc::new(FakePackageManager),
        default_components: vec!["c1".into()],
        tunables: SessionTunables::default(),
        skip_update_config: false,
        config_setters: ConfigSetters::default(),
        update_preconditions: UpdatePreconditions { enable_auto_update: true, restart_exit_code: Some(0) },
        token_cache: Arc::new(RwLock::new(String::new())),
        token_validator: Arc::new(|_token| Box::pin(async { Ok(()) })),
        plugin_factory: Arc::new(|spec| {
            struct PluginStub {
                spec: Value,
            }
            #[async_trait]
            impl Component for PluginStub {
                fn name(&self) -> &str {
                    "plugin-stub"
                }
                fn tags(&self) -> &[String] {
                    &[]
                }
                fn is_supported(&self) -> bool {
                    true
                }
                async fn check(&self) -> anyhow::Result<Vec<HealthState>> {
                    Ok(Vec::new())
                }
                async fn last_health_states(&self) -> Vec<HealthState> {
                    Vec::new()
                }
                async fn events(&self, _since: SystemTime) -> anyhow::Result<Vec<ComponentEvent>> {
                    Ok(Vec::new())
                }
                async fn start(&self) -> anyhow::Result<()> {
                    Ok(())
                }
                async fn close(&self) -> anyhow::Result<()> {
                    Ok(())
                }
                fn custom_plugin_spec(&self) -> Option<Value> {
                    Some(self.spec.clone())
                }
            }
            Arc::new(PluginStub { spec })
        }),
        audit: Arc::new(TracingAudit),
        history: Arc::new(crate::audit::SessionHistory::new(10)),
        closer_slot: Arc::new(RwLock::new(Closer::new())),
    }
}

fn request(method: &str) -> Request {
    Request { method: method.to_owned(), ..Request::default() }
}

async fn sync_response(handlers: &Handlers, request: Request) -> Response {
    match process_request(handlers, &request).await {
        Dispatched::Sync { response, .. } => response,
        Dispatched::Async => panic!("unexpected async dispatch"),
    }
}

#[tokio::test]
async fn unknown_method_returns_empty_success() {
    let handlers = test_handlers();
    let response = sync_response(&handlers, request("totallyUnknown")).await;
    assert!(response.is_ok());
}

#[tokio::test]
async fn update_config_is_skipped_when_flag_set() {
    let mut handlers = test_handlers();
    handlers.skip_update_config = true;
    let mut req = request("updateConfig");
    req.update_config = Some(HashMap::from([("nfs".to_owned(), "not even json".to_owned())]));
    let response = sync_response(&handlers, req).await;
    assert!(response.is_ok());
}

#[tokio::test]
async fn deregister_component_without_name_is_bad_request() {
    let handlers = test_handlers();
    let response = sync_response(&handlers, request("deregisterComponent")).await;
    assert_eq!(response.error_code, ErrorCode::BadRequest.as_i32());
}

#[tokio::test]
async fn get_token_with_nothing_stored_is_not_found() {
    let handlers = test_handlers();
    let response = sync_response(&handlers, request("getToken")).await;
    assert_eq!(response.error_code, ErrorCode::NotFound.as_i32());
}

#[tokio::test]
async fn package_status_maps_package_manager_state() {
    let handlers = test_handlers();
    let response = sync_response(&handlers, request("packageStatus")).await;
    let entries = response.package_status.expect("package_status populated");
    assert_eq!(entries[0].status, "Healthy");
}

#[tokio::test]
async fn update_with_package_form_delegates_and_does_not_restart() {
    let handlers = test_handlers();
    let mut req = request("update");
    req.update_version = Some("gpud:1.2.3".to_owned());
    match process_request(&handlers, &req).await {
        Dispatched::Sync { response, restart_exit_code } => {
            assert!(response.is_ok());
            assert!(restart_exit_code.is_none());
        }
        Dispatched::Async => panic!("unexpected async dispatch"),
    }
}

#[tokio::test]
async fn update_with_binary_form_requests_restart() {
    let handlers = test_handlers();
    let mut req = request("update");
    req.update_version = Some("1.2.3".to_owned());
    match process_request(&handlers, &req).await {
        Dispatched::Sync { response, restart_exit_code } => {
            assert!(response.is_ok());
            assert_eq!(restart_exit_code, Some(0));
        }
        Dispatched::Async => panic!("unexpected async dispatch"),
    }
}

#[tokio::test]
async fn register_plugin_then_get_plugin_specs_round_trips() {
    let handlers = test_handlers();
    let mut req = request("registerPlugin");
    req.custom_plugin_spec = Some(serde_json::json!({"name": "my-plugin"}));
    let response = sync_response(&handlers, req).await;
    assert!(response.is_ok());

    let specs_response = sync_response(&handlers, request("getPluginSpecs")).await;
    let specs = specs_response.custom_plugin_specs.expect("specs populated");
    assert_eq!(specs.len(), 1);
}

#[tokio::test]
async fn states_request_uses_default_components_when_unset() {
    let handlers = test_handlers();
    let response = sync_response(&handlers, request("states")).await;
    let states = response.states.expect("states populated");
    assert_eq!(states.len(), handlers.default_components.len());
}
