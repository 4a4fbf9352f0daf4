// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;

use super::*;

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

fn ok_validate(_token: String) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> {
    Box::pin(async { Ok(()) })
}

fn reject_validate(_token: String) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> {
    Box::pin(async { Err(anyhow::anyhow!("nope")) })
}

#[tokio::test]
async fn rejects_empty_token() {
    let cache = RwLock::new(String::new());
    let metadata = FakeMetadataStore::default();
    let response = update_token(
        &cache,
        Some(&metadata),
        String::new(),
        Box::new(ok_validate),
        Duration::from_secs(1),
        Duration::from_millis(1),
        Closer::new(),
    )
    .await;
    assert_eq!(response.error_code, ErrorCode::BadRequest.as_i32());
}

#[tokio::test]
async fn cache_hit_is_a_no_op() {
    let cache = RwLock::new("same-token".to_owned());
    let metadata = FakeMetadataStore::default();
    let response = update_token(
        &cache,
        Some(&metadata),
        "same-token".to_owned(),
        Box::new(|_| panic!("validate should not be called on a cache hit")),
        Duration::from_secs(1),
        Duration::from_millis(1),
        Closer::new(),
    )
    .await;
    assert!(response.is_ok());
}

#[tokio::test]
async fn missing_metadata_store_is_an_error() {
    let cache = RwLock::new(String::new());
    let response = update_token(
        &cache,
        None,
        "new-token".to_owned(),
        Box::new(ok_validate),
        Duration::from_secs(1),
        Duration::from_millis(1),
        Closer::new(),
    )
    .await;
    assert_eq!(response.error_code, ErrorCode::Internal.as_i32());
}

#[tokio::test]
async fn failed_validation_rejects_with_unauthorized() {
    let cache = RwLock::new(String::new());
    let metadata = FakeMetadataStore::default();
    let response = update_token(
        &cache,
        Some(&metadata),
        "new-token".to_owned(),
        Box::new(reject_validate),
        Duration::from_secs(1),
        Duration::from_millis(1),
        Closer::new(),
    )
    .await;
    assert_eq!(response.error_code, ErrorCode::Unauthorized.as_i32());
    assert_eq!(*cache.read().await, "");
}

#[tokio::test]
async fn successful_update_persists_and_closes_after_delay() {
    let cache = RwLock::new(String::new());
    let metadata = FakeMetadataStore::default();
    let closer = Closer::new();
    let response = update_token(
        &cache,
        Some(&metadata),
        "new-token".to_owned(),
        Box::new(ok_validate),
        Duration::from_secs(1),
        Duration::from_millis(5),
        closer.clone(),
    )
    .await;
    assert!(response.is_ok());
    assert_eq!(*cache.read().await, "new-token");
    assert_eq!(metadata.get(METADATA_TOKEN_KEY).await.unwrap().as_deref(), Some("new-token"));
    assert!(!closer.is_closed());
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(closer.is_closed());
}

#[tokio::test]
async fn get_token_serves_from_cache() {
    let cache = RwLock::new("cached".to_owned());
    let response = get_token(&cache, None).await;
    assert_eq!(response.token.as_deref(), Some("cached"));
}

#[tokio::test]
async fn get_token_falls_back_to_metadata_store_and_repopulates_cache() {
    let cache = RwLock::new(String::new());
    let metadata = FakeMetadataStore::default();
    metadata.set(METADATA_TOKEN_KEY, "stored").await.unwrap();

    let response = get_token(&cache, Some(&metadata)).await;
    assert_eq!(response.token.as_deref(), Some("stored"));
    assert_eq!(*cache.read().await, "stored");
}

#[tokio::test]
async fn get_token_with_nothing_cached_or_stored_is_not_found() {
    let cache = RwLock::new(String::new());
    let metadata = FakeMetadataStore::default();
    let response = get_token(&cache, Some(&metadata)).await;
    assert_eq!(response.error_code, ErrorCode::NotFound.as_i32());
}
