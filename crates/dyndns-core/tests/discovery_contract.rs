//! Contract: Discovery and Write-back
//!
//! Constraints verified:
//! - Loading discovers identifiers for hosts that lack them, once
//! - A missing record is created with placeholder content, then updated
//! - Discovered identifiers are persisted and reused on the next start
//! - A restarted registry with stored identifiers skips discovery at load
//! - The first request after a restart reads the record before writing

mod common;

use common::*;
use dyndns_core::config::HostConfig;
use dyndns_core::traits::ConfigStore;
use dyndns_core::{FileConfigStore, HostRegistry, UpdateResult};
use std::net::Ipv4Addr;
use std::sync::Arc;

#[tokio::test]
async fn missing_record_is_created_then_updated() {
    let provider = Arc::new(MockDnsProvider::new("mock"));
    let config = config_with_hosts(vec![HostConfig::new("new", "example.com", "secret")]);
    let dir = tempfile::tempdir().unwrap();
    let store = FileConfigStore::new(dir.path().join("config.json"));
    store.save(&config).await.unwrap();

    let registry = HostRegistry::load(&store, config, provider.as_ref()).await.unwrap();
    assert_eq!(provider.created(), 1);

    let host = registry.authorize("new.example.com", Some("secret")).unwrap();
    assert_eq!(host.last_known_ip().await, Some(Ipv4Addr::UNSPECIFIED));

    let result = reconciler(&provider).reconcile(&host, IP_A).await.unwrap();
    assert_eq!(
        result,
        UpdateResult::Updated {
            previous_ip: Some(Ipv4Addr::UNSPECIFIED),
            new_ip: IP_A
        }
    );
    assert_eq!(provider.record("new.example.com"), Some(IP_A));
    assert_eq!(provider.resolve_calls(), 1, "handle from loading is reused");
}

#[tokio::test]
async fn stored_identifiers_skip_discovery_after_restart() {
    let provider = Arc::new(MockDnsProvider::new("mock").with_record("foo.example.com", IP_A));
    let dir = tempfile::tempdir().unwrap();
    let store = FileConfigStore::new(dir.path().join("config.json"));
    store
        .save(&config_with_hosts(vec![HostConfig::new("foo", "example.com", "secret")]))
        .await
        .unwrap();

    // First start discovers and writes back
    let config = store.load().await.unwrap();
    HostRegistry::load(&store, config, provider.as_ref()).await.unwrap();
    assert_eq!(provider.resolve_calls(), 1);

    let persisted = store.load().await.unwrap();
    assert_eq!(persisted.hosts[0].zone_id.as_deref(), Some("zone-example.com"));
    assert_eq!(persisted.hosts[0].record_id.as_deref(), Some("record-foo.example.com"));
    assert_eq!(persisted.hosts[0].token, "secret");

    // Second start uses the stored identifiers
    let registry = HostRegistry::load(&store, persisted, provider.as_ref()).await.unwrap();
    assert_eq!(provider.resolve_calls(), 1);

    // Nothing is cached yet, so the first request reads the record by id
    let host = registry.lookup("foo.example.com").unwrap();
    let result = reconciler(&provider).reconcile(&host, IP_B).await.unwrap();
    assert_eq!(
        result,
        UpdateResult::Updated {
            previous_ip: Some(IP_A),
            new_ip: IP_B
        }
    );
    assert_eq!(provider.resolve_calls(), 2);
    assert_eq!(provider.record("foo.example.com"), Some(IP_B));
}

#[tokio::test]
async fn stored_identifiers_do_not_skip_the_first_read() {
    let provider = Arc::new(MockDnsProvider::new("mock").with_record("foo.example.com", IP_B));
    let host = HostConfig::new("foo", "example.com", "secret")
        .with_ids("zone-example.com", "record-foo.example.com");
    let config = config_with_hosts(vec![host]);
    let dir = tempfile::tempdir().unwrap();
    let store = FileConfigStore::new(dir.path().join("config.json"));
    store.save(&config).await.unwrap();

    let registry = HostRegistry::load(&store, config, provider.as_ref()).await.unwrap();
    assert_eq!(provider.resolve_calls(), 0, "handle comes from the stored ids");

    let host = registry.lookup("foo.example.com").unwrap();
    let result = reconciler(&provider).reconcile(&host, IP_B).await.unwrap();

    assert_eq!(result, UpdateResult::Unchanged { current_ip: IP_B });
    assert_eq!(provider.resolve_calls(), 1);
    assert_eq!(provider.apply_calls(), 0, "record already holds the address");
    assert_eq!(host.last_known_ip().await, Some(IP_B));
}
