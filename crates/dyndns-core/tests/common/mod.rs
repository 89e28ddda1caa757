//! Test doubles and common utilities for reconciliation contract tests
//!
//! The mock provider keeps an in-memory zone, counts every call and can be
//! told to fail or to stall, so tests can observe retries and overlap.

#![allow(dead_code)]

use async_trait::async_trait;
use dyndns_core::config::{DdnsConfig, HostConfig, ProviderConfig};
use dyndns_core::error::{Error, Result};
use dyndns_core::traits::{AppliedRecord, DnsProvider, ProviderHandle, ResolvedRecord};
use dyndns_core::{Host, Reconciler, RetryPolicy};
use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a scripted call should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Transport failure, retried by the reconciler
    Network,
    /// Provider rejected the call, not retried
    Provider,
    /// Provider accepted but echoes this address
    Echo(Ipv4Addr),
}

/// In-memory provider with call accounting
///
/// Records live in a map keyed by `"record-<fqdn>"`. Resolving a name that
/// does not exist creates it with `0.0.0.0`, like the token-style backend.
pub struct MockDnsProvider {
    name: &'static str,
    records: Mutex<HashMap<String, Ipv4Addr>>,
    failures: Mutex<VecDeque<Failure>>,
    latency: Duration,
    resolve_calls: AtomicUsize,
    apply_calls: AtomicUsize,
    created: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    log: Mutex<Vec<String>>,
}

impl MockDnsProvider {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            records: Mutex::new(HashMap::new()),
            failures: Mutex::new(VecDeque::new()),
            latency: Duration::ZERO,
            resolve_calls: AtomicUsize::new(0),
            apply_calls: AtomicUsize::new(0),
            created: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Pre-populate a record
    pub fn with_record(self, fqdn: &str, ip: Ipv4Addr) -> Self {
        self.records.lock().unwrap().insert(record_id(fqdn), ip);
        self
    }

    /// Stall every call for `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail the next calls, in order
    pub fn fail_next(&self, failures: impl IntoIterator<Item = Failure>) {
        self.failures.lock().unwrap().extend(failures);
    }

    /// Fail every call from now on
    pub fn fail_always(&self, failure: Failure) {
        self.fail_next(std::iter::repeat_n(failure, 64));
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.resolve_calls() + self.apply_calls()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were executing at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Content the provider holds for `fqdn`
    pub fn record(&self, fqdn: &str) -> Option<Ipv4Addr> {
        self.records.lock().unwrap().get(&record_id(fqdn)).copied()
    }

    /// Ordered call log, e.g. `["resolve foo.example.com", "apply 192.0.2.1"]`
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    async fn enter(&self, entry: String) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.log.lock().unwrap().push(entry);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        InFlight(&self.in_flight)
    }

    fn next_failure(&self) -> Option<Failure> {
        self.failures.lock().unwrap().pop_front()
    }

    fn next_failure_unless_echo(&self) -> Option<Failure> {
        let mut failures = self.failures.lock().unwrap();
        match failures.front() {
            Some(Failure::Echo(_)) | None => None,
            Some(_) => failures.pop_front(),
        }
    }

    fn fail(&self, failure: Failure) -> Error {
        match failure {
            Failure::Network => Error::network(self.name, "connection refused"),
            Failure::Provider | Failure::Echo(_) => {
                Error::provider(self.name, r#"{"success":false,"errors":[{"code":9109}]}"#)
            }
        }
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn record_id(fqdn: &str) -> String {
    format!("record-{}", fqdn)
}

#[async_trait]
impl DnsProvider for MockDnsProvider {
    async fn resolve_current_ip(&self, host: &HostConfig) -> Result<ResolvedRecord> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter(format!("resolve {}", host.fqdn())).await;

        // Echo failures only apply to writes
        if let Some(failure) = self.next_failure_unless_echo() {
            return Err(self.fail(failure));
        }

        let id = record_id(&host.fqdn());
        let mut records = self.records.lock().unwrap();
        let current = match records.get(&id) {
            Some(ip) => *ip,
            None => {
                self.created.fetch_add(1, Ordering::SeqCst);
                records.insert(id.clone(), Ipv4Addr::UNSPECIFIED);
                Ipv4Addr::UNSPECIFIED
            }
        };

        Ok(ResolvedRecord {
            handle: ProviderHandle::Record {
                zone_id: format!("zone-{}", host.zone),
                record_id: id,
            },
            current_ip: Some(current),
        })
    }

    async fn apply_ip(&self, handle: &ProviderHandle, ip: Ipv4Addr) -> Result<AppliedRecord> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter(format!("apply {}", ip)).await;

        let echoed = match self.next_failure() {
            Some(Failure::Echo(other)) => other,
            Some(failure) => return Err(self.fail(failure)),
            None => ip,
        };

        let ProviderHandle::Record { record_id, .. } = handle else {
            return Err(Error::not_found(format!("no record for {}", handle)));
        };
        self.records.lock().unwrap().insert(record_id.clone(), echoed);

        Ok(AppliedRecord {
            echoed_ip: Some(echoed),
        })
    }

    fn known_handle(&self, host: &HostConfig) -> Option<ProviderHandle> {
        match (&host.zone_id, &host.record_id) {
            (Some(zone_id), Some(record_id)) => Some(ProviderHandle::Record {
                zone_id: zone_id.clone(),
                record_id: record_id.clone(),
            }),
            _ => None,
        }
    }

    fn provider_name(&self) -> &'static str {
        self.name
    }
}

/// A reconciler over `provider` with the default retry schedule
pub fn reconciler(provider: &Arc<MockDnsProvider>) -> Reconciler {
    Reconciler::new(provider.clone(), RetryPolicy::default())
}

/// A host with no cached state
pub fn host(hostname: &str) -> Arc<Host> {
    Arc::new(Host::new(HostConfig::new(hostname, "example.com", "secret")))
}

/// Configuration with a custom provider and the given hosts
pub fn config_with_hosts(hosts: Vec<HostConfig>) -> DdnsConfig {
    hosts.into_iter().fold(
        DdnsConfig::new(ProviderConfig::Custom {
            factory: "mock".to_string(),
            config: serde_json::json!({}),
        }),
        DdnsConfig::with_host,
    )
}

pub const IP_A: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 1);
pub const IP_B: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 2);
pub const IP_C: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 3);
