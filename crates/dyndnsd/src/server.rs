//! `GET /dyndns` update endpoint
//!
//! Response bodies are fixed strings; the reason behind a non-200 answer is
//! logged server-side only.

use std::net::SocketAddr;
use std::sync::Arc;

use dyndns_core::{
    Error, HostRegistry, QueryParams, Reconciler, RequestScheme, UpdateResult, validate_query,
};
use rocket::config::LogLevel;
use rocket::http::Status;
use rocket::http::uri::Origin;
use rocket::{Build, Rocket, State, get, routes};
use tracing::{info, warn};

/// Body of a successful (or unchanged) update
pub const BODY_SUCCESS: &str = "success";
/// Body for validation failures
pub const BODY_BAD_REQUEST: &str = "Missing or invalid parameter(s)";
/// Body for unknown names and wrong tokens
pub const BODY_FORBIDDEN: &str = "Not authorized to set this fqdn";
/// Body for everything else
pub const BODY_INTERNAL: &str = "Something unexpected happened";

/// Shared state of the endpoint, immutable after startup
#[derive(Debug)]
pub struct AppState {
    pub registry: Arc<HostRegistry>,
    pub reconciler: Reconciler,
    pub scheme: RequestScheme,
}

/// Status code and body for a failed request
pub fn response_for(error: &Error) -> (Status, &'static str) {
    match error {
        Error::Validation(_) => (Status::BadRequest, BODY_BAD_REQUEST),
        Error::Authorization(_) | Error::NotFound(_) => (Status::Forbidden, BODY_FORBIDDEN),
        _ => (Status::InternalServerError, BODY_INTERNAL),
    }
}

#[get("/dyndns")]
async fn dyndns(origin: &Origin<'_>, state: &State<AppState>) -> (Status, &'static str) {
    let params: QueryParams = origin
        .query()
        .map(|query| query.segments().collect())
        .unwrap_or_default();

    match handle(state, params).await {
        Ok(UpdateResult::Unchanged { current_ip }) => {
            info!(ip = %current_ip, "Update request: unchanged");
            (Status::Ok, BODY_SUCCESS)
        }
        Ok(UpdateResult::Updated { previous_ip, new_ip }) => {
            info!(previous = ?previous_ip, ip = %new_ip, "Update request: updated");
            (Status::Ok, BODY_SUCCESS)
        }
        Err(e) => {
            let (status, body) = response_for(&e);
            warn!(status = status.code, "Update request rejected: {}", e);
            (status, body)
        }
    }
}

/// Validate, authorize and reconcile one request
///
/// The reconciliation runs on its own task so a client that disconnects
/// mid-request cannot cancel a provider mutation halfway.
async fn handle(state: &AppState, params: QueryParams) -> dyndns_core::Result<UpdateResult> {
    let request = validate_query(&params, state.scheme)?;
    let host = state.registry.authorize(&request.fqdn, request.token.as_deref())?;

    info!(fqdn = %host.fqdn(), ip = %request.ip, "Update requested");

    let reconciler = state.reconciler.clone();
    tokio::spawn(async move { reconciler.reconcile(&host, request.ip).await })
        .await
        .map_err(|e| Error::Other(format!("reconciliation task failed: {}", e)))?
}

/// Build the Rocket application
///
/// Rocket's own logging is switched off; outcomes go through `tracing`.
pub fn build(state: AppState, listen: SocketAddr) -> Rocket<Build> {
    let config = rocket::Config {
        address: listen.ip(),
        port: listen.port(),
        log_level: LogLevel::Off,
        ..rocket::Config::default()
    };

    rocket::custom(config)
        .manage(state)
        .mount("/", routes![dyndns])
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dyndns_core::config::{AuthMode, HostConfig};
    use dyndns_core::traits::{AppliedRecord, DnsProvider, ProviderHandle, ResolvedRecord};
    use dyndns_core::RetryPolicy;
    use rocket::local::asynchronous::Client;
    use std::net::Ipv4Addr;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Provider holding one record per FQDN, failing for hosts named "down"
    #[derive(Default)]
    struct RecordingProvider {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingProvider {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DnsProvider for RecordingProvider {
        async fn resolve_current_ip(&self, host: &HostConfig) -> dyndns_core::Result<ResolvedRecord> {
            self.calls.lock().unwrap().push(format!("resolve {}", host.fqdn()));
            if host.hostname == "down" {
                return Err(Error::provider("recording", "zone is locked"));
            }
            Ok(ResolvedRecord {
                handle: ProviderHandle::Name {
                    hostname: host.hostname.clone(),
                    domain: host.zone.clone(),
                },
                current_ip: Some(Ipv4Addr::new(192, 0, 2, 1)),
            })
        }

        async fn apply_ip(&self, handle: &ProviderHandle, ip: Ipv4Addr) -> dyndns_core::Result<AppliedRecord> {
            self.calls.lock().unwrap().push(format!("apply {} {}", handle, ip));
            Ok(AppliedRecord { echoed_ip: Some(ip) })
        }

        fn known_handle(&self, _host: &HostConfig) -> Option<ProviderHandle> {
            None
        }

        fn provider_name(&self) -> &'static str {
            "recording"
        }
    }

    async fn client(auth: AuthMode, provider: Arc<RecordingProvider>) -> Client {
        let registry = HostRegistry::new(
            vec![
                HostConfig::new("foo", "example.com", "abc"),
                HostConfig::new("down", "example.com", "abc"),
            ],
            auth,
        )
        .unwrap();
        let state = AppState {
            registry: Arc::new(registry),
            reconciler: Reconciler::new(provider, RetryPolicy::new(5, Duration::from_millis(1))),
            scheme: RequestScheme::from(auth),
        };
        Client::tracked(build(state, "127.0.0.1:0".parse().unwrap()))
            .await
            .unwrap()
    }

    async fn get(client: &Client, uri: &str) -> (Status, String) {
        let response = client.get(uri.to_string()).dispatch().await;
        let status = response.status();
        (status, response.into_string().await.unwrap_or_default())
    }

    #[rocket::async_test]
    async fn valid_request_updates_then_is_idempotent() {
        let provider = Arc::new(RecordingProvider::default());
        let client = client(AuthMode::Token, provider.clone()).await;

        let uri = "/dyndns?fqdn=foo.example.com&ipv4=203.0.113.5&token=abc";
        assert_eq!(get(&client, uri).await, (Status::Ok, BODY_SUCCESS.to_string()));
        assert_eq!(
            provider.calls(),
            vec![
                "resolve foo.example.com".to_string(),
                "apply foo.example.com 203.0.113.5".to_string()
            ]
        );

        assert_eq!(get(&client, uri).await, (Status::Ok, BODY_SUCCESS.to_string()));
        assert_eq!(provider.calls().len(), 2, "repeat is answered from the cache");
    }

    #[rocket::async_test]
    async fn invalid_parameters_are_rejected_before_any_provider_call() {
        let provider = Arc::new(RecordingProvider::default());
        let client = client(AuthMode::Token, provider.clone()).await;

        for uri in [
            "/dyndns",
            "/dyndns?fqdn=foo.example.com&token=abc",
            "/dyndns?fqdn=foo.example.com&ipv4=::1&token=abc",
            "/dyndns?fqdn=foo.example.com&ipv4=300.1.1.1&token=abc",
            "/dyndns?fqdn=foo.example.com&ipv4=%3A%3Affff%3A192.0.2.1&token=abc",
        ] {
            assert_eq!(
                get(&client, uri).await,
                (Status::BadRequest, BODY_BAD_REQUEST.to_string()),
                "{}",
                uri
            );
        }
        assert!(provider.calls().is_empty());
    }

    #[rocket::async_test]
    async fn wrong_token_or_unknown_fqdn_is_forbidden() {
        let provider = Arc::new(RecordingProvider::default());
        let client = client(AuthMode::Token, provider.clone()).await;

        for uri in [
            "/dyndns?fqdn=foo.example.com&ipv4=203.0.113.5&token=abd",
            "/dyndns?fqdn=foo.example.com&ipv4=203.0.113.5&token=",
            "/dyndns?fqdn=bar.example.com&ipv4=203.0.113.5&token=abc",
        ] {
            assert_eq!(
                get(&client, uri).await,
                (Status::Forbidden, BODY_FORBIDDEN.to_string()),
                "{}",
                uri
            );
        }
        assert!(provider.calls().is_empty());
    }

    #[rocket::async_test]
    async fn provider_failure_is_an_internal_error() {
        let provider = Arc::new(RecordingProvider::default());
        let client = client(AuthMode::Token, provider.clone()).await;

        let (status, body) = get(&client, "/dyndns?fqdn=down.example.com&ipv4=203.0.113.5&token=abc").await;
        assert_eq!(status, Status::InternalServerError);
        assert_eq!(body, BODY_INTERNAL);
        assert!(!body.contains("locked"), "details stay server-side");
    }

    #[rocket::async_test]
    async fn allow_list_scheme_uses_hostname_and_domain() {
        let provider = Arc::new(RecordingProvider::default());
        let client = client(AuthMode::AllowList, provider.clone()).await;

        assert_eq!(
            get(&client, "/dyndns?hostname=foo&domain=example.com&ip=203.0.113.6").await,
            (Status::Ok, BODY_SUCCESS.to_string())
        );
        assert_eq!(
            get(&client, "/dyndns?hostname=bar&domain=example.com&ip=203.0.113.6").await.0,
            Status::Forbidden
        );
        assert_eq!(
            get(&client, "/dyndns?fqdn=foo.example.com&ipv4=203.0.113.6&token=abc").await.0,
            Status::BadRequest
        );
    }

    /// Provider with no records up front, creating them on first lookup
    #[derive(Default)]
    struct EmptyZoneProvider {
        records: Mutex<std::collections::HashMap<String, Ipv4Addr>>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DnsProvider for EmptyZoneProvider {
        async fn resolve_current_ip(&self, host: &HostConfig) -> dyndns_core::Result<ResolvedRecord> {
            let fqdn = host.fqdn();
            let mut records = self.records.lock().unwrap();
            let current = *records.entry(fqdn.clone()).or_insert_with(|| {
                self.calls.lock().unwrap().push(format!("create {}", fqdn));
                Ipv4Addr::UNSPECIFIED
            });
            Ok(ResolvedRecord {
                handle: ProviderHandle::Record {
                    zone_id: "zone-1".to_string(),
                    record_id: fqdn,
                },
                current_ip: Some(current),
            })
        }

        async fn apply_ip(&self, handle: &ProviderHandle, ip: Ipv4Addr) -> dyndns_core::Result<AppliedRecord> {
            let ProviderHandle::Record { record_id, .. } = handle else {
                return Err(Error::provider("empty-zone", "unexpected handle"));
            };
            self.calls.lock().unwrap().push(format!("update {} {}", record_id, ip));
            self.records.lock().unwrap().insert(record_id.clone(), ip);
            Ok(AppliedRecord { echoed_ip: Some(ip) })
        }

        fn known_handle(&self, _host: &HostConfig) -> Option<ProviderHandle> {
            None
        }

        fn provider_name(&self) -> &'static str {
            "empty-zone"
        }
    }

    #[rocket::async_test]
    async fn missing_record_is_created_then_updated() {
        let provider = Arc::new(EmptyZoneProvider::default());
        let registry = Arc::new(
            HostRegistry::new(vec![HostConfig::new("foo", "example.com", "abc")], AuthMode::Token).unwrap(),
        );
        let state = AppState {
            registry: registry.clone(),
            reconciler: Reconciler::new(provider.clone(), RetryPolicy::new(5, Duration::from_millis(1))),
            scheme: RequestScheme::Token,
        };
        let client = Client::tracked(build(state, "127.0.0.1:0".parse().unwrap()))
            .await
            .unwrap();

        assert_eq!(
            get(&client, "/dyndns?fqdn=foo.example.com&ipv4=203.0.113.5&token=abc").await,
            (Status::Ok, BODY_SUCCESS.to_string())
        );

        assert_eq!(
            *provider.calls.lock().unwrap(),
            vec![
                "create foo.example.com".to_string(),
                "update foo.example.com 203.0.113.5".to_string()
            ]
        );
        let host = registry.lookup("foo.example.com").unwrap();
        assert_eq!(host.last_known_ip().await, Some(Ipv4Addr::new(203, 0, 113, 5)));
    }

    #[test]
    fn error_variants_map_to_status_codes() {
        let cases = [
            (Error::validation("x"), Status::BadRequest),
            (Error::authorization("x"), Status::Forbidden),
            (Error::not_found("x"), Status::Forbidden),
            (Error::network("p", "x"), Status::InternalServerError),
            (Error::provider("p", "x"), Status::InternalServerError),
            (
                Error::inconsistency("p", Ipv4Addr::new(192, 0, 2, 1), Ipv4Addr::new(192, 0, 2, 2)),
                Status::InternalServerError,
            ),
            (Error::config("x"), Status::InternalServerError),
        ];
        for (error, status) in cases {
            assert_eq!(response_for(&error).0, status, "{:?}", error);
        }
    }
}
