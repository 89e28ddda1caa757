// # Cloudflare-style DNS Provider
//
// Token-authenticated REST backend for the dyndns gateway.
//
// ## Responsibilities
//
// - Zone and record discovery for hosts without stored identifiers
// - Creation of a missing `A` record with placeholder content
// - Content updates, returning what the API echoes back
//
// Retry, backoff and caching belong to the `Reconciler`; this crate makes
// exactly the calls it is asked for and classifies their failures:
// transport failures are `Error::Network`, everything the API answered
// (non-2xx, `success: false`, unparsable body) is `Error::Provider`.
//
// ## Security
//
// The API token is sent as a bearer header and never logged.
//
// ## API Reference
//
// - List zones: GET `/zones?name=<zone>`
// - List records: GET `/zones/:zone_id/dns_records?name=<fqdn>&type=A`
// - Get record: GET `/zones/:zone_id/dns_records/:record_id`
// - Create record: POST `/zones/:zone_id/dns_records`
// - Update record: PATCH `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use dyndns_core::config::{DdnsConfig, HostConfig, ProviderConfig};
use dyndns_core::traits::{
    AppliedRecord, DnsProvider, DnsProviderFactory, ProviderHandle, ResolvedRecord,
};
use dyndns_core::{Error, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Provider type name in configuration
pub const PROVIDER_NAME: &str = "cloudflare";

/// Production API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Content of a freshly created record, replaced by the first update
const PLACEHOLDER_CONTENT: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

/// TTL of a freshly created record (seconds)
const PLACEHOLDER_TTL: u32 = 300;

/// Response envelope shared by every endpoint
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<Value>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
    name: String,
}

/// An `A` record as the API reports it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DnsRecord {
    /// Record identifier
    pub id: String,
    /// Fully-qualified record name
    pub name: String,
    /// Record type, always `A` here
    #[serde(rename = "type")]
    pub record_type: String,
    /// Record content
    pub content: String,
}

impl DnsRecord {
    /// Content as an IPv4 address, `None` if it is not one
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        self.content.parse().ok()
    }
}

/// Token REST provider
pub struct CloudflareProvider {
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API base URL without trailing slash
    api_base: String,

    /// HTTP client carrying the per-call timeout
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a provider talking to the production API
    ///
    /// # Parameters
    ///
    /// - `api_token`: token with Zone:DNS:Edit permission
    /// - `timeout`: bound on each HTTP call
    ///
    /// # Returns
    ///
    /// - `Err(Error::Configuration)`: empty token or HTTP client construction failed
    pub fn new(api_token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(api_token, client))
    }

    /// Create a provider around an existing HTTP client
    pub fn with_client(api_token: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            api_token: api_token.into(),
            api_base: CLOUDFLARE_API_BASE.to_string(),
            client,
        }
    }

    /// Point the provider at another API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Look up a zone identifier by zone name
    ///
    /// ```http
    /// GET /zones?name=example.com
    /// ```
    pub async fn find_zone(&self, zone_name: &str) -> Result<String> {
        tracing::debug!(zone = %zone_name, "Looking up zone ID");

        let request = self
            .client
            .get(format!("{}/zones", self.api_base))
            .query(&[("name", zone_name)]);
        let zones: Vec<Zone> = self.send(request).await?;

        let zone = zones
            .into_iter()
            .find(|zone| zone.name.eq_ignore_ascii_case(zone_name))
            .ok_or_else(|| Error::provider(PROVIDER_NAME, format!("zone {} not found", zone_name)))?;

        tracing::debug!(zone = %zone_name, zone_id = %zone.id, "Found zone ID");
        Ok(zone.id)
    }

    /// Look up the `A` record for `fqdn`
    ///
    /// If the API reports several, the first one wins.
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?name=foo.example.com&type=A
    /// ```
    pub async fn find_record(&self, zone_id: &str, fqdn: &str) -> Result<Option<DnsRecord>> {
        tracing::debug!(fqdn = %fqdn, zone_id = %zone_id, "Looking up A record");

        let request = self
            .client
            .get(format!("{}/zones/{}/dns_records", self.api_base, zone_id))
            .query(&[("name", fqdn), ("type", "A")]);
        let records: Vec<DnsRecord> = self.send(request).await?;

        if records.len() > 1 {
            tracing::warn!(fqdn = %fqdn, count = records.len(), "Several A records found, using the first");
        }
        Ok(records.into_iter().next())
    }

    /// Fetch one record by identifier
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records/:record_id
    /// ```
    pub async fn get_record(&self, zone_id: &str, record_id: &str) -> Result<DnsRecord> {
        let request = self.client.get(format!(
            "{}/zones/{}/dns_records/{}",
            self.api_base, zone_id, record_id
        ));
        self.send(request).await
    }

    /// Create the `A` record for `fqdn` with placeholder content
    ///
    /// ```http
    /// POST /zones/:zone_id/dns_records
    /// { "type": "A", "name": "...", "content": "0.0.0.0", "ttl": 300, "proxied": false }
    /// ```
    pub async fn create_record(&self, zone_id: &str, fqdn: &str) -> Result<DnsRecord> {
        tracing::info!(fqdn = %fqdn, zone_id = %zone_id, "Creating missing A record");

        let request = self
            .client
            .post(format!("{}/zones/{}/dns_records", self.api_base, zone_id))
            .json(&json!({
                "type": "A",
                "name": fqdn,
                "content": PLACEHOLDER_CONTENT.to_string(),
                "ttl": PLACEHOLDER_TTL,
                "proxied": false,
            }));
        self.send(request).await
    }

    /// Set the content of an existing record
    ///
    /// ```http
    /// PATCH /zones/:zone_id/dns_records/:record_id
    /// { "content": "1.2.3.4" }
    /// ```
    pub async fn update_record(&self, zone_id: &str, record_id: &str, ip: Ipv4Addr) -> Result<DnsRecord> {
        let request = self
            .client
            .patch(format!(
                "{}/zones/{}/dns_records/{}",
                self.api_base, zone_id, record_id
            ))
            .json(&json!({ "content": ip.to_string() }));
        self.send(request).await
    }

    /// Send a request and unwrap the response envelope
    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        let envelope: ApiResponse<T> = serde_json::from_str(&body).map_err(|e| {
            Error::provider(
                PROVIDER_NAME,
                format!("unexpected response ({}): {}: {}", status, e, body),
            )
        })?;

        if !status.is_success() || !envelope.success {
            return Err(Error::provider(
                PROVIDER_NAME,
                format!("{}: {}", status, Value::Array(envelope.errors)),
            ));
        }

        envelope
            .result
            .ok_or_else(|| Error::provider(PROVIDER_NAME, format!("{}: response without result", status)))
    }
}

/// Classify a `reqwest` failure
///
/// Connect, timeout and send failures are transient. Builder, redirect and
/// body errors are not.
fn transport_error(e: reqwest::Error) -> Error {
    if e.is_connect() || e.is_timeout() || e.is_request() {
        Error::network(PROVIDER_NAME, e.to_string())
    } else {
        Error::provider(PROVIDER_NAME, e.to_string())
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// Resolve zone and record, creating the record if it does not exist
    ///
    /// Stored identifiers skip discovery and read the record directly.
    async fn resolve_current_ip(&self, host: &HostConfig) -> Result<ResolvedRecord> {
        let fqdn = host.fqdn();

        if let (Some(zone_id), Some(record_id)) = (&host.zone_id, &host.record_id) {
            let record = self.get_record(zone_id, record_id).await?;
            return Ok(ResolvedRecord {
                current_ip: record.ipv4(),
                handle: ProviderHandle::Record {
                    zone_id: zone_id.clone(),
                    record_id: record.id,
                },
            });
        }

        let zone_id = match &host.zone_id {
            Some(zone_id) => zone_id.clone(),
            None => self.find_zone(&host.zone).await?,
        };

        // Creation is a call of its own; the content update comes later
        let record = match self.find_record(&zone_id, &fqdn).await? {
            Some(record) => record,
            None => self.create_record(&zone_id, &fqdn).await?,
        };

        Ok(ResolvedRecord {
            current_ip: record.ipv4(),
            handle: ProviderHandle::Record {
                zone_id,
                record_id: record.id,
            },
        })
    }

    async fn apply_ip(&self, handle: &ProviderHandle, ip: Ipv4Addr) -> Result<AppliedRecord> {
        let ProviderHandle::Record { zone_id, record_id } = handle else {
            return Err(Error::Other(format!(
                "{} cannot address record by name ({})",
                PROVIDER_NAME, handle
            )));
        };

        let record = self.update_record(zone_id, record_id, ip).await?;
        let echoed_ip = record.ipv4().ok_or_else(|| {
            Error::provider(
                PROVIDER_NAME,
                format!("record {} reports non-IPv4 content {:?}", record_id, record.content),
            )
        })?;

        Ok(AppliedRecord {
            echoed_ip: Some(echoed_ip),
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
        PROVIDER_NAME
    }
}

/// Factory for creating Cloudflare-style providers
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &DdnsConfig) -> Result<Box<dyn DnsProvider>> {
        match &config.provider {
            ProviderConfig::Cloudflare { api_token, api_base } => {
                let provider =
                    CloudflareProvider::new(api_token.clone(), config.reconciler.request_timeout())?;
                let provider = match api_base {
                    Some(base) => provider.with_api_base(base.clone()),
                    None => provider,
                };
                Ok(Box::new(provider))
            }
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

/// Register the Cloudflare-style provider with a registry
///
/// # Example
///
/// ```rust
/// use dyndns_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// dyndns_provider_cloudflare::register(&registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &dyndns_core::ProviderRegistry) {
    registry.register_provider(PROVIDER_NAME, Box::new(CloudflareFactory));
}
