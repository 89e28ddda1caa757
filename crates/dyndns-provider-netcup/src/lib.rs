// # Netcup-style DNS Provider
//
// Session-login JSON backend for the dyndns gateway.
//
// Every call is a `POST` of `{"action": ..., "param": {...}}` to a single
// endpoint. Each logical operation runs in its own session:
//
// ```text
// login ──▶ infoDnsRecords [──▶ updateDnsRecords] ──▶ logout
// ```
//
// Logout is best effort: it runs after the operation whether or not the
// operation succeeded, and its own failure is only logged.
//
// The backend has no stable record identifiers; records are addressed by
// host label and domain, so no discovery is needed at load time.
//
// ## Security
//
// API key, API password and session id never appear in logs or errors.

use async_trait::async_trait;
use dyndns_core::config::{DdnsConfig, HostConfig, ProviderConfig};
use dyndns_core::traits::{
    AppliedRecord, DnsProvider, DnsProviderFactory, ProviderHandle, ResolvedRecord,
};
use dyndns_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Provider type name in configuration
pub const PROVIDER_NAME: &str = "netcup";

/// Production JSON endpoint
pub const NETCUP_ENDPOINT: &str = "https://ccp.netcup.net/run/webservice/servers/endpoint.php?JSON";

/// Answer envelope of every action
#[derive(Debug, Deserialize)]
struct Answer {
    #[serde(default)]
    serverrequestid: String,
    #[serde(default)]
    action: String,
    status: String,
    #[serde(default)]
    statuscode: i64,
    #[serde(default)]
    shortmessage: String,
    #[serde(default)]
    longmessage: String,
    #[serde(default)]
    responsedata: Value,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    apisessionid: String,
}

/// One DNS record as the endpoint represents it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Record identifier, empty for a record to be created
    #[serde(default)]
    pub id: String,
    /// Host label relative to the domain
    pub hostname: String,
    /// Record type
    #[serde(rename = "type")]
    pub record_type: String,
    /// Record content
    #[serde(default)]
    pub destination: String,
    /// Priority, only meaningful for MX records
    #[serde(default)]
    pub priority: String,
    /// Provisioning state reported by the provider
    #[serde(default)]
    pub state: String,
    /// Set to delete the record on update
    #[serde(default)]
    pub deleterecord: bool,
}

impl DnsRecord {
    /// A new `A` record for `hostname`, without content yet
    pub fn new_a(hostname: &str) -> Self {
        Self {
            id: String::new(),
            hostname: hostname.to_string(),
            record_type: "A".to_string(),
            destination: String::new(),
            priority: String::new(),
            state: String::new(),
            deleterecord: false,
        }
    }

    /// Content as an IPv4 address, `None` if it is not one
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        self.destination.parse().ok()
    }

    fn is_a_for(&self, hostname: &str) -> bool {
        self.record_type.eq_ignore_ascii_case("A") && self.hostname.eq_ignore_ascii_case(hostname)
    }
}

/// Record set wrapper used by both info and update actions
#[derive(Debug, Default, Serialize, Deserialize)]
struct DnsRecordSet {
    #[serde(default)]
    dnsrecords: Vec<DnsRecord>,
}

impl DnsRecordSet {
    /// First `A` record for `hostname`
    fn first_a(&self, hostname: &str) -> Option<&DnsRecord> {
        self.dnsrecords.iter().find(|record| record.is_a_for(hostname))
    }
}

/// An open API session
pub struct Session {
    id: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("id", &"<REDACTED>").finish()
    }
}

/// Session JSON provider
pub struct NetcupProvider {
    customer_number: u64,
    /// ⚠️ NEVER log this value
    api_key: String,
    /// ⚠️ NEVER log this value
    api_password: String,
    endpoint: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for NetcupProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetcupProvider")
            .field("customer_number", &self.customer_number)
            .field("api_key", &"<REDACTED>")
            .field("api_password", &"<REDACTED>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl NetcupProvider {
    /// Create a provider talking to the production endpoint
    ///
    /// # Returns
    ///
    /// - `Err(Error::Configuration)`: missing credentials or HTTP client construction failed
    pub fn new(
        customer_number: u64,
        api_key: impl Into<String>,
        api_password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        let api_password = api_password.into();
        if customer_number == 0 || api_key.trim().is_empty() || api_password.trim().is_empty() {
            return Err(Error::config(
                "Netcup customer number, API key and API password are required",
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            customer_number,
            api_key,
            api_password,
            endpoint: NETCUP_ENDPOINT.to_string(),
            client,
        })
    }

    /// Point the provider at another endpoint URL
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Open a session
    pub async fn login(&self) -> Result<Session> {
        let answer = self
            .call(
                "login",
                json!({
                    "customernumber": self.customer_number,
                    "apikey": self.api_key,
                    "apipassword": self.api_password,
                }),
            )
            .await?;

        let data: LoginData = response_data(answer)?;
        tracing::debug!("Session opened");
        Ok(Session {
            id: data.apisessionid,
        })
    }

    /// List the records of `domain`
    pub async fn info_dns_records(&self, session: &Session, domain: &str) -> Result<Vec<DnsRecord>> {
        let answer = self
            .call(
                "infoDnsRecords",
                json!({
                    "domainname": domain,
                    "customernumber": self.customer_number,
                    "apikey": self.api_key,
                    "apisessionid": session.id,
                }),
            )
            .await?;

        let set: DnsRecordSet = response_data(answer)?;
        Ok(set.dnsrecords)
    }

    /// Submit changed records for `domain`
    ///
    /// Returns the record set the endpoint reports after the change, which
    /// may be empty.
    pub async fn update_dns_records(
        &self,
        session: &Session,
        domain: &str,
        records: Vec<DnsRecord>,
    ) -> Result<Vec<DnsRecord>> {
        let answer = self
            .call(
                "updateDnsRecords",
                json!({
                    "domainname": domain,
                    "customernumber": self.customer_number,
                    "apikey": self.api_key,
                    "apisessionid": session.id,
                    "dnsrecordset": DnsRecordSet { dnsrecords: records },
                }),
            )
            .await?;

        if !answer.responsedata.is_object() {
            return Ok(Vec::new());
        }
        let set: DnsRecordSet = response_data(answer)?;
        Ok(set.dnsrecords)
    }

    /// Close a session
    pub async fn logout(&self, session: Session) -> Result<()> {
        self.call(
            "logout",
            json!({
                "customernumber": self.customer_number,
                "apikey": self.api_key,
                "apisessionid": session.id,
            }),
        )
        .await?;
        tracing::debug!("Session closed");
        Ok(())
    }

    /// Logout whose failure is logged, not returned
    async fn end_session(&self, session: Session) {
        if let Err(e) = self.logout(session).await {
            tracing::warn!("Logout failed: {}", e);
        }
    }

    /// Look up the first `A` record for `hostname` in its own session
    async fn current_record(&self, hostname: &str, domain: &str) -> Result<Option<DnsRecord>> {
        let session = self.login().await?;
        let result = self.info_dns_records(&session, domain).await;
        self.end_session(session).await;

        let records = DnsRecordSet {
            dnsrecords: result?,
        };
        Ok(records.first_a(hostname).cloned())
    }

    /// Set the first `A` record for `hostname` (or a new one) in its own session
    async fn set_destination(&self, hostname: &str, domain: &str, ip: Ipv4Addr) -> Result<Option<Ipv4Addr>> {
        let session = self.login().await?;
        let result = self.set_destination_in(&session, hostname, domain, ip).await;
        self.end_session(session).await;
        result
    }

    async fn set_destination_in(
        &self,
        session: &Session,
        hostname: &str,
        domain: &str,
        ip: Ipv4Addr,
    ) -> Result<Option<Ipv4Addr>> {
        let current = DnsRecordSet {
            dnsrecords: self.info_dns_records(session, domain).await?,
        };

        let mut record = current
            .first_a(hostname)
            .cloned()
            .unwrap_or_else(|| DnsRecord::new_a(hostname));
        if record.id.is_empty() {
            tracing::info!(hostname = %hostname, domain = %domain, "Creating missing A record");
        }
        record.destination = ip.to_string();

        let updated = DnsRecordSet {
            dnsrecords: self.update_dns_records(session, domain, vec![record]).await?,
        };
        Ok(updated.first_a(hostname).and_then(DnsRecord::ipv4))
    }

    /// Perform one action and check its status
    async fn call(&self, action: &str, param: Value) -> Result<Answer> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "action": action, "param": param }))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        let answer: Answer = serde_json::from_str(&body).map_err(|e| {
            Error::provider(
                PROVIDER_NAME,
                format!("{} answered {}: {}: {}", action, status, e, body),
            )
        })?;

        if answer.status != "success" {
            return Err(Error::provider(
                PROVIDER_NAME,
                format!(
                    "{} failed: status={} statuscode={} shortmessage={:?} longmessage={:?} serverrequestid={}",
                    answer.action,
                    answer.status,
                    answer.statuscode,
                    answer.shortmessage,
                    answer.longmessage,
                    answer.serverrequestid
                ),
            ));
        }

        Ok(answer)
    }
}

/// Decode the `responsedata` of a successful answer
fn response_data<T: DeserializeOwned>(answer: Answer) -> Result<T> {
    let action = answer.action;
    serde_json::from_value(answer.responsedata)
        .map_err(|e| Error::provider(PROVIDER_NAME, format!("{}: unexpected responsedata: {}", action, e)))
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
impl DnsProvider for NetcupProvider {
    async fn resolve_current_ip(&self, host: &HostConfig) -> Result<ResolvedRecord> {
        let record = self.current_record(&host.hostname, &host.zone).await?;

        Ok(ResolvedRecord {
            handle: handle_for(host),
            current_ip: record.as_ref().and_then(DnsRecord::ipv4),
        })
    }

    async fn apply_ip(&self, handle: &ProviderHandle, ip: Ipv4Addr) -> Result<AppliedRecord> {
        let ProviderHandle::Name { hostname, domain } = handle else {
            return Err(Error::Other(format!(
                "{} cannot address record by id ({})",
                PROVIDER_NAME, handle
            )));
        };

        let echoed_ip = self.set_destination(hostname, domain, ip).await?;
        Ok(AppliedRecord { echoed_ip })
    }

    fn known_handle(&self, host: &HostConfig) -> Option<ProviderHandle> {
        Some(handle_for(host))
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

fn handle_for(host: &HostConfig) -> ProviderHandle {
    ProviderHandle::Name {
        hostname: host.hostname.trim().to_string(),
        domain: host.zone.trim().trim_end_matches('.').to_string(),
    }
}

/// Factory for creating Netcup-style providers
pub struct NetcupFactory;

impl DnsProviderFactory for NetcupFactory {
    fn create(&self, config: &DdnsConfig) -> Result<Box<dyn DnsProvider>> {
        match &config.provider {
            ProviderConfig::Netcup {
                customer_number,
                api_key,
                api_password,
                endpoint,
            } => {
                let provider = NetcupProvider::new(
                    *customer_number,
                    api_key.clone(),
                    api_password.clone(),
                    config.reconciler.request_timeout(),
                )?;
                let provider = match endpoint {
                    Some(endpoint) => provider.with_endpoint(endpoint.clone()),
                    None => provider,
                };
                Ok(Box::new(provider))
            }
            _ => Err(Error::config("Invalid config for Netcup provider")),
        }
    }
}

/// Register the Netcup-style provider with a registry
pub fn register(registry: &dyndns_core::ProviderRegistry) {
    registry.register_provider(PROVIDER_NAME, Box::new(NetcupFactory));
}
