//! Update request validation
//!
//! Turns raw query parameters into an [`UpdateRequest`]. Purely syntactic:
//! whether the FQDN is managed and the token matches is decided by the
//! [`HostRegistry`](crate::HostRegistry).

use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::config::{AuthMode, normalize_fqdn};
use crate::error::{Error, Result};

/// Query parameters as a multimap
///
/// A key counts as present when it carries at least one value; the first
/// value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    params: HashMap<String, Vec<String>>,
}

impl QueryParams {
    /// Create an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value for `key`
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.entry(key.into()).or_default().push(value.into());
    }

    /// First value for `key`, if any
    pub fn first(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Whether no parameter was supplied
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// Which parameter names an endpoint expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestScheme {
    /// `fqdn`, `ipv4`, `token`
    Token,
    /// `hostname`, `domain`, `ip`
    AllowList,
}

impl RequestScheme {
    /// Required parameter names, in the order they are checked
    pub fn required_params(self) -> &'static [&'static str] {
        match self {
            RequestScheme::Token => &["fqdn", "ipv4", "token"],
            RequestScheme::AllowList => &["hostname", "domain", "ip"],
        }
    }

    fn ip_param(self) -> &'static str {
        match self {
            RequestScheme::Token => "ipv4",
            RequestScheme::AllowList => "ip",
        }
    }
}

impl From<AuthMode> for RequestScheme {
    fn from(mode: AuthMode) -> Self {
        match mode {
            AuthMode::Token => RequestScheme::Token,
            AuthMode::AllowList => RequestScheme::AllowList,
        }
    }
}

/// A syntactically valid update request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    /// Normalized fully-qualified name
    pub fqdn: String,
    /// Desired `A` record content
    pub ip: Ipv4Addr,
    /// Supplied secret, absent in allow-list requests
    pub token: Option<String>,
}

/// Validate raw query parameters
///
/// All required parameters must be present before the IP is looked at. The
/// IP must be a dotted-quad IPv4 literal; IPv6 in any spelling is rejected.
///
/// # Returns
///
/// - `Ok(UpdateRequest)`: normalized request
/// - `Err(Error::Validation)`: naming the first missing or invalid parameter
pub fn validate_query(params: &QueryParams, scheme: RequestScheme) -> Result<UpdateRequest> {
    for name in scheme.required_params() {
        if params.first(name).is_none() {
            return Err(Error::validation(format!("parameter {} is missing", name)));
        }
    }

    let ip_param = scheme.ip_param();
    let raw_ip = params.first(ip_param).unwrap_or_default();
    let ip = parse_ipv4(raw_ip)
        .ok_or_else(|| Error::validation(format!("parameter {} is not an IPv4 address", ip_param)))?;

    let request = match scheme {
        RequestScheme::Token => UpdateRequest {
            fqdn: normalize_fqdn(params.first("fqdn").unwrap_or_default()),
            ip,
            token: params.first("token").map(str::to_string),
        },
        RequestScheme::AllowList => {
            let hostname = params.first("hostname").unwrap_or_default().trim();
            let domain = params.first("domain").unwrap_or_default().trim();
            UpdateRequest {
                fqdn: normalize_fqdn(&format!("{}.{}", hostname, domain)),
                ip,
                token: None,
            }
        }
    };

    Ok(request)
}

/// Strict IPv4 parsing
fn parse_ipv4(raw: &str) -> Option<Ipv4Addr> {
    raw.parse::<Ipv4Addr>().ok()
}
