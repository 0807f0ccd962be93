// # Cloudflare Zone Authority
//
// Cloudflare API v4 implementation of [`ZoneAuthority`].
//
// ## Behavior
//
// - ✅ One logical API operation per trait call (listings page through
//   `result_info.total_pages` transparently)
// - ✅ Every request bounded by the configured timeout
// - ✅ Status codes mapped to typed errors (401/403, 404, 409, 429, 5xx)
// - ✅ `success: false` envelopes surfaced with the API's own messages
// - ❌ NO retry or backoff (a failed call is retried on the next cycle)
// - ❌ NO caching of zone state between calls
// - ❌ NO background tasks
//
// ## Security Requirements
//
// - Credentials NEVER appear in logs or `Debug` output
// - Token auth and key auth are mutually exclusive; exactly one set of
//   headers is sent
//
// ## API Reference
//
// - Zone details: GET `/zones/:zone_id`
// - List DNS records: GET `/zones/:zone_id/dns_records?type=..&per_page=100&page=..`
// - Create DNS record: POST `/zones/:zone_id/dns_records`
// - Overwrite DNS record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use cfddns_core::config::{ControllerConfig, Credentials};
use cfddns_core::record::{DnsRecord, RecordType};
use cfddns_core::traits::ZoneAuthority;
use cfddns_core::{Error, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Cloudflare zones endpoint
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4/zones";

/// Page size requested from the listing endpoint
const PER_PAGE: u32 = 100;

const PROVIDER: &str = "cloudflare";

/// Cloudflare zone authority
///
/// # Trust Level: Untrusted
///
/// Stateless and single-shot. Whether a record needs to change, and what
/// happens after a failure, is decided by the controller.
///
/// # Security
///
/// The Debug implementation does NOT expose the credentials.
pub struct CloudflareZone {
    /// Zone identifier
    zone_id: String,

    /// API token or key + email
    /// ⚠️ NEVER log this value
    credentials: Credentials,

    /// HTTP client with the request timeout applied
    client: reqwest::Client,

    /// Zones endpoint, overridable for tests
    api_base: String,
}

impl std::fmt::Debug for CloudflareZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareZone")
            .field("zone_id", &self.zone_id)
            .field("credentials", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl CloudflareZone {
    /// Create a client for one zone
    ///
    /// # Errors
    ///
    /// - `Error::Config` when the zone id or credentials are empty
    /// - `Error::Http` when the HTTP client cannot be built
    pub fn new(
        zone_id: impl Into<String>,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self> {
        let zone_id = zone_id.into();
        if zone_id.trim().is_empty() {
            return Err(Error::config("Cloudflare zone ID is required"));
        }
        credentials.validate()?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            zone_id,
            credentials,
            client,
            api_base: CLOUDFLARE_API_BASE.to_string(),
        })
    }

    /// Create a client from the controller configuration
    pub fn from_config(config: &ControllerConfig) -> Result<Self> {
        Self::new(
            config.zone_id.clone(),
            config.credentials.clone(),
            config.http_timeout(),
        )
    }

    /// Point the client at another zones endpoint
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn zone_url(&self) -> String {
        format!("{}/{}", self.api_base, self.zone_id)
    }

    fn records_url(&self) -> String {
        format!("{}/dns_records", self.zone_url())
    }

    fn record_url(&self, id: &str) -> String {
        format!("{}/{}", self.records_url(), id)
    }

    /// Attach the authentication headers of the configured scheme
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Credentials::ApiToken { token } => request.bearer_auth(token),
            Credentials::ApiKey { key, email } => request
                .header("X-Auth-Key", key)
                .header("X-Auth-Email", email),
        }
    }

    /// Send a request and unwrap the response envelope
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<Envelope<T>> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| transport_error(context, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(context, e))?;

        if !status.is_success() {
            return Err(status_error(status, &body, context));
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| Error::zone_api(format!("{}: malformed response: {}", context, e)))?;

        if !envelope.success {
            return Err(Error::provider(
                PROVIDER,
                format!("{}: {}", context, envelope.describe_errors()),
            ));
        }

        Ok(envelope)
    }

    async fn list_page(&self, record_type: RecordType, page: u32) -> Result<Envelope<Vec<DnsRecord>>> {
        let request = self.client.get(self.records_url()).query(&[
            ("type", record_type.as_str().to_string()),
            ("per_page", PER_PAGE.to_string()),
            ("page", page.to_string()),
        ]);
        self.send(request, &format!("List {} records", record_type)).await
    }
}

#[async_trait]
impl ZoneAuthority for CloudflareZone {
    async fn base_domain(&self) -> Result<String> {
        let envelope: Envelope<ZoneDetails> = self
            .send(self.client.get(self.zone_url()), "Zone lookup")
            .await?;

        let zone = envelope.into_result("Zone lookup")?;
        debug!("Zone {} is {}", self.zone_id, zone.name);
        Ok(zone.name)
    }

    async fn list_records(&self, record_type: RecordType) -> Result<Vec<DnsRecord>> {
        let mut records = Vec::new();
        let mut page = 1;

        loop {
            let envelope = self.list_page(record_type, page).await?;
            let total_pages = envelope
                .result_info
                .as_ref()
                .map_or(1, |info| info.total_pages);

            records.extend(envelope.into_result("List records")?);

            if page >= total_pages {
                break;
            }
            page += 1;
        }

        debug!("Listed {} {} record(s) in {} page(s)", records.len(), record_type, page);
        Ok(records)
    }

    async fn create_record(&self, record: &DnsRecord) -> Result<DnsRecord> {
        let request = self
            .client
            .post(self.records_url())
            .json(&RecordBody::from(record));

        let context = format!("Create {} record {}", record.record_type, record.name);
        self.send(request, &context).await?.into_result(&context)
    }

    async fn update_record(&self, id: &str, record: &DnsRecord) -> Result<DnsRecord> {
        let request = self
            .client
            .put(self.record_url(id))
            .json(&RecordBody::from(record));

        let context = format!("Update {} record {}", record.record_type, record.name);
        self.send(request, &context).await?.into_result(&context)
    }

    async fn delete_record(&self, record: &DnsRecord) -> Result<()> {
        if record.id.is_empty() {
            return Err(Error::zone_api(format!(
                "Cannot delete {} record {} without an id",
                record.record_type, record.name
            )));
        }

        let context = format!("Delete {} record {}", record.record_type, record.name);
        let _: Envelope<serde_json::Value> = self
            .send(self.client.delete(self.record_url(&record.id)), &context)
            .await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Response envelope shared by every v4 endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

impl<T> Envelope<T> {
    fn into_result(self, context: &str) -> Result<T> {
        self.result
            .ok_or_else(|| Error::zone_api(format!("{}: response has no result", context)))
    }

    fn describe_errors(&self) -> String {
        if self.errors.is_empty() {
            return "request was not successful".to_string();
        }
        self.errors
            .iter()
            .map(|e| format!("[{}] {}", e.code, e.message))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default = "first_page")]
    total_pages: u32,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct ZoneDetails {
    name: String,
}

/// Create/overwrite payload; never carries the record id
#[derive(Debug, Serialize)]
struct RecordBody<'a> {
    #[serde(rename = "type")]
    record_type: RecordType,
    name: &'a str,
    content: &'a str,
    proxied: bool,
    ttl: u32,
}

impl<'a> From<&'a DnsRecord> for RecordBody<'a> {
    fn from(record: &'a DnsRecord) -> Self {
        Self {
            record_type: record.record_type,
            name: &record.name,
            content: &record.content,
            proxied: record.proxied,
            ttl: record.ttl,
        }
    }
}

fn transport_error(context: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::http(format!("{}: request timed out", context))
    } else {
        Error::http(format!("{}: HTTP request failed: {}", context, e))
    }
}

/// Map a non-success status to a typed error
fn status_error(status: StatusCode, body: &str, context: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{}: invalid credentials or insufficient permissions (status {})",
            context, status
        )),
        404 => Error::not_found(format!("{}: {}", context, status)),
        409 => Error::provider(PROVIDER, format!("{}: conflict: {}", context, body)),
        429 => Error::rate_limited(format!("{}: retry later (status {})", context, status)),
        500..=599 => Error::provider(
            PROVIDER,
            format!("{}: server error (transient): {} - {}", context, status, body),
        ),
        _ => Error::provider(PROVIDER, format!("{}: {} - {}", context, status, body)),
    }
}
