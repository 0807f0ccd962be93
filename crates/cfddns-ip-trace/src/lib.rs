// # Trace Address Source
//
// Address source backed by Cloudflare's `/cdn-cgi/trace` echo endpoint.
//
// ## Purpose
//
// The endpoint answers with `key=value` lines describing the request as seen
// by the edge, including the caller's public address in the `ip` line. Each
// family has its own fixed URL, so the request goes out over the matching
// protocol:
//
// - IPv4: `https://1.1.1.1/cdn-cgi/trace`
// - IPv6: `https://[2606:4700:4700::1111]/cdn-cgi/trace`
//
// ## Architecture
//
// One GET per `fetch` call, bounded by a 10 second timeout. The body is
// returned unparsed; extracting `ip` is the detector's job. No caching and
// no polling: the controller decides when to ask.

use async_trait::async_trait;
use cfddns_core::record::AddressFamily;
use cfddns_core::traits::AddressSource;
use cfddns_core::{Error, Result};
use std::time::Duration;
use tracing::debug;

/// IPv4 echo endpoint
pub const IPV4_TRACE_URL: &str = "https://1.1.1.1/cdn-cgi/trace";

/// IPv6 echo endpoint
pub const IPV6_TRACE_URL: &str = "https://[2606:4700:4700::1111]/cdn-cgi/trace";

/// Timeout for a single echo request
pub const TRACE_TIMEOUT: Duration = Duration::from_secs(10);

/// Echo-endpoint address source
#[derive(Debug, Clone)]
pub struct TraceSource {
    ipv4_url: String,
    ipv6_url: String,
    client: reqwest::Client,
}

impl TraceSource {
    /// Create a source querying the public trace endpoints
    ///
    /// # Errors
    ///
    /// `Error::Http` when the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_urls(IPV4_TRACE_URL, IPV6_TRACE_URL)
    }

    /// Create a source querying custom endpoints
    pub fn with_urls(ipv4_url: impl Into<String>, ipv6_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(TRACE_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            ipv4_url: ipv4_url.into(),
            ipv6_url: ipv6_url.into(),
            client,
        })
    }

    /// Endpoint used for a family
    pub fn url(&self, family: AddressFamily) -> &str {
        match family {
            AddressFamily::Ipv4 => &self.ipv4_url,
            AddressFamily::Ipv6 => &self.ipv6_url,
        }
    }
}

#[async_trait]
impl AddressSource for TraceSource {
    async fn fetch(&self, family: AddressFamily) -> Result<String> {
        let url = self.url(family);
        debug!("Querying {} echo endpoint {}", family, url);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::detection(format!("{} echo request timed out", family))
            } else {
                Error::detection(format!("{} echo request failed: {}", family, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::detection(format!(
                "{} echo endpoint returned {}",
                family, status
            )));
        }

        response
            .text()
            .await
            .map_err(|e| Error::detection(format!("Failed to read {} echo response: {}", family, e)))
    }

    fn source_name(&self) -> &'static str {
        "cdn-cgi/trace"
    }
}
