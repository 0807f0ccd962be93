// # Address Source Trait
//
// Defines how the IP detector reaches the public address echo endpoints.
//
// ## Implementations
//
// - Cloudflare `/cdn-cgi/trace`: `cfddns-ip-trace` crate
//
// The source only transports the response body. Parsing the `key=value`
// lines and change detection live in [`crate::detector`], so that every
// transport gets identical semantics.

use crate::record::AddressFamily;
use async_trait::async_trait;

/// Trait for echo endpoint transports
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ One HTTP request per call to the fixed endpoint of the family
/// - ✅ Bounded timeout on every request
///
/// ## Forbidden Capabilities
/// - ❌ Polling loops or background tasks (the controller schedules cycles)
/// - ❌ Remembering previous addresses (owned by [`crate::AddressState`])
/// - ❌ Retrying (a failed family is skipped for the cycle)
#[async_trait]
pub trait AddressSource: Send + Sync {
    /// Fetch the raw echo response body for `family`
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The body, expected to be `key=value` lines
    /// - `Err(Error::Detection)`: Endpoint unreachable or non-success status
    async fn fetch(&self, family: AddressFamily) -> Result<String, crate::Error>;

    /// Source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}
