// # Zone Authority Trait
//
// Defines the interface to the DNS provider's record-management API.
//
// ## Implementations
//
// - Cloudflare v4: `cfddns-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use cfddns_core::{RecordType, ZoneAuthority};
//
// async fn dump(zone: &dyn ZoneAuthority) -> cfddns_core::Result<()> {
//     let base = zone.base_domain().await?;
//     for record in zone.list_records(RecordType::A).await? {
//         println!("{base}: {record}");
//     }
//     Ok(())
// }
// ```

use crate::record::{DnsRecord, RecordType};
use async_trait::async_trait;

/// Trait for zone authority implementations
///
/// Every method maps to exactly one logical API operation. Pagination of
/// listings is handled inside the implementation so callers always see one
/// flattened list.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to the provider endpoint only
/// - ✅ Parse provider-specific responses into [`DnsRecord`]
/// - ✅ Return success or failure (the controller decides what happens next)
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (a failed call is retried on the next cycle)
/// - ❌ Decide whether a record needs to change (owned by the reconciler)
/// - ❌ Cache zone state between calls
/// - ❌ Spawn tasks
///
/// Every call must be bounded by a timeout; a hung request would stall the
/// whole pass and delay the reaction to leadership loss.
#[async_trait]
pub trait ZoneAuthority: Send + Sync {
    /// Name of the zone, used as the base domain for all configured labels
    async fn base_domain(&self) -> Result<String, crate::Error>;

    /// All records of one type in the zone
    async fn list_records(&self, record_type: RecordType)
    -> Result<Vec<DnsRecord>, crate::Error>;

    /// Create a record
    ///
    /// `record.id` is ignored. Returns the record as stored remotely,
    /// including its newly assigned identifier.
    async fn create_record(&self, record: &DnsRecord) -> Result<DnsRecord, crate::Error>;

    /// Overwrite the record identified by `id` with the fields of `record`
    async fn update_record(
        &self,
        id: &str,
        record: &DnsRecord,
    ) -> Result<DnsRecord, crate::Error>;

    /// Delete a record by its remote identifier
    async fn delete_record(&self, record: &DnsRecord) -> Result<(), crate::Error>;

    /// Provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
