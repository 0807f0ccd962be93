//! Typed DNS record model
//!
//! Records are decoded from the zone authority exactly once into [`DnsRecord`]
//! and every comparison afterwards runs on these typed values. This keeps
//! `proxied` a real `bool` and the record type a closed enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker embedded in every TXT record this controller creates
///
/// Any TXT record whose content contains this tag is treated as owned by the
/// controller family, whatever owner id follows it.
pub const HERITAGE_TAG: &str = "heritage=cloudflare-ddns";

/// TTL value meaning "automatic" for the zone authority
pub const AUTO_TTL: u32 = 1;

/// Build the TXT content identifying `owner` as the record's creator.
///
/// The surrounding quotes are part of the content.
pub fn marker_content(owner: &str) -> String {
    format!("\"{HERITAGE_TAG},cloudflare-ddns/owner={owner}\"")
}

/// Whether a TXT content carries the heritage tag.
pub fn is_owned_marker(content: &str) -> bool {
    content.contains(HERITAGE_TAG)
}

/// Record types managed by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 address record
    #[serde(rename = "A")]
    A,
    /// IPv6 address record
    #[serde(rename = "AAAA")]
    Aaaa,
    /// Ownership marker
    #[serde(rename = "TXT")]
    Txt,
}

impl RecordType {
    /// Every type the controller reads from the zone
    pub const ALL: [RecordType; 3] = [RecordType::A, RecordType::Aaaa, RecordType::Txt];

    /// Wire name of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Txt => "TXT",
        }
    }

    /// A and AAAA carry addresses and are tracked by the status gauge
    pub fn is_address(&self) -> bool {
        matches!(self, RecordType::A | RecordType::Aaaa)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    /// IPv4
    Ipv4,
    /// IPv6
    Ipv6,
}

impl AddressFamily {
    /// Both families, in processing order
    pub const ALL: [AddressFamily; 2] = [AddressFamily::Ipv4, AddressFamily::Ipv6];

    /// The address record type carrying this family
    pub fn record_type(&self) -> RecordType {
        match self {
            AddressFamily::Ipv4 => RecordType::A,
            AddressFamily::Ipv6 => RecordType::Aaaa,
        }
    }

    /// Lowercase name used in logs and configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressFamily::Ipv4 => "ipv4",
            AddressFamily::Ipv6 => "ipv6",
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected public address
///
/// The value is kept exactly as the echo endpoint reported it. Equality is
/// plain string equality; no normalisation of case or zero compression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    /// Address family
    pub family: AddressFamily,
    /// Textual address
    pub value: String,
}

impl Address {
    /// Create an address
    pub fn new(family: AddressFamily, value: impl Into<String>) -> Self {
        Self {
            family,
            value: value.into(),
        }
    }
}

/// A DNS record as known to the zone authority
///
/// `id` is empty until the record has been created remotely. Update and
/// delete calls require it; create calls never send it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Remote identifier assigned by the zone authority
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,

    /// Fully-qualified name
    pub name: String,

    /// Record content (address or TXT payload)
    pub content: String,

    /// Proxy flag; meaningless for TXT
    #[serde(default)]
    pub proxied: bool,

    /// Time-to-live
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

fn default_ttl() -> u32 {
    AUTO_TTL
}

impl DnsRecord {
    /// Build a record that does not exist remotely yet
    pub fn new(
        record_type: RecordType,
        name: impl Into<String>,
        content: impl Into<String>,
        proxied: bool,
    ) -> Self {
        Self {
            id: String::new(),
            record_type,
            name: name.into(),
            content: content.into(),
            proxied,
            ttl: AUTO_TTL,
        }
    }

    /// Attach a remote identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Whether the record already has the content and proxy flag of `other`
    pub fn matches(&self, other: &DnsRecord) -> bool {
        self.content == other.content && self.proxied == other.proxied
    }

    /// Gauge key for this record
    pub fn series(&self) -> SeriesKey {
        SeriesKey::new(self.record_type, &self.content, self.proxied)
    }
}

impl fmt::Display for DnsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {} (proxied: {})",
            self.record_type, self.name, self.content, self.proxied
        )
    }
}

/// Label combination of one gauge series: (type, content, proxied)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    /// Record type
    pub record_type: RecordType,
    /// Record content
    pub content: String,
    /// Lowercase `true` / `false`
    pub proxied: String,
}

impl SeriesKey {
    /// Create a series key
    pub fn new(record_type: RecordType, content: impl Into<String>, proxied: bool) -> Self {
        Self {
            record_type,
            content: content.into(),
            proxied: proxied.to_string(),
        }
    }
}

/// Target state for one configured name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredRecordSet {
    /// Fully-qualified name
    pub name: String,
    /// A record, when IPv4 is enabled and detected
    pub a: Option<DnsRecord>,
    /// AAAA record, when IPv6 is enabled and detected
    pub aaaa: Option<DnsRecord>,
    /// Ownership marker; present iff at least one address record is
    pub marker: Option<DnsRecord>,
}

impl DesiredRecordSet {
    /// The desired address record for a family
    pub fn address(&self, family: AddressFamily) -> Option<&DnsRecord> {
        match family {
            AddressFamily::Ipv4 => self.a.as_ref(),
            AddressFamily::Ipv6 => self.aaaa.as_ref(),
        }
    }

    /// Address records in family order
    pub fn address_records(&self) -> impl Iterator<Item = &DnsRecord> {
        self.a.iter().chain(self.aaaa.iter())
    }
}

/// What reconciliation did with a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Record did not exist and was created
    Created,
    /// Record existed with different content or proxy flag and was updated
    Updated,
    /// Record already matched
    Unchanged,
    /// Orphaned owned record was deleted
    Deleted,
    /// Orphaned owned record was reported but kept (purge disabled)
    OrphanCandidate,
}
