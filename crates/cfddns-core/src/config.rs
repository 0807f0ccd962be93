//! Configuration types for the DDNS controller
//!
//! The daemon fills [`ControllerConfig`] from environment variables; library
//! users can build it directly or deserialize it. [`ControllerConfig::validate`]
//! must pass before any cycle runs.

use crate::record::AddressFamily;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Main controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Zone identifier at the zone authority
    pub zone_id: String,

    /// Zone authority credentials
    pub credentials: Credentials,

    /// Labels to manage below the base domain; `""` is the apex
    #[serde(default = "default_subdomains")]
    pub subdomains: Vec<String>,

    /// Proxy flag for created address records
    #[serde(default)]
    pub proxied: bool,

    /// Detect and publish the IPv4 address
    #[serde(default)]
    pub ipv4: bool,

    /// Detect and publish the IPv6 address
    #[serde(default)]
    pub ipv6: bool,

    /// Delete orphaned owned records instead of only reporting them
    #[serde(default)]
    pub purge: bool,

    /// Seconds between reconciliation cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Identifier of this replica, embedded in ownership markers
    pub owner_id: String,

    /// Leadership lock timings
    #[serde(default)]
    pub election: ElectionConfig,

    /// Timeout applied to every outbound HTTP call to the zone authority
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Capacity of the controller event channel
    ///
    /// When full, events are dropped with a warning.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ControllerConfig {
    /// Create a configuration with defaults for everything but identity
    pub fn new(
        zone_id: impl Into<String>,
        credentials: Credentials,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            zone_id: zone_id.into(),
            credentials,
            subdomains: default_subdomains(),
            proxied: false,
            ipv4: false,
            ipv6: false,
            purge: false,
            interval_secs: default_interval_secs(),
            owner_id: owner_id.into(),
            election: ElectionConfig::default(),
            http_timeout_secs: default_http_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Enabled address families, IPv4 first
    pub fn enabled_families(&self) -> Vec<AddressFamily> {
        AddressFamily::ALL
            .into_iter()
            .filter(|family| match family {
                AddressFamily::Ipv4 => self.ipv4,
                AddressFamily::Ipv6 => self.ipv6,
            })
            .collect()
    }

    /// Configured labels, lowercased and deduplicated
    ///
    /// The zone authority stores names in lowercase, so `Home` and `home`
    /// manage the same records.
    pub fn labels(&self) -> BTreeSet<String> {
        self.subdomains
            .iter()
            .map(|label| label.to_ascii_lowercase())
            .collect()
    }

    /// Delay between cycles
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Timeout for zone authority calls
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.zone_id.trim().is_empty() {
            return Err(crate::Error::config("Zone ID cannot be empty"));
        }

        self.credentials.validate()?;

        if !self.ipv4 && !self.ipv6 {
            return Err(crate::Error::config(
                "One of ipv4 and ipv6 has to be enabled",
            ));
        }

        if self.owner_id.trim().is_empty() {
            return Err(crate::Error::config("Owner ID cannot be empty"));
        }

        if self.subdomains.is_empty() {
            return Err(crate::Error::config("No subdomains configured"));
        }

        for label in &self.subdomains {
            validate_label(label)?;
        }

        if self.http_timeout_secs == 0 {
            return Err(crate::Error::config("HTTP timeout must be > 0"));
        }

        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        self.election.validate()?;

        // A stale leader must not get another cycle in before its lease is
        // taken over.
        if self.interval_secs <= self.election.renew_deadline_secs {
            return Err(crate::Error::config(format!(
                "Update interval ({}s) needs to be greater than the election renew deadline ({}s)",
                self.interval_secs, self.election.renew_deadline_secs
            )));
        }

        Ok(())
    }
}

/// Zone authority credentials
///
/// The two schemes are mutually exclusive. Secrets never appear in `Debug`
/// output.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    /// Scoped API token, sent as a bearer token
    ApiToken {
        /// The token
        token: String,
    },

    /// Global API key with the account email
    ApiKey {
        /// The key
        key: String,
        /// Account email
        email: String,
    },
}

impl Credentials {
    /// Validate that the chosen scheme is complete
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            Credentials::ApiToken { token } if token.trim().is_empty() => {
                Err(crate::Error::config("API token cannot be empty"))
            }
            Credentials::ApiKey { key, email }
                if key.trim().is_empty() || email.trim().is_empty() =>
            {
                Err(crate::Error::config(
                    "API key authentication needs both key and email",
                ))
            }
            _ => Ok(()),
        }
    }

    /// Scheme name (for logging)
    pub fn scheme(&self) -> &'static str {
        match self {
            Credentials::ApiToken { .. } => "api_token",
            Credentials::ApiKey { .. } => "api_key",
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::ApiToken { .. } => f
                .debug_struct("ApiToken")
                .field("token", &"<REDACTED>")
                .finish(),
            Credentials::ApiKey { email, .. } => f
                .debug_struct("ApiKey")
                .field("key", &"<REDACTED>")
                .field("email", email)
                .finish(),
        }
    }
}

/// Leadership lock timings
///
/// The lock itself is acquired outside the core; the core only uses these
/// values to refuse configurations where a stale leader could still act.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionConfig {
    /// Lease duration in seconds
    #[serde(default = "default_lease_duration_secs")]
    pub lease_duration_secs: u64,

    /// Renew deadline in seconds
    #[serde(default = "default_renew_deadline_secs")]
    pub renew_deadline_secs: u64,
}

impl ElectionConfig {
    /// Validate lease timings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.lease_duration_secs <= self.renew_deadline_secs {
            return Err(crate::Error::config(format!(
                "Election lease duration ({}s) needs to be greater than the renew deadline ({}s)",
                self.lease_duration_secs, self.renew_deadline_secs
            )));
        }
        Ok(())
    }
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            lease_duration_secs: default_lease_duration_secs(),
            renew_deadline_secs: default_renew_deadline_secs(),
        }
    }
}

/// Validate a configured label (RFC 1035 style, `*` allowed leftmost)
fn validate_label(label: &str) -> Result<(), crate::Error> {
    if label.is_empty() {
        return Ok(());
    }

    if label.len() > 253 {
        return Err(crate::Error::config(format!(
            "Subdomain too long: {} chars (max 253)",
            label.len()
        )));
    }

    for (i, part) in label.split('.').enumerate() {
        if part.is_empty() {
            return Err(crate::Error::config(format!(
                "Subdomain has empty label: '{}'",
                label
            )));
        }

        if part == "*" && i == 0 {
            continue;
        }

        if part.len() > 63 {
            return Err(crate::Error::config(format!(
                "Subdomain label too long: '{}' (max 63)",
                part
            )));
        }

        if !part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(crate::Error::config(format!(
                "Subdomain label contains invalid characters: '{}'",
                part
            )));
        }

        if part.starts_with('-') || part.ends_with('-') {
            return Err(crate::Error::config(format!(
                "Subdomain label cannot start or end with hyphen: '{}'",
                part
            )));
        }
    }

    Ok(())
}

fn default_subdomains() -> Vec<String> {
    vec![String::new()]
}

fn default_interval_secs() -> u64 {
    300
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_lease_duration_secs() -> u64 {
    15
}

fn default_renew_deadline_secs() -> u64 {
    10
}
