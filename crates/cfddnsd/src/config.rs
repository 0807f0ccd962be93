//! Environment configuration for the daemon
//!
//! Everything is read through a lookup function so the parsing can be tested
//! without touching the process environment.

use anyhow::{Context, Result, bail};
use cfddns_core::{ControllerConfig, Credentials, ElectionConfig};
use std::net::SocketAddr;
use std::str::FromStr;

/// Default listen address of the metrics endpoint
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:2157";

/// Daemon configuration
#[derive(Debug)]
pub struct Config {
    /// Controller settings handed to the core
    pub controller: ControllerConfig,

    /// Listen address of `GET /metrics`
    pub metrics_addr: SocketAddr,

    /// Log level name
    pub log_level: String,

    /// Whether the owner id was generated because `POD_NAME` was unset
    pub owner_generated: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string());

        let zone_id = var("CF_ZONE_ID")
            .filter(|v| !v.is_empty())
            .context("CF_ZONE_ID is required. Set it via: export CF_ZONE_ID=your_zone_id")?;

        let credentials = credentials(var("CF_API_TOKEN"), var("CF_API_KEY"), var("CF_API_EMAIL"))?;

        let (owner_id, owner_generated) = match var("POD_NAME").filter(|v| !v.is_empty()) {
            Some(name) => (name, false),
            None => (uuid::Uuid::new_v4().to_string(), true),
        };

        let mut controller = ControllerConfig::new(zone_id, credentials, owner_id);

        if let Some(raw) = lookup("CFDDNS_SUBDOMAINS") {
            controller.subdomains = raw.split(',').map(|s| s.trim().to_string()).collect();
        }

        controller.proxied = flag(&var, "CFDDNS_PROXIED", false)?;
        controller.ipv4 = flag(&var, "CFDDNS_IPV4", false)?;
        controller.ipv6 = flag(&var, "CFDDNS_IPV6", false)?;
        controller.purge = flag(&var, "CFDDNS_PURGE", false)?;
        controller.interval_secs = number(&var, "CFDDNS_INTERVAL", controller.interval_secs)?;
        controller.http_timeout_secs =
            number(&var, "CFDDNS_HTTP_TIMEOUT", controller.http_timeout_secs)?;

        let defaults = ElectionConfig::default();
        controller.election = ElectionConfig {
            lease_duration_secs: number(
                &var,
                "CFDDNS_ELECTION_LEASE_DURATION",
                defaults.lease_duration_secs,
            )?,
            renew_deadline_secs: number(
                &var,
                "CFDDNS_ELECTION_RENEW_DEADLINE",
                defaults.renew_deadline_secs,
            )?,
        };

        let metrics_addr = var("CFDDNS_METRICS_ADDR")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_METRICS_ADDR.to_string());
        let metrics_addr = metrics_addr
            .parse()
            .with_context(|| format!("CFDDNS_METRICS_ADDR '{}' is not a socket address", metrics_addr))?;

        Ok(Self {
            controller,
            metrics_addr,
            log_level: var("CFDDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            owner_generated,
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => bail!(
                "CFDDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.controller.validate()?;
        Ok(())
    }
}

/// Pick the authentication scheme
///
/// A token wins only when no key is configured; setting both is refused.
fn credentials(
    token: Option<String>,
    key: Option<String>,
    email: Option<String>,
) -> Result<Credentials> {
    let token = token.filter(|v| !v.is_empty());
    let key = key.filter(|v| !v.is_empty());
    let email = email.filter(|v| !v.is_empty());

    match (token, key, email) {
        (Some(_), Some(_), _) => bail!("CF_API_TOKEN and CF_API_KEY are mutually exclusive"),
        (Some(token), None, _) => Ok(Credentials::ApiToken { token }),
        (None, Some(key), Some(email)) => Ok(Credentials::ApiKey { key, email }),
        (None, Some(_), None) => bail!("CF_API_EMAIL is required with CF_API_KEY"),
        (None, None, _) => bail!(
            "Credentials are required. \
            Set CF_API_TOKEN, or CF_API_KEY together with CF_API_EMAIL"
        ),
    }
}

fn flag<F>(var: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = var(key).filter(|v| !v.is_empty()) else {
        return Ok(default);
    };

    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => bail!("{} must be true or false. Got: {}", key, raw),
    }
}

fn number<F, T>(var: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{} must be a number. Got: {}", key, raw)),
        None => Ok(default),
    }
}
