//! Address record status gauge
//!
//! `ddns_ip_status{type, ip, proxied}` is 1 for every address record the
//! controller currently manages and 0 for a record it just superseded or
//! deleted. Zeroed series stay visible for one full cycle so scrapers see the
//! transition, then [`IpStatus::sweep_expired`] drops them.
//!
//! Series are keyed by content, not by name, so several records can share
//! one. A series marked active during the current cycle is never zeroed in
//! that same cycle.

use crate::error::{Error, Result};
use crate::record::{DnsRecord, SeriesKey};
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::BTreeSet;
use tracing::debug;

/// Gauge name
pub const IP_STATUS: &str = "ddns_ip_status";

const LABELS: [&str; 3] = ["type", "ip", "proxied"];

/// Owner of the `ddns_ip_status` gauge and its pending removals
pub struct IpStatus {
    registry: Registry,
    gauge: GaugeVec,
    expired: BTreeSet<SeriesKey>,
    /// Series marked active since the last sweep
    current: BTreeSet<SeriesKey>,
}

impl IpStatus {
    /// Create the gauge in a fresh registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Create the gauge and register it in `registry`
    pub fn with_registry(registry: Registry) -> Result<Self> {
        let gauge = GaugeVec::new(
            Opts::new(IP_STATUS, "status of detected IP address"),
            &LABELS,
        )
        .map_err(|e| Error::Other(format!("Failed to create {}: {}", IP_STATUS, e)))?;

        registry
            .register(Box::new(gauge.clone()))
            .map_err(|e| Error::Other(format!("Failed to register {}: {}", IP_STATUS, e)))?;

        Ok(Self {
            registry,
            gauge,
            expired: BTreeSet::new(),
            current: BTreeSet::new(),
        })
    }

    /// Registry holding the gauge, for exposition
    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }

    /// Mark a record's series as active (1)
    ///
    /// Non-address records are ignored. A series waiting for removal is taken
    /// off the pending set.
    pub fn mark_active(&mut self, record: &DnsRecord) {
        if !record.record_type.is_address() {
            return;
        }
        let key = record.series();
        self.set(&key, 1.0);
        self.expired.remove(&key);
        self.current.insert(key);
    }

    /// Mark a record's series as superseded (0) and schedule its removal
    ///
    /// Ignored when another record marked the same series active since the
    /// last sweep.
    pub fn mark_inactive(&mut self, record: &DnsRecord) {
        if !record.record_type.is_address() {
            return;
        }
        let key = record.series();
        if self.current.contains(&key) {
            debug!("{} series {:?} is still in use", IP_STATUS, label_values(&key));
            return;
        }
        self.set(&key, 0.0);
        self.expired.insert(key);
    }

    /// Drop every series marked inactive since the last sweep
    ///
    /// Called once at the start of every cycle.
    pub fn sweep_expired(&mut self) {
        self.current.clear();
        for key in std::mem::take(&mut self.expired) {
            let values = label_values(&key);
            if self.gauge.remove_label_values(&values).is_ok() {
                debug!("Removed {} series {:?}", IP_STATUS, values);
            }
        }
    }

    /// Series scheduled for removal at the next sweep
    pub fn pending_removal(&self) -> impl Iterator<Item = &SeriesKey> {
        self.expired.iter()
    }

    /// Current value of a series, if it exists
    pub fn value(&self, key: &SeriesKey) -> Option<f64> {
        let series = format!(
            "{}{{ip=\"{}\",proxied=\"{}\",type=\"{}\"}} ",
            IP_STATUS, key.content, key.proxied, key.record_type
        );
        self.render()
            .ok()?
            .lines()
            .find_map(|line| line.strip_prefix(&series))
            .and_then(|value| value.trim().parse().ok())
    }

    /// Render the registry in Prometheus text format
    pub fn render(&self) -> Result<String> {
        render(&self.registry)
    }

    fn set(&self, key: &SeriesKey, value: f64) {
        self.gauge.with_label_values(&label_values(key)).set(value);
    }
}

impl std::fmt::Debug for IpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpStatus")
            .field("expired", &self.expired)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

/// Render a registry in Prometheus text format
pub fn render(registry: &Registry) -> Result<String> {
    let metric_families = registry.gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| Error::Other(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer).map_err(|e| Error::Other(format!("Metrics are not UTF-8: {}", e)))
}

fn label_values(key: &SeriesKey) -> [&str; 3] {
    [key.record_type.as_str(), &key.content, &key.proxied]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordType;

    fn a(ip: &str) -> DnsRecord {
        DnsRecord::new(RecordType::A, "home.example.com", ip, true)
    }

    #[test]
    fn active_series_is_one() {
        let mut status = IpStatus::new().unwrap();
        status.mark_active(&a("1.2.3.4"));

        assert_eq!(status.value(&a("1.2.3.4").series()), Some(1.0));
        let text = status.render().unwrap();
        assert!(text.contains(r#"ddns_ip_status{ip="1.2.3.4",proxied="true",type="A"} 1"#));
    }

    #[test]
    fn inactive_series_survives_until_sweep() {
        let mut status = IpStatus::new().unwrap();
        status.mark_active(&a("1.2.3.4"));
        status.sweep_expired();

        status.mark_inactive(&a("1.2.3.4"));
        status.mark_active(&a("5.6.7.8"));

        assert_eq!(status.value(&a("1.2.3.4").series()), Some(0.0));
        assert_eq!(status.pending_removal().count(), 1);

        status.sweep_expired();

        assert_eq!(status.value(&a("1.2.3.4").series()), None);
        assert_eq!(status.value(&a("5.6.7.8").series()), Some(1.0));
        assert_eq!(status.pending_removal().count(), 0);
    }

    #[test]
    fn reactivated_series_is_not_swept() {
        let mut status = IpStatus::new().unwrap();
        status.mark_inactive(&a("1.2.3.4"));
        status.mark_active(&a("1.2.3.4"));

        status.sweep_expired();

        assert_eq!(status.value(&a("1.2.3.4").series()), Some(1.0));
    }

    #[test]
    fn series_active_this_cycle_is_not_zeroed() {
        let mut status = IpStatus::new().unwrap();
        status.mark_active(&a("1.2.3.4"));

        let orphan = DnsRecord::new(RecordType::A, "old.example.com", "1.2.3.4", true);
        status.mark_inactive(&orphan);

        assert_eq!(status.value(&orphan.series()), Some(1.0));
        assert_eq!(status.pending_removal().count(), 0);

        status.sweep_expired();
        assert_eq!(status.value(&orphan.series()), Some(1.0));
    }

    #[test]
    fn txt_records_are_not_tracked() {
        let mut status = IpStatus::new().unwrap();
        let txt = DnsRecord::new(RecordType::Txt, "home.example.com", "x", false);
        status.mark_active(&txt);
        status.mark_inactive(&txt);

        assert_eq!(status.pending_removal().count(), 0);
        assert!(!status.render().unwrap().contains("TXT"));
    }
}
