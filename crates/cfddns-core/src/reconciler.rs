//! Single-record reconciliation
//!
//! Compares one desired record with its counterpart from the zone snapshot
//! and issues at most one mutation to make them equal.

use crate::error::{Error, Result};
use crate::metrics::IpStatus;
use crate::record::{DnsRecord, Outcome};
use crate::traits::ZoneAuthority;
use tracing::{debug, info};

/// Converge `actual` towards `desired`
///
/// - absent: create, gauge ACTIVE for the desired series
/// - content and proxy flag match: no call, gauge ACTIVE
/// - otherwise: update by the actual record's id, new series ACTIVE and old
///   series INACTIVE
///
/// The gauge only moves after the mutation succeeded.
///
/// # Errors
///
/// - `Error::Consistency` when `desired` and `actual` differ in name or type
/// - Whatever the zone authority returns for the mutation
pub async fn reconcile(
    zone: &dyn ZoneAuthority,
    status: &mut IpStatus,
    desired: &DnsRecord,
    actual: Option<&DnsRecord>,
) -> Result<Outcome> {
    let Some(actual) = actual else {
        info!("Adding new {} record for {}", desired.record_type, desired.name);
        zone.create_record(desired).await?;
        status.mark_active(desired);
        return Ok(Outcome::Created);
    };

    if desired.name != actual.name {
        return Err(Error::consistency(format!(
            "Cannot compare different fqdn records ('{}' and '{}')",
            desired.name, actual.name
        )));
    }
    if desired.record_type != actual.record_type {
        return Err(Error::consistency(format!(
            "Cannot compare different record types ('{}' and '{}')",
            desired.record_type, actual.record_type
        )));
    }

    if desired.matches(actual) {
        debug!("The {} record for {} is up to date", actual.record_type, actual.name);
        status.mark_active(desired);
        return Ok(Outcome::Unchanged);
    }

    info!("Updating record: '{}' -> '{}'", actual, desired);
    zone.update_record(&actual.id, desired).await?;
    status.mark_active(desired);
    status.mark_inactive(actual);
    Ok(Outcome::Updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordType;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Zone that records mutations and fails them on demand
    #[derive(Default)]
    struct Calls {
        log: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl ZoneAuthority for Calls {
        async fn base_domain(&self) -> Result<String> {
            Ok("example.com".to_string())
        }

        async fn list_records(&self, _record_type: RecordType) -> Result<Vec<DnsRecord>> {
            Ok(Vec::new())
        }

        async fn create_record(&self, record: &DnsRecord) -> Result<DnsRecord> {
            if self.fail {
                return Err(Error::zone_api("create refused"));
            }
            self.log.lock().unwrap().push(format!("create {}", record.content));
            Ok(record.clone().with_id("new"))
        }

        async fn update_record(&self, id: &str, record: &DnsRecord) -> Result<DnsRecord> {
            if self.fail {
                return Err(Error::zone_api("update refused"));
            }
            self.log
                .lock()
                .unwrap()
                .push(format!("update {} {}", id, record.content));
            Ok(record.clone().with_id(id))
        }

        async fn delete_record(&self, record: &DnsRecord) -> Result<()> {
            self.log.lock().unwrap().push(format!("delete {}", record.id));
            Ok(())
        }

        fn provider_name(&self) -> &'static str {
            "calls"
        }
    }

    fn a(ip: &str) -> DnsRecord {
        DnsRecord::new(RecordType::A, "home.example.com", ip, false)
    }

    #[tokio::test]
    async fn absent_record_is_created() {
        let zone = Calls::default();
        let mut status = IpStatus::new().unwrap();

        let outcome = reconcile(&zone, &mut status, &a("203.0.113.5"), None).await.unwrap();

        assert_eq!(outcome, Outcome::Created);
        assert_eq!(*zone.log.lock().unwrap(), vec!["create 203.0.113.5"]);
        assert_eq!(status.value(&a("203.0.113.5").series()), Some(1.0));
    }

    #[tokio::test]
    async fn matching_record_issues_no_call() {
        let zone = Calls::default();
        let mut status = IpStatus::new().unwrap();
        let actual = a("203.0.113.5").with_id("r1");

        let outcome = reconcile(&zone, &mut status, &a("203.0.113.5"), Some(&actual))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Unchanged);
        assert!(zone.log.lock().unwrap().is_empty());
        assert_eq!(status.value(&actual.series()), Some(1.0));
    }

    #[tokio::test]
    async fn differing_record_is_updated_by_actual_id() {
        let zone = Calls::default();
        let mut status = IpStatus::new().unwrap();
        let actual = a("1.2.3.4").with_id("r1");

        let outcome = reconcile(&zone, &mut status, &a("5.6.7.8"), Some(&actual))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Updated);
        assert_eq!(*zone.log.lock().unwrap(), vec!["update r1 5.6.7.8"]);
        assert_eq!(status.value(&a("5.6.7.8").series()), Some(1.0));
        assert_eq!(status.value(&actual.series()), Some(0.0));
    }

    #[tokio::test]
    async fn proxy_flag_change_is_an_update() {
        let zone = Calls::default();
        let mut status = IpStatus::new().unwrap();
        let actual = a("203.0.113.5").with_id("r1");
        let mut desired = a("203.0.113.5");
        desired.proxied = true;

        let outcome = reconcile(&zone, &mut status, &desired, Some(&actual)).await.unwrap();
        assert_eq!(outcome, Outcome::Updated);
    }

    #[tokio::test]
    async fn name_mismatch_is_a_consistency_violation() {
        let zone = Calls::default();
        let mut status = IpStatus::new().unwrap();
        let mut actual = a("203.0.113.5").with_id("r1");
        actual.name = "other.example.com".to_string();

        let err = reconcile(&zone, &mut status, &a("203.0.113.5"), Some(&actual))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Consistency(_)));
        assert!(err.is_fatal());
        assert!(zone.log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn type_mismatch_is_a_consistency_violation() {
        let zone = Calls::default();
        let mut status = IpStatus::new().unwrap();
        let actual = DnsRecord::new(RecordType::Aaaa, "home.example.com", "2001:db8::1", false)
            .with_id("r1");

        let err = reconcile(&zone, &mut status, &a("203.0.113.5"), Some(&actual))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Consistency(_)));
    }

    #[tokio::test]
    async fn failed_mutation_leaves_gauge_alone() {
        let zone = Calls {
            fail: true,
            ..Calls::default()
        };
        let mut status = IpStatus::new().unwrap();
        let actual = a("1.2.3.4").with_id("r1");

        assert!(reconcile(&zone, &mut status, &a("5.6.7.8"), Some(&actual)).await.is_err());
        assert!(reconcile(&zone, &mut status, &a("9.9.9.9"), None).await.is_err());

        assert_eq!(status.value(&a("5.6.7.8").series()), None);
        assert_eq!(status.value(&a("9.9.9.9").series()), None);
        assert_eq!(status.pending_removal().count(), 0);
    }
}
