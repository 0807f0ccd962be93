//! Ownership garbage collection
//!
//! Runs on what is left of the zone snapshot after every configured name was
//! reconciled. A leftover TXT carrying the heritage tag means the name used to
//! be managed by this controller and no longer is; its address records and
//! the marker itself are orphans. TXT records without the tag are foreign and
//! never touched.

use crate::error::Error;
use crate::metrics::IpStatus;
use crate::record::{DnsRecord, Outcome, RecordType, is_owned_marker};
use crate::snapshot::ZoneSnapshot;
use crate::traits::ZoneAuthority;
use tracing::warn;

/// Result of one garbage collection pass
#[derive(Debug, Default)]
pub struct Sweep {
    /// Orphans deleted or reported, in processing order
    pub outcomes: Vec<(DnsRecord, Outcome)>,
    /// Deletes that failed
    pub failures: Vec<(DnsRecord, Error)>,
}

/// Orphaned records for every owned marker left in `leftovers`
///
/// Per name the A record comes first, then AAAA, then the marker.
pub fn orphans(leftovers: &ZoneSnapshot) -> Vec<DnsRecord> {
    leftovers
        .remaining(RecordType::Txt)
        .filter(|txt| is_owned_marker(&txt.content))
        .flat_map(|txt| {
            let a = leftovers.get(RecordType::A, &txt.name);
            let aaaa = leftovers.get(RecordType::Aaaa, &txt.name);
            a.into_iter().chain(aaaa).chain(std::iter::once(txt))
        })
        .cloned()
        .collect()
}

/// Delete (or with `purge` off, only report) every orphan in `leftovers`
///
/// A failed delete is logged and does not stop the remaining deletes.
pub async fn collect(
    zone: &dyn ZoneAuthority,
    status: &mut IpStatus,
    leftovers: &ZoneSnapshot,
    purge: bool,
) -> Sweep {
    let mut sweep = Sweep::default();

    for record in orphans(leftovers) {
        if !purge {
            warn!(
                "Considering deleting {} record '{}': {}",
                record.record_type, record.name, record.content
            );
            sweep.outcomes.push((record, Outcome::OrphanCandidate));
            continue;
        }

        warn!(
            "Deleting {} record '{}': {}",
            record.record_type, record.name, record.content
        );
        match zone.delete_record(&record).await {
            Ok(()) => {
                status.mark_inactive(&record);
                sweep.outcomes.push((record, Outcome::Deleted));
            }
            Err(e) => {
                warn!(
                    "Failed to delete {} record '{}': {}",
                    record.record_type, record.name, e
                );
                sweep.failures.push((record, e));
            }
        }
    }

    sweep
}
