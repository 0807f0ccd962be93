//! Zone snapshot
//!
//! One snapshot is taken per cycle. It indexes every record of the requested
//! types by fully-qualified name and doubles as the reconciler's working set:
//! records matched to a configured name are taken out, and what remains after
//! all names were processed is handed to the garbage collector.

use crate::error::{Error, Result};
use crate::record::{DnsRecord, RecordType};
use crate::traits::ZoneAuthority;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Records of the zone indexed by type, then by fully-qualified name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneSnapshot {
    records: HashMap<RecordType, BTreeMap<String, DnsRecord>>,
}

impl ZoneSnapshot {
    /// Fetch all records of `types` from the zone
    ///
    /// # Errors
    ///
    /// - Any listing failure from the zone authority
    /// - `Error::ZoneApi` when the zone holds two records with the same
    ///   (type, name); the snapshot cannot decide which one is managed
    pub async fn fetch(zone: &dyn ZoneAuthority, types: &[RecordType]) -> Result<Self> {
        let mut snapshot = Self::default();

        for &record_type in types {
            let records = zone.list_records(record_type).await?;
            debug!("Fetched {} {} record(s)", records.len(), record_type);
            snapshot.insert_all(record_type, records)?;
        }

        Ok(snapshot)
    }

    /// Build a snapshot from already fetched records
    pub fn from_records(records: impl IntoIterator<Item = DnsRecord>) -> Result<Self> {
        let mut snapshot = Self::default();
        for record in records {
            snapshot.insert(record)?;
        }
        Ok(snapshot)
    }

    fn insert_all(&mut self, record_type: RecordType, records: Vec<DnsRecord>) -> Result<()> {
        // Make sure the type is present even when the zone has none of it
        self.records.entry(record_type).or_default();

        for record in records {
            if record.record_type != record_type {
                return Err(Error::zone_api(format!(
                    "Listing of {} records returned a {} record for {}",
                    record_type, record.record_type, record.name
                )));
            }
            self.insert(record)?;
        }
        Ok(())
    }

    fn insert(&mut self, record: DnsRecord) -> Result<()> {
        let by_name = self.records.entry(record.record_type).or_default();
        if let Some(existing) = by_name.get(&record.name) {
            return Err(Error::zone_api(format!(
                "Zone holds more than one {} record for {} (ids {} and {})",
                record.record_type, record.name, existing.id, record.id
            )));
        }
        by_name.insert(record.name.clone(), record);
        Ok(())
    }

    /// Look up a record without removing it
    pub fn get(&self, record_type: RecordType, name: &str) -> Option<&DnsRecord> {
        self.records.get(&record_type)?.get(name)
    }

    /// Take a record out of the working set
    pub fn take(&mut self, record_type: RecordType, name: &str) -> Option<DnsRecord> {
        self.records.get_mut(&record_type)?.remove(name)
    }

    /// Remaining records of a type, ordered by name
    pub fn remaining(&self, record_type: RecordType) -> impl Iterator<Item = &DnsRecord> {
        self.records
            .get(&record_type)
            .into_iter()
            .flat_map(|by_name| by_name.values())
    }

    /// Number of remaining records of a type
    pub fn len(&self, record_type: RecordType) -> usize {
        self.records.get(&record_type).map_or(0, BTreeMap::len)
    }

    /// Whether no record of any type remains
    pub fn is_empty(&self) -> bool {
        self.records.values().all(BTreeMap::is_empty)
    }
}
