//! Test doubles and common utilities for controller contract tests
//!
//! The doubles share their state through `Arc`s so a test can keep a handle
//! after moving a double into the controller (see `sharing_counters_with`).

#![allow(dead_code)]

use cfddns_core::error::{Error, Result};
use cfddns_core::record::{AddressFamily, DnsRecord, RecordType};
use cfddns_core::traits::{AddressSource, ZoneAuthority};
use cfddns_core::{Controller, ControllerConfig, ControllerEvent, Credentials};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const BASE_DOMAIN: &str = "example.com";
pub const OWNER: &str = "ddns-test";

/// In-memory zone authority that records every mutation
pub struct InMemoryZone {
    base_domain: String,
    records: Arc<Mutex<Vec<DnsRecord>>>,
    next_id: Arc<AtomicUsize>,
    list_call_count: Arc<AtomicUsize>,
    create_call_count: Arc<AtomicUsize>,
    update_call_count: Arc<AtomicUsize>,
    delete_call_count: Arc<AtomicUsize>,
    /// Names whose create/update/delete calls fail
    failing_names: Arc<Mutex<HashSet<String>>>,
    /// Error returned by every listing, when set
    list_error: Arc<Mutex<Option<fn() -> Error>>>,
    /// Delay applied to every listing
    list_latency: Arc<Mutex<Duration>>,
}

impl InMemoryZone {
    pub fn new() -> Self {
        Self {
            base_domain: BASE_DOMAIN.to_string(),
            records: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicUsize::new(1)),
            list_call_count: Arc::new(AtomicUsize::new(0)),
            create_call_count: Arc::new(AtomicUsize::new(0)),
            update_call_count: Arc::new(AtomicUsize::new(0)),
            delete_call_count: Arc::new(AtomicUsize::new(0)),
            failing_names: Arc::new(Mutex::new(HashSet::new())),
            list_error: Arc::new(Mutex::new(None)),
            list_latency: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Create a zone double that shares records and counters with `other`
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            base_domain: other.base_domain.clone(),
            records: Arc::clone(&other.records),
            next_id: Arc::clone(&other.next_id),
            list_call_count: Arc::clone(&other.list_call_count),
            create_call_count: Arc::clone(&other.create_call_count),
            update_call_count: Arc::clone(&other.update_call_count),
            delete_call_count: Arc::clone(&other.delete_call_count),
            failing_names: Arc::clone(&other.failing_names),
            list_error: Arc::clone(&other.list_error),
            list_latency: Arc::clone(&other.list_latency),
        }
    }

    /// Seed a record; an empty id is replaced by a generated one
    pub fn insert(&self, mut record: DnsRecord) -> DnsRecord {
        if record.id.is_empty() {
            record.id = self.generate_id();
        }
        self.records.lock().unwrap().push(record.clone());
        record
    }

    pub fn records(&self) -> Vec<DnsRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn find(&self, record_type: RecordType, name: &str) -> Option<DnsRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.record_type == record_type && r.name == name)
            .cloned()
    }

    pub fn fail_writes_for(&self, name: &str) {
        self.failing_names.lock().unwrap().insert(name.to_string());
    }

    pub fn fail_listing_with(&self, error: fn() -> Error) {
        *self.list_error.lock().unwrap() = Some(error);
    }

    /// Stop injecting failures
    pub fn recover(&self) {
        self.failing_names.lock().unwrap().clear();
        *self.list_error.lock().unwrap() = None;
    }

    pub fn set_list_latency(&self, latency: Duration) {
        *self.list_latency.lock().unwrap() = latency;
    }

    pub fn list_call_count(&self) -> usize {
        self.list_call_count.load(Ordering::SeqCst)
    }

    pub fn create_call_count(&self) -> usize {
        self.create_call_count.load(Ordering::SeqCst)
    }

    pub fn update_call_count(&self) -> usize {
        self.update_call_count.load(Ordering::SeqCst)
    }

    pub fn delete_call_count(&self) -> usize {
        self.delete_call_count.load(Ordering::SeqCst)
    }

    /// Total create + update + delete calls, failed ones included
    pub fn mutation_count(&self) -> usize {
        self.create_call_count() + self.update_call_count() + self.delete_call_count()
    }

    fn generate_id(&self) -> String {
        format!("rec-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn check_writable(&self, name: &str) -> Result<()> {
        if self.failing_names.lock().unwrap().contains(name) {
            return Err(Error::zone_api(format!("write to {} refused", name)));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ZoneAuthority for InMemoryZone {
    async fn base_domain(&self) -> Result<String> {
        Ok(self.base_domain.clone())
    }

    async fn list_records(&self, record_type: RecordType) -> Result<Vec<DnsRecord>> {
        self.list_call_count.fetch_add(1, Ordering::SeqCst);

        let latency = *self.list_latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let list_error = *self.list_error.lock().unwrap();
        if let Some(error) = list_error {
            return Err(error());
        }

        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.record_type == record_type)
            .cloned()
            .collect())
    }

    async fn create_record(&self, record: &DnsRecord) -> Result<DnsRecord> {
        self.create_call_count.fetch_add(1, Ordering::SeqCst);
        self.check_writable(&record.name)?;

        // Stored names are lowercase and identical records are refused, as
        // Cloudflare does
        let mut created = record.clone().with_id(self.generate_id());
        created.name = created.name.to_ascii_lowercase();

        let mut records = self.records.lock().unwrap();
        if records.iter().any(|r| {
            r.record_type == created.record_type
                && r.name == created.name
                && r.content == created.content
        }) {
            return Err(Error::provider("in-memory", "[81057] Record already exists."));
        }
        records.push(created.clone());
        Ok(created)
    }

    async fn update_record(&self, id: &str, record: &DnsRecord) -> Result<DnsRecord> {
        self.update_call_count.fetch_add(1, Ordering::SeqCst);
        self.check_writable(&record.name)?;

        let mut records = self.records.lock().unwrap();
        let existing = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::not_found(format!("record {}", id)))?;
        *existing = record.clone().with_id(id);
        existing.name = existing.name.to_ascii_lowercase();
        Ok(existing.clone())
    }

    async fn delete_record(&self, record: &DnsRecord) -> Result<()> {
        self.delete_call_count.fetch_add(1, Ordering::SeqCst);
        self.check_writable(&record.name)?;

        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.id != record.id);
        if records.len() == before {
            return Err(Error::not_found(format!("record {}", record.id)));
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "in-memory"
    }
}

/// Echo source whose answers are scripted per family
pub struct ScriptedSource {
    answers: Arc<Mutex<HashMap<AddressFamily, String>>>,
    fetch_call_count: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            answers: Arc::new(Mutex::new(HashMap::new())),
            fetch_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            answers: Arc::clone(&other.answers),
            fetch_call_count: Arc::clone(&other.fetch_call_count),
        }
    }

    /// Answer `family` with `ip` from now on
    pub fn set(&self, family: AddressFamily, ip: &str) {
        self.answers.lock().unwrap().insert(family, trace_body(ip));
    }

    /// Make `family` unreachable from now on
    pub fn fail(&self, family: AddressFamily) {
        self.answers.lock().unwrap().remove(&family);
    }

    pub fn fetch_call_count(&self) -> usize {
        self.fetch_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AddressSource for ScriptedSource {
    async fn fetch(&self, family: AddressFamily) -> Result<String> {
        self.fetch_call_count.fetch_add(1, Ordering::SeqCst);
        self.answers
            .lock()
            .unwrap()
            .get(&family)
            .cloned()
            .ok_or_else(|| Error::detection(format!("{} echo endpoint unreachable", family)))
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// Echo response body as served by `/cdn-cgi/trace`
pub fn trace_body(ip: &str) -> String {
    format!(
        "fl=29f1\nh=1.1.1.1\nip={}\nts=1700000000.123\nvisit_scheme=https\nwarp=off\n",
        ip
    )
}

/// Configuration managing `labels` below [`BASE_DOMAIN`]
pub fn config(labels: &[&str], ipv4: bool, ipv6: bool) -> ControllerConfig {
    let mut config = ControllerConfig::new(
        "023e105f4ecef8ad9ca31a8372d0c353",
        Credentials::ApiToken {
            token: "test-token".to_string(),
        },
        OWNER,
    );
    config.subdomains = labels.iter().map(|l| l.to_string()).collect();
    config.ipv4 = ipv4;
    config.ipv6 = ipv6;
    config.event_channel_capacity = 100;
    config
}

/// Build a controller over doubles sharing state with `zone` and `source`
pub fn controller(
    zone: &InMemoryZone,
    source: &ScriptedSource,
    config: ControllerConfig,
) -> (Controller, mpsc::Receiver<ControllerEvent>) {
    Controller::new(
        Box::new(InMemoryZone::sharing_counters_with(zone)),
        Box::new(ScriptedSource::sharing_counters_with(source)),
        config,
    )
    .expect("controller construction succeeds")
}

/// Wait until `condition` holds, polling every few milliseconds
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {}", what);
}
