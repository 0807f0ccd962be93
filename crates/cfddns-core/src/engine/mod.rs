//! Reconciliation controller
//!
//! The Controller is responsible for:
//! - Detecting the public addresses via the IpDetector
//! - Taking one snapshot of the zone per cycle
//! - Converging every configured name towards its desired records
//! - Sweeping orphaned records left behind by earlier configurations
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐         ┌──────────────┐
//! │ IpDetector  │──addr──▶│  Controller  │◀── CancellationToken
//! └─────────────┘         └──────────────┘
//!                                 │
//!       ┌─────────────────┬───────┴─────────┬─────────────────┐
//!       ▼                 ▼                 ▼                 ▼
//! ┌────────────┐   ┌─────────────┐   ┌────────────┐   ┌─────────────┐
//! │ZoneSnapshot│   │ reconcile() │   │  gc sweep  │   │   Events    │
//! │  (fetch)   │   │ (per record)│   │ (orphans)  │   │  (notify)   │
//! └────────────┘   └─────────────┘   └────────────┘   └─────────────┘
//! ```
//!
//! ## Cycle
//!
//! 1. Drop gauge series superseded during the previous cycle
//! 2. Refresh addresses; skip the cycle when no family was detected
//! 3. Snapshot A, AAAA and TXT records of the zone
//! 4. Per configured name: reconcile A, AAAA, then the ownership marker
//! 5. Garbage-collect leftover owned markers and their address records

use crate::config::ControllerConfig;
use crate::desired;
use crate::detector::IpDetector;
use crate::error::{Error, Result};
use crate::gc;
use crate::metrics::IpStatus;
use crate::reconciler::reconcile;
use crate::record::{Address, DnsRecord, Outcome, RecordType};
use crate::snapshot::ZoneSnapshot;
use crate::state::AddressState;
use crate::traits::{AddressSource, ZoneAuthority};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Events emitted by the Controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// Controller loop started
    Started {
        names_count: usize,
    },

    /// A reconciliation cycle started
    CycleStarted {
        started_at: DateTime<Utc>,
    },

    /// A record was created
    RecordCreated {
        record: DnsRecord,
    },

    /// A record was updated in place
    RecordUpdated {
        record: DnsRecord,
    },

    /// An orphaned record was deleted
    RecordDeleted {
        record: DnsRecord,
    },

    /// An orphaned record was found but kept (purge disabled)
    OrphanFound {
        record: DnsRecord,
    },

    /// A single record could not be reconciled this cycle
    RecordFailed {
        record_type: RecordType,
        name: String,
        error: String,
    },

    /// A cycle was abandoned before reconciling anything
    CycleSkipped {
        error: String,
    },

    /// A reconciliation cycle finished
    CycleFinished {
        changes: usize,
        failures: usize,
    },

    /// Controller loop stopped
    Stopped {
        reason: String,
    },
}

/// A record that could not be reconciled
#[derive(Debug)]
pub struct RecordFailure {
    /// Record type
    pub record_type: RecordType,
    /// Fully-qualified name
    pub name: String,
    /// Cause
    pub error: Error,
}

/// Summary of one completed cycle
#[derive(Debug)]
pub struct CycleReport {
    /// Cycle start
    pub started_at: DateTime<Utc>,
    /// Cycle end
    pub finished_at: DateTime<Utc>,
    /// Addresses detected this cycle
    pub addresses: Vec<Address>,
    /// Whether any detected address differs from the previous cycle
    pub changed: bool,
    /// Per-record outcomes, in processing order
    pub outcomes: Vec<(DnsRecord, Outcome)>,
    /// Records that could not be reconciled (retried next cycle)
    pub failures: Vec<RecordFailure>,
}

impl CycleReport {
    /// Number of records with the given outcome
    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.iter().filter(|(_, o)| *o == outcome).count()
    }

    /// Number of mutations issued against the zone
    pub fn changes(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, Outcome::Created | Outcome::Updated | Outcome::Deleted))
            .count()
    }
}

/// Reconciliation controller
///
/// Owns the zone authority, the detector, the last-known addresses and the
/// status gauge. Exactly one controller may run cycles against a zone at a
/// time; the [`Supervisor`](crate::leadership::Supervisor) enforces that by
/// only running it while leadership is held.
///
/// ## Lifecycle
///
/// 1. Create with [`Controller::new()`]
/// 2. Run cycles with [`Controller::run()`] until the token is cancelled
/// 3. Run again later; address state and gauge are kept
pub struct Controller {
    /// Zone authority for reads and mutations
    zone: Box<dyn ZoneAuthority>,

    /// Public address detection
    detector: IpDetector,

    /// Validated configuration
    config: ControllerConfig,

    /// Last successfully detected addresses
    state: AddressState,

    /// `ddns_ip_status` gauge
    status: IpStatus,

    /// Zone name, read on the first cycle
    base_domain: Option<String>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ControllerEvent>,
}

impl Controller {
    /// Create a new controller
    ///
    /// # Returns
    ///
    /// A tuple of (controller, event_receiver) where event_receiver yields
    /// controller events
    pub fn new(
        zone: Box<dyn ZoneAuthority>,
        source: Box<dyn AddressSource>,
        config: ControllerConfig,
    ) -> Result<(Self, mpsc::Receiver<ControllerEvent>)> {
        Self::with_status(zone, source, config, IpStatus::new()?)
    }

    /// Create a controller reporting into an existing gauge
    pub fn with_status(
        zone: Box<dyn ZoneAuthority>,
        source: Box<dyn AddressSource>,
        config: ControllerConfig,
        status: IpStatus,
    ) -> Result<(Self, mpsc::Receiver<ControllerEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let controller = Self {
            zone,
            detector: IpDetector::new(source),
            config,
            state: AddressState::new(),
            status,
            base_domain: None,
            event_tx: tx,
        };

        Ok((controller, rx))
    }

    /// Configuration in use
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Last detected addresses
    pub fn address_state(&self) -> &AddressState {
        &self.state
    }

    /// Status gauge
    pub fn ip_status(&self) -> &IpStatus {
        &self.status
    }

    /// Run cycles until `cancel` fires
    ///
    /// Cancellation is only observed between cycles, so a started cycle
    /// always completes.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Cancelled
    /// - `Err(Error)`: Fatal error (see [`Error::is_fatal`])
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        info!(
            "Starting reconciliation of {} name(s) every {}s",
            self.config.subdomains.len(),
            self.config.interval_secs
        );
        self.emit_event(ControllerEvent::Started {
            names_count: self.config.subdomains.len(),
        });

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.run_cycle().await {
                Ok(report) => {
                    debug!(
                        "Cycle finished: {} change(s), {} failure(s)",
                        report.changes(),
                        report.failures.len()
                    );
                }
                Err(e) if e.is_fatal() => {
                    error!("Stopping reconciliation: {}", e);
                    self.emit_event(ControllerEvent::Stopped {
                        reason: e.to_string(),
                    });
                    return Err(e);
                }
                Err(e) => {
                    warn!("Reconciliation cycle skipped: {}", e);
                    self.emit_event(ControllerEvent::CycleSkipped {
                        error: e.to_string(),
                    });
                }
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval()) => {}
            }
        }

        info!("Reconciliation stopped");
        self.emit_event(ControllerEvent::Stopped {
            reason: "Cancelled".to_string(),
        });
        Ok(())
    }

    /// Run a single reconciliation cycle
    ///
    /// # Errors
    ///
    /// An error means the cycle was abandoned as a whole: no family detected,
    /// zone metadata or snapshot unavailable, or a fatal error while
    /// reconciling. Failures of individual records are reported in
    /// [`CycleReport::failures`] instead.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let started_at = Utc::now();
        info!("Start record reconciliation");
        self.emit_event(ControllerEvent::CycleStarted { started_at });

        self.status.sweep_expired();

        let families = self.config.enabled_families();
        let detection = self.detector.refresh(&families, &mut self.state).await;
        if detection.is_empty() {
            let causes: Vec<String> = detection
                .failures
                .iter()
                .map(|(family, e)| format!("{}: {}", family, e))
                .collect();
            return Err(Error::detection(format!(
                "No address family could be detected ({})",
                causes.join("; ")
            )));
        }

        let base_domain = self.base_domain().await?;
        let mut snapshot = ZoneSnapshot::fetch(self.zone.as_ref(), &RecordType::ALL).await?;

        let mut report = CycleReport {
            started_at,
            finished_at: started_at,
            addresses: detection.addresses.clone(),
            changed: detection.changed,
            outcomes: Vec::new(),
            failures: Vec::new(),
        };

        info!("Updating configured domains");
        let labels = self.config.labels();
        for label in &labels {
            let set = desired::build(
                &base_domain,
                label,
                &detection,
                self.config.proxied,
                &self.config.owner_id,
            );

            for record in set.address_records() {
                let actual = snapshot.take(record.record_type, &set.name);
                self.apply(record, actual.as_ref(), &mut report).await?;
            }

            let actual_marker = snapshot.take(RecordType::Txt, &set.name);
            match &set.marker {
                Some(marker) => self.apply(marker, actual_marker.as_ref(), &mut report).await?,
                None => debug!("No address detected for {}, leaving its records alone", set.name),
            }
        }

        info!("Checking out-of-sync records");
        let sweep = gc::collect(
            self.zone.as_ref(),
            &mut self.status,
            &snapshot,
            self.config.purge,
        )
        .await;

        for (record, outcome) in sweep.outcomes {
            let event = match outcome {
                Outcome::Deleted => ControllerEvent::RecordDeleted {
                    record: record.clone(),
                },
                _ => ControllerEvent::OrphanFound {
                    record: record.clone(),
                },
            };
            self.emit_event(event);
            report.outcomes.push((record, outcome));
        }
        for (record, error) in sweep.failures {
            self.record_failure(&record, error, &mut report);
        }

        report.finished_at = Utc::now();
        info!("Finished reconciliation");
        self.emit_event(ControllerEvent::CycleFinished {
            changes: report.changes(),
            failures: report.failures.len(),
        });

        Ok(report)
    }

    /// Reconcile one record and fold the result into `report`
    ///
    /// Only fatal errors are returned; everything else is recorded.
    async fn apply(
        &mut self,
        desired: &DnsRecord,
        actual: Option<&DnsRecord>,
        report: &mut CycleReport,
    ) -> Result<()> {
        match reconcile(self.zone.as_ref(), &mut self.status, desired, actual).await {
            Ok(outcome) => {
                match outcome {
                    Outcome::Created => self.emit_event(ControllerEvent::RecordCreated {
                        record: desired.clone(),
                    }),
                    Outcome::Updated => self.emit_event(ControllerEvent::RecordUpdated {
                        record: desired.clone(),
                    }),
                    _ => {}
                }
                report.outcomes.push((desired.clone(), outcome));
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(
                    "Failed to reconcile {} record for {}: {}",
                    desired.record_type, desired.name, e
                );
                self.record_failure(desired, e, report);
                Ok(())
            }
        }
    }

    fn record_failure(&self, record: &DnsRecord, error: Error, report: &mut CycleReport) {
        self.emit_event(ControllerEvent::RecordFailed {
            record_type: record.record_type,
            name: record.name.clone(),
            error: error.to_string(),
        });
        report.failures.push(RecordFailure {
            record_type: record.record_type,
            name: record.name.clone(),
            error,
        });
    }

    /// Zone name, fetched once and cached
    async fn base_domain(&mut self) -> Result<String> {
        if let Some(base) = &self.base_domain {
            return Ok(base.clone());
        }

        let base = self.zone.base_domain().await?.to_ascii_lowercase();
        info!(
            "Managing zone {} via {}",
            base,
            self.zone.provider_name()
        );
        self.base_domain = Some(base.clone());
        Ok(base)
    }

    /// Emit a controller event
    fn emit_event(&self, event: ControllerEvent) {
        // Never block a cycle on a slow consumer
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => warn!(
                "Event channel full, dropping event. Consider increasing event_channel_capacity."
            ),
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
