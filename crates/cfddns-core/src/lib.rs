// # cfddns-core
//
// Core library of the leader-elected Cloudflare DDNS controller.
//
// ## Architecture Overview
//
// - **AddressSource**: Trait for reaching the public address echo endpoints
// - **ZoneAuthority**: Trait for the DNS provider's record-management API
// - **LeadershipGate**: Trait granting at-most-one-active execution
// - **Controller**: Detect, snapshot, reconcile and garbage-collect, once per
//   interval
// - **Supervisor**: Runs the controller only while leadership is held
//
// ## Ownership
//
// Records are owned when a TXT marker carrying the heritage tag exists for
// their name. Only owned records are ever deleted, and only with purge
// enabled.

pub mod config;
pub mod desired;
pub mod detector;
pub mod engine;
pub mod error;
pub mod gc;
pub mod leadership;
pub mod metrics;
pub mod reconciler;
pub mod record;
pub mod snapshot;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{ControllerConfig, Credentials, ElectionConfig};
pub use detector::{Detection, IpDetector};
pub use engine::{Controller, ControllerEvent, CycleReport, RecordFailure};
pub use error::{Error, Result};
pub use leadership::{ChannelGate, LeadershipHandle, StandaloneGate, Supervisor};
pub use metrics::IpStatus;
pub use record::{Address, AddressFamily, DesiredRecordSet, DnsRecord, Outcome, RecordType};
pub use snapshot::ZoneSnapshot;
pub use state::AddressState;
pub use traits::{AddressSource, LeadershipChange, LeadershipGate, ZoneAuthority};
