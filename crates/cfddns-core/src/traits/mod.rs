//! Core traits for the DDNS controller
//!
//! - [`ZoneAuthority`]: Read and mutate records of the managed zone
//! - [`AddressSource`]: Reach the public address echo endpoints
//! - [`LeadershipGate`]: Start/stop notifications from the fleet's lock

pub mod address_source;
pub mod leadership;
pub mod zone_authority;

pub use address_source::AddressSource;
pub use leadership::{LeadershipChange, LeadershipGate};
pub use zone_authority::ZoneAuthority;
