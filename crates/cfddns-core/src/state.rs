// # Address State
//
// Last successfully detected public address per family.
//
// ## Ownership
//
// The state is created at process start and owned by the [`Controller`].
// The IP detector writes it once per cycle; the desired-state generator
// reads the detection result derived from it. Nothing else touches it, so
// no locking is needed.
//
// ## Crash Behavior
//
// The state is in-memory only. After a restart every family is reported as
// changed on the first cycle, which is harmless: reconciliation compares
// against the zone, not against this state.
//
// [`Controller`]: crate::engine::Controller

use crate::record::{Address, AddressFamily};
use std::collections::HashMap;

/// Last known address per family
#[derive(Debug, Clone, Default)]
pub struct AddressState {
    known: HashMap<AddressFamily, String>,
}

impl AddressState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Last stored address for a family
    pub fn get(&self, family: AddressFamily) -> Option<&str> {
        self.known.get(&family).map(String::as_str)
    }

    /// Store a freshly detected address
    ///
    /// Returns `true` when the value differs from the stored one (exact
    /// string comparison) or nothing was stored yet.
    pub fn record(&mut self, address: &Address) -> bool {
        if self.get(address.family) == Some(address.value.as_str()) {
            return false;
        }
        self.known.insert(address.family, address.value.clone());
        true
    }

    /// Number of families with a stored address
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Whether nothing has been detected yet
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}
