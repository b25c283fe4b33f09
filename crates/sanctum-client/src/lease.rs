use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::json;
use tracing::debug;

use crate::dispatch::Dispatcher;
use crate::error::{ClientError, Result};
use crate::lock;

/// A tracked credential lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    /// Server-assigned lease identifier.
    pub id: String,
    /// Credential path the lease was granted for.
    pub path: String,
    /// Time-to-live in seconds, when the server reported one.
    pub ttl: Option<u64>,
}

/// Records leases returned by retrieval calls and releases them on demand or
/// en masse at session teardown.
#[derive(Debug, Default)]
pub struct LeaseTracker {
    entries: Mutex<HashMap<String, Lease>>,
}

impl LeaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a lease. Re-recording an id replaces the previous entry.
    pub fn record(&self, lease: Lease) {
        debug!(lease_id = %lease.id, path = %lease.path, "tracking lease");
        lock(&self.entries).insert(lease.id.clone(), lease);
    }

    /// Release one lease.
    ///
    /// An unknown or already-released id succeeds without a server call. For
    /// a tracked id the entry is removed first, then the server release is
    /// issued; a failed server release is reported to the caller but the
    /// entry is not re-inserted.
    pub fn release(&self, dispatcher: &Dispatcher, lease_id: &str) -> Result<()> {
        if lock(&self.entries).remove(lease_id).is_none() {
            debug!(lease_id, "release of untracked lease is a no-op");
            return Ok(());
        }
        dispatcher
            .call("release_lease", json!({ "lease_id": lease_id }))
            .map(drop)
    }

    /// Release every tracked lease, collecting failures instead of stopping
    /// at the first one.
    pub fn release_all(&self, dispatcher: &Dispatcher) -> Vec<ClientError> {
        let drained: Vec<Lease> = {
            let mut entries = lock(&self.entries);
            entries.drain().map(|(_, lease)| lease).collect()
        };

        let mut failures = Vec::new();
        for lease in drained {
            if let Err(err) = dispatcher.call("release_lease", json!({ "lease_id": lease.id })) {
                failures.push(err);
            }
        }
        failures
    }

    /// Whether the given lease id is currently tracked.
    pub fn contains(&self, lease_id: &str) -> bool {
        lock(&self.entries).contains_key(lease_id)
    }

    /// Ids of all currently tracked leases.
    pub fn tracked_ids(&self) -> Vec<String> {
        lock(&self.entries).keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}
