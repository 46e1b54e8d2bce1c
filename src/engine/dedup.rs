//! Short-window duplicate-order filter.
//!
//! Prevents double-submission from UI double-clicks or retried caller
//! logic: two orders with identical (symbol, side, quantity) inside the
//! window are treated as accidental resubmissions. Expired entries are
//! pruned lazily on every check, not on a separate timer.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::debug;

use crate::domain::OrderRequest;

pub struct DuplicateFilter {
    window: Duration,
    entries: HashMap<String, DateTime<Utc>>,
}

impl DuplicateFilter {
    pub fn new(window_secs: u64) -> Self {
        Self {
            window: Duration::seconds(window_secs as i64),
            entries: HashMap::new(),
        }
    }

    /// Deterministic digest of the fields that identify a resubmission.
    pub fn fingerprint(request: &OrderRequest) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request.symbol.as_bytes());
        hasher.update(request.side.to_string().as_bytes());
        hasher.update(request.quantity.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Whether an entry for this request was recorded inside the window.
    pub fn is_duplicate(&mut self, request: &OrderRequest) -> bool {
        self.prune();
        self.entries.contains_key(&Self::fingerprint(request))
    }

    /// Arm the window for this request (called on accepted submissions).
    pub fn record(&mut self, request: &OrderRequest) {
        self.entries.insert(Self::fingerprint(request), Utc::now());
    }

    fn prune(&mut self) {
        let cutoff = Utc::now() - self.window;
        let before = self.entries.len();
        self.entries.retain(|_, recorded_at| *recorded_at > cutoff);
        let pruned = before - self.entries.len();
        if pruned > 0 {
            debug!("Pruned {} expired duplicate-filter entries", pruned);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
