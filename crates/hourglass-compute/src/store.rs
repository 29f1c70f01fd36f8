//! In-memory result store with read-time expiry.
//!
//! # Locking
//!
//! One [`parking_lot::RwLock`] guards the whole map. Lookups take the read
//! lock and may run concurrently; [`ResultStore::insert`] takes the write
//! lock once per computed result. Entries are never updated in place and
//! never evicted: expiry is a comparison made on every read.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// How long a stored result stays verifiable.
pub const RESULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A computed result as recorded for later verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeResult {
    /// Store-generated identifier, unrelated to `request_id`.
    pub id: String,
    /// Identifier supplied by the caller.
    pub request_id: String,
    /// The computed output.
    pub output: String,
    /// When the computation finished.
    pub computed_at: DateTime<Utc>,
    /// How long the computation took, in milliseconds.
    pub duration_ms: u64,
    /// Non-deterministic side values recorded for audit.
    pub nondeterministic: BTreeMap<String, String>,
}

impl ComputeResult {
    /// Whether the result is past `ttl` at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now - self.computed_at > ttl,
            Err(_) => false,
        }
    }
}

/// Results keyed by their store-generated identifier.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use std::time::Duration;
/// use hourglass_compute::store::ResultStore;
///
/// let store = ResultStore::new();
/// let stored = store.insert("req-1", "16", Duration::from_millis(3), BTreeMap::new());
/// assert_eq!(store.get(&stored.id).unwrap().output, "16");
/// ```
#[derive(Debug)]
pub struct ResultStore {
    entries: RwLock<HashMap<String, ComputeResult>>,
    ttl: Duration,
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultStore {
    /// Creates an empty store with the standard 24 hour validity window.
    pub fn new() -> Self {
        Self::with_ttl(RESULT_TTL)
    }

    /// Creates an empty store with a custom validity window.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// The validity window.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Records a result computed now and returns the stored entry.
    pub fn insert(
        &self,
        request_id: impl Into<String>,
        output: impl Into<String>,
        duration: Duration,
        nondeterministic: BTreeMap<String, String>,
    ) -> ComputeResult {
        self.insert_at(request_id, output, duration, nondeterministic, Utc::now())
    }

    /// Records a result computed at `computed_at`.
    pub fn insert_at(
        &self,
        request_id: impl Into<String>,
        output: impl Into<String>,
        duration: Duration,
        nondeterministic: BTreeMap<String, String>,
        computed_at: DateTime<Utc>,
    ) -> ComputeResult {
        let result = ComputeResult {
            id: Uuid::new_v4().to_string(),
            request_id: request_id.into(),
            output: output.into(),
            computed_at,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            nondeterministic,
        };
        self.entries
            .write()
            .insert(result.id.clone(), result.clone());
        result
    }

    /// Looks up a result, applying expiry against the current time.
    pub fn get(&self, id: &str) -> Result<ComputeResult, StoreError> {
        self.get_at(id, Utc::now())
    }

    /// Looks up a result, applying expiry against `now`.
    pub fn get_at(&self, id: &str, now: DateTime<Utc>) -> Result<ComputeResult, StoreError> {
        let entries = self.entries.read();
        let result = entries
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if result.is_expired_at(now, self.ttl) {
            return Err(StoreError::Expired {
                id: id.to_string(),
                computed_at: result.computed_at,
            });
        }
        Ok(result.clone())
    }

    /// Number of stored results, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
