//! Per-key training serialization
//!
//! At most one training run per key may be in flight. Runs for different
//! keys never contend.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// What a second training request for a busy key does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LockPolicy {
    /// Wait for the running job to finish
    #[default]
    Block,
    /// Fail immediately with `TrainingInProgress`
    Reject,
}

/// Held for the duration of one training run
pub struct KeyGuard {
    key: String,
    _guard: ArcMutexGuard<RawMutex, ()>,
}

impl KeyGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Debug for KeyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyGuard").field("key", &self.key).finish()
    }
}

/// Registry of one mutex per key
#[derive(Debug, Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        locks.entry(key.to_string()).or_default().clone()
    }

    /// Take the training lock for `key` under `policy`
    pub fn acquire(&self, key: &str, policy: LockPolicy) -> Result<KeyGuard> {
        let lock = self.lock_for(key);
        let guard = match policy {
            LockPolicy::Block => lock.lock_arc(),
            LockPolicy::Reject => lock.try_lock_arc().ok_or_else(|| {
                ForecastError::TrainingInProgress {
                    key: key.to_string(),
                }
            })?,
        };
        Ok(KeyGuard {
            key: key.to_string(),
            _guard: guard,
        })
    }

    /// Whether a training run currently holds the lock for `key`
    pub fn is_locked(&self, key: &str) -> bool {
        self.locks
            .lock()
            .get(key)
            .map(|l| l.is_locked())
            .unwrap_or(false)
    }
}
