//! Per-asset serialization of validate-then-append.
//!
//! Two transfers for the same asset must not both observe the same "current
//! state". [`AssetLocks`] hands out one async mutex per asset id; transfers
//! for different assets never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::OwnedMutexGuard;

use crate::types::EntityId;

type LockMap = HashMap<EntityId, Arc<tokio::sync::Mutex<()>>>;

/// Registry of per-asset locks. Entries are removed once nobody holds or
/// awaits them, so the map only grows with in-flight transfers.
#[derive(Debug, Clone, Default)]
pub struct AssetLocks {
    locks: Arc<Mutex<LockMap>>,
}

/// Held for the duration of one asset's validate-then-append sequence.
#[derive(Debug)]
pub struct AssetGuard {
    asset_id: EntityId,
    locks: Arc<Mutex<LockMap>>,
    _guard: OwnedMutexGuard<()>,
}

impl AssetLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `asset_id`.
    pub async fn acquire(&self, asset_id: EntityId) -> AssetGuard {
        let lock = {
            let mut map = lock_map(&self.locks);
            Arc::clone(map.entry(asset_id).or_default())
        };
        let guard = lock.lock_owned().await;
        AssetGuard {
            asset_id,
            locks: Arc::clone(&self.locks),
            _guard: guard,
        }
    }

    /// Number of assets with a holder or waiter.
    pub fn active(&self) -> usize {
        lock_map(&self.locks).len()
    }
}

impl Drop for AssetGuard {
    fn drop(&mut self) {
        let mut map = lock_map(&self.locks);
        // One reference in the map plus the one inside our guard.
        let idle = map
            .get(&self.asset_id)
            .is_some_and(|lock| Arc::strong_count(lock) <= 2);
        if idle {
            map.remove(&self.asset_id);
        }
    }
}

fn lock_map(locks: &Mutex<LockMap>) -> MutexGuard<'_, LockMap> {
    locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
