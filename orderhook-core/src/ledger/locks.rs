//! Per-key write serialization.
//!
//! Keys are hashed onto a fixed set of mutex stripes. Two writers for the same
//! key always meet on the same stripe; unrelated keys only contend when they
//! collide. The locks live in this process, so they serialize writers of a
//! single instance only. Running several instances against one database
//! needs a distributed lock or a version column instead.

use std::hash::{BuildHasher, RandomState};
use tokio::sync::{Mutex, MutexGuard};

/// Default number of stripes.
pub const DEFAULT_STRIPES: usize = 64;

pub struct KeyedLocks {
    hasher: RandomState,
    stripes: Box<[Mutex<()>]>,
}

impl KeyedLocks {
    pub fn new(stripes: usize) -> Self {
        let stripes = (0..stripes.max(1)).map(|_| Mutex::new(())).collect();
        Self {
            hasher: RandomState::new(),
            stripes,
        }
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: &str) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_of(key)].lock().await
    }

    fn stripe_of(&self, key: &str) -> usize {
        (self.hasher.hash_one(key) % self.stripes.len() as u64) as usize
    }
}

impl Default for KeyedLocks {
    fn default() -> Self {
        Self::new(DEFAULT_STRIPES)
    }
}
