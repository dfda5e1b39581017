//! Per-owner serialization of keycard chain appends.
//!
//! Two concurrent appends for one owner must not both observe the same
//! chain tip. Appends take the owner's lock before reading the tip and hold
//! it through the insert; the `(owner, index)` primary key in storage is the
//! backstop if anything slips past.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct CardLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CardLocks {
    /// Acquire the append lock for one keycard owner.
    pub async fn acquire(&self, owner: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(owner.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
