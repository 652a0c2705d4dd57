// src/digest/locks.rs
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per user id, created on first use.
#[derive(Default)]
pub struct UserLocks {
    locks: std::sync::Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let m = {
            // Poisoning only happens if a holder panicked; the map is still usable.
            let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(user_id).or_default().clone()
        };
        m.lock_owned().await
    }
}
