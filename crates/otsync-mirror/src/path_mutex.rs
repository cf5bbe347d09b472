use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::OwnedMutexGuard;

/// Per-URI serialization for the four primitives (§4.2: "each runs under
/// `mutex.atomic([uri])`"). Distinct from [`crate::scheduler::DependencyScheduler`],
/// which orders *dispatch* of higher-level operations by path relationship;
/// this is a plain exact-key mutex guaranteeing a `_delete` queued after a
/// `_create` on the same path observes the create's effect (§5's per-URI
/// FIFO ordering guarantee).
#[derive(Default)]
pub struct PathMutex {
    locks: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl PathMutex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut locks = self.locks.lock().expect("path mutex registry poisoned");
            Arc::clone(locks.entry(key.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(()))))
        };
        entry.lock_owned().await
    }

    pub fn clear(&self) {
        self.locks.lock().expect("path mutex registry poisoned").clear();
    }
}
