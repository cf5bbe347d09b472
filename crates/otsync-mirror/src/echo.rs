use std::collections::HashMap;
use std::sync::Mutex;

/// Per-key counting multiset used to suppress self-caused filesystem
/// events (§4.2's "[ADD] Echo multiset semantics"). A `HashSet` would
/// under-count a rename, which registers a `delete` echo and a `create`
/// echo for the same logical transition, and an overlapping in-flight
/// operation can register a second `create` echo on the same path before
/// the first is consumed — insertion increments, consumption decrements
/// and treats the event as self-caused only while the count is positive.
#[derive(Default)]
pub struct EchoSet {
    counts: Mutex<HashMap<String, u32>>,
}

impl EchoSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>) {
        let mut counts = self.counts.lock().expect("echo set mutex poisoned");
        *counts.entry(key.into()).or_insert(0) += 1;
    }

    /// Atomically checks-and-consumes one echo for `key`, returning
    /// whether it was present (§5's "checked-and-consumed atomically per
    /// key (match-and-delete in one critical step)").
    pub fn consume(&self, key: &str) -> bool {
        let mut counts = self.counts.lock().expect("echo set mutex poisoned");
        match counts.get_mut(key) {
            Some(count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    counts.remove(key);
                }
                true
            }
            _ => false,
        }
    }

    pub fn clear(&self) {
        self.counts.lock().expect("echo set mutex poisoned").clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.lock().expect("echo set mutex poisoned").is_empty()
    }
}
