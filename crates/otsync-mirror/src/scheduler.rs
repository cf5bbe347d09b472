use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::OwnedMutexGuard;

/// Per-path "related operations" ordering for the disk watcher's drain
/// procedure (§4.2's "[ADD] Dependency scheduler"): each dispatched
/// operation records a completion signal under its path key before
/// running, and waits for every currently in-flight operation whose key is
/// *related* to finish first. Parent-folder creation finishes before a
/// dependent child-file creation; sibling operations proceed concurrently.
///
/// The spec text describes the completion signal as a `oneshot` future,
/// but a `oneshot::Receiver` cannot be cloned to let multiple waiters
/// observe the same completion. An `Arc<tokio::sync::Mutex<()>>` held for
/// the operation's duration gives the identical multi-waiter-awaits-one-
/// completion semantics: acquiring and immediately releasing it blocks
/// exactly until the original holder's critical section ends.
///
/// Registration into `inflight` (what makes an operation visible to a
/// later, related `reserve()` call) must happen synchronously relative to
/// the dispatch loop that orders the batch — a parent's slot has to exist
/// before its child is dispatched, not merely before the child *runs* —
/// so `reserve()` is the synchronous half and the returned [`Reservation`]
/// carries the async wait-then-run as a separate step.
#[derive(Default)]
pub struct DependencyScheduler {
    inflight: StdMutex<Vec<(String, Arc<AsyncMutex<()>>)>>,
}

fn related(p1: &str, p2: &str) -> bool {
    p1 == p2 || p1.starts_with(&format!("{p2}/")) || p2.starts_with(&format!("{p1}/"))
}

/// A slot claimed by [`DependencyScheduler::reserve`], already recorded in
/// `inflight` at the point of construction. Owns an `Arc` back to its
/// scheduler (rather than borrowing it) so it can be handed to a spawned
/// task. Call [`Reservation::run`] to wait out the operations it was
/// related to, run the work, and release the slot.
pub struct Reservation {
    scheduler: Arc<DependencyScheduler>,
    key: String,
    my_lock: Arc<AsyncMutex<()>>,
    guard: OwnedMutexGuard<()>,
    waiters: Vec<Arc<AsyncMutex<()>>>,
}

impl DependencyScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronously claims `key`'s slot: records it in `inflight` and
    /// captures the currently in-flight operations related to it, before
    /// any waiting or work begins. Call this for every operation in a
    /// dispatch batch, in order, before spawning any of their tasks.
    #[must_use]
    pub fn reserve(self: &Arc<Self>, key: &str) -> Reservation {
        let my_lock = Arc::new(AsyncMutex::new(()));
        let guard = Arc::clone(&my_lock).try_lock_owned().expect("freshly created mutex is uncontended");

        let waiters: Vec<Arc<AsyncMutex<()>>> = {
            let mut inflight = self.inflight.lock().expect("scheduler mutex poisoned");
            let waiters = inflight.iter().filter(|(k, _)| related(k, key)).map(|(_, m)| Arc::clone(m)).collect();
            inflight.push((key.to_string(), Arc::clone(&my_lock)));
            waiters
        };

        Reservation { scheduler: Arc::clone(self), key: key.to_string(), my_lock, guard, waiters }
    }

    /// Runs `f`, waiting first for every currently in-flight operation
    /// whose key is related to `key` (§4.2's `related()` predicate).
    pub async fn run<F, Fut, T>(self: &Arc<Self>, key: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.reserve(key).run(f).await
    }

    pub fn clear(&self) {
        self.inflight.lock().expect("scheduler mutex poisoned").clear();
    }
}

impl Reservation {
    /// Waits out the related in-flight operations captured at reservation
    /// time, runs `f`, then releases this slot.
    pub async fn run<F, Fut, T>(self, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        for waiter in &self.waiters {
            let _ = waiter.lock().await;
        }

        let result = f().await;

        {
            let mut inflight = self.scheduler.inflight.lock().expect("scheduler mutex poisoned");
            inflight.retain(|(k, m)| !(k == &self.key && Arc::ptr_eq(m, &self.my_lock)));
        }
        drop(self.guard);
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::sync::atomic::Ordering;

    use super::*;

    #[tokio::test]
    async fn parent_then_child_run_in_order() {
        // Mirrors how `DiskMirror::drain_disk_queue` actually uses this
        // type: both slots are reserved synchronously, in dispatch order,
        // before either task is spawned — no sleep between the two
        // `reserve()` calls. The child is spawned (and starts running)
        // before the parent to prove ordering comes from registration
        // order, not from scheduling luck.
        let scheduler = Arc::new(DependencyScheduler::new());
        let order = Arc::new(StdMutex::new(Vec::new()));

        let parent_reservation = scheduler.reserve("a");
        let child_reservation = scheduler.reserve("a/b");

        let o2 = Arc::clone(&order);
        let child = tokio::spawn(async move {
            child_reservation.run(|| async move { o2.lock().unwrap().push("a/b") }).await;
        });
        tokio::task::yield_now().await;

        let o1 = Arc::clone(&order);
        let parent = tokio::spawn(async move {
            parent_reservation
                .run(|| async move {
                    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                    o1.lock().unwrap().push("a");
                })
                .await;
        });

        parent.await.unwrap();
        child.await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["a", "a/b"]);
    }

    #[tokio::test]
    async fn siblings_run_concurrently() {
        let scheduler = Arc::new(DependencyScheduler::new());
        let concurrent = Arc::new(AtomicU32::new(0));
        let max_concurrent = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for key in ["A", "AB"] {
            let scheduler = Arc::clone(&scheduler);
            let concurrent = Arc::clone(&concurrent);
            let max_concurrent = Arc::clone(&max_concurrent);
            handles.push(tokio::spawn(async move {
                scheduler
                    .run(key, || async move {
                        let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                        max_concurrent.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        concurrent.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(max_concurrent.load(Ordering::SeqCst), 2);
    }
}
