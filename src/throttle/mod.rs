//! Per-key debounce/coalescing scheduler.
//!
//! Guarantees at most one action execution per key per window while always
//! carrying the most recent call's arguments. Built on tokio timers and a
//! concurrent per-key state map, so it stays correct on a multi-threaded
//! scheduler.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::BoxFuture;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

type Action<A> = dyn Fn(A) -> BoxFuture<'static, ()> + Send + Sync;

/// Per-key throttle state.
///
/// Invariant: at most one pending deferred call per key; an entry exists only
/// while a cooldown window is active or a deferred call is scheduled.
struct ThrottleEntry {
    last_run: Instant,
    pending: Option<PendingCall>,
}

/// A scheduled-but-not-yet-fired execution. The spawned task owns the call's
/// arguments; superseding a call aborts the task, dropping them unexecuted.
struct PendingCall {
    generation: u64,
    handle: JoinHandle<()>,
}

struct Inner<K, A>
where
    K: Eq + Hash,
{
    delay: Duration,
    entries: DashMap<K, ThrottleEntry>,
    action: Box<Action<A>>,
    generation: AtomicU64,
}

/// Debouncing scheduler executing one action per key per `delay` window.
///
/// `schedule` never blocks and never awaits: executions run as spawned
/// tasks. Action failures are the action's own concern and cannot corrupt
/// throttle state.
pub struct Throttler<K, A>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    A: Send + 'static,
{
    inner: Arc<Inner<K, A>>,
    sweeper: JoinHandle<()>,
}

impl<K, A> Throttler<K, A>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    A: Send + 'static,
{
    /// Create a throttler with the given window and action.
    ///
    /// Also starts the housekeeping sweep, which runs every `10 * delay` and
    /// evicts entries that have fully cooled down with nothing pending. The
    /// sweep bounds memory; it is never observable through behavior.
    pub fn new<F>(delay: Duration, action: F) -> Self
    where
        F: Fn(A) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let inner = Arc::new(Inner {
            delay,
            entries: DashMap::new(),
            action: Box::new(action),
            generation: AtomicU64::new(0),
        });

        let sweeper = tokio::spawn({
            let inner = Arc::clone(&inner);
            async move {
                let period = inner.delay * 10;
                let mut interval = time::interval_at(Instant::now() + period, period);
                loop {
                    interval.tick().await;
                    inner
                        .entries
                        .retain(|_, e| e.pending.is_some() || e.last_run.elapsed() <= inner.delay);
                }
            }
        });

        Self { inner, sweeper }
    }

    /// Schedule an execution of the action for `key` with `args`.
    ///
    /// First call for a key executes immediately. A call within the cooldown
    /// window cancels any pending deferred call for the key and defers itself
    /// to `last_run + delay`, so the latest arguments always win and
    /// executions for a key are spaced by at least `delay`.
    pub fn schedule(&self, key: K, args: A) {
        let now = Instant::now();

        match self.inner.entries.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(ThrottleEntry {
                    last_run: now,
                    pending: None,
                });
                tokio::spawn((self.inner.action)(args));
            }
            Entry::Occupied(mut slot) => {
                let key = slot.key().clone();
                let entry = slot.get_mut();

                // A newer call supersedes whatever was waiting; the older
                // arguments are discarded, never executed.
                if let Some(pending) = entry.pending.take() {
                    pending.handle.abort();
                }

                if now.duration_since(entry.last_run) >= self.inner.delay {
                    entry.last_run = now;
                    tokio::spawn((self.inner.action)(args));
                } else {
                    let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
                    let fire_at = entry.last_run + self.inner.delay;
                    let inner = Arc::clone(&self.inner);

                    let handle = tokio::spawn(async move {
                        time::sleep_until(fire_at).await;

                        // Claim the execution under the entry lock. A stale
                        // generation means this call was superseded between
                        // waking and claiming; it must not run.
                        let claimed = match inner.entries.get_mut(&key) {
                            Some(mut entry) => {
                                let current = matches!(
                                    &entry.pending,
                                    Some(p) if p.generation == generation
                                );
                                if current {
                                    entry.pending = None;
                                    entry.last_run = Instant::now();
                                }
                                current
                            }
                            None => false,
                        };

                        if claimed {
                            (inner.action)(args).await;
                        }
                    });

                    entry.pending = Some(PendingCall { generation, handle });
                }
            }
        }
    }

    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Whether no keys are currently tracked
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }
}

impl<K, A> Drop for Throttler<K, A>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    A: Send + 'static,
{
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Throttler recording every executed call
    fn recording_throttler(
        delay: Duration,
    ) -> (Throttler<String, (String, u32)>, Arc<Mutex<Vec<(String, u32)>>>) {
        let calls: Arc<Mutex<Vec<(String, u32)>>> = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&calls);

        let throttler = Throttler::new(delay, move |args: (String, u32)| {
            let recorded = Arc::clone(&recorded);
            Box::pin(async move {
                recorded.lock().unwrap().push(args);
            }) as BoxFuture<'static, ()>
        });

        (throttler, calls)
    }

    fn calls_of(calls: &Arc<Mutex<Vec<(String, u32)>>>) -> Vec<(String, u32)> {
        calls.lock().unwrap().clone()
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_call_executes_immediately() {
        let (throttler, calls) = recording_throttler(Duration::from_secs(10));

        throttler.schedule("doc1".to_string(), ("doc1".to_string(), 1));
        time::sleep(Duration::from_millis(1)).await;

        assert_eq!(calls_of(&calls), vec![("doc1".to_string(), 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_with_latest_args() {
        let (throttler, calls) = recording_throttler(Duration::from_secs(10));

        throttler.schedule("doc1".to_string(), ("doc1".to_string(), 1));
        time::sleep(Duration::from_secs(1)).await;
        throttler.schedule("doc1".to_string(), ("doc1".to_string(), 2));
        time::sleep(Duration::from_secs(1)).await;
        throttler.schedule("doc1".to_string(), ("doc1".to_string(), 3));

        // Nothing new fires inside the window.
        time::sleep(Duration::from_secs(7)).await;
        assert_eq!(calls_of(&calls), vec![("doc1".to_string(), 1)]);

        // The deferred execution carries only the last call's arguments.
        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(
            calls_of(&calls),
            vec![("doc1".to_string(), 1), ("doc1".to_string(), 3)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_after_cooldown_executes_immediately() {
        let (throttler, calls) = recording_throttler(Duration::from_secs(10));

        throttler.schedule("doc1".to_string(), ("doc1".to_string(), 1));
        time::sleep(Duration::from_secs(11)).await;
        throttler.schedule("doc1".to_string(), ("doc1".to_string(), 2));
        time::sleep(Duration::from_millis(1)).await;

        assert_eq!(
            calls_of(&calls),
            vec![("doc1".to_string(), 1), ("doc1".to_string(), 2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_arguments_never_execute() {
        let (throttler, calls) = recording_throttler(Duration::from_secs(10));

        throttler.schedule("doc1".to_string(), ("doc1".to_string(), 1));
        for n in 2..=5 {
            time::sleep(Duration::from_secs(1)).await;
            throttler.schedule("doc1".to_string(), ("doc1".to_string(), n));
        }
        time::sleep(Duration::from_secs(20)).await;

        assert_eq!(
            calls_of(&calls),
            vec![("doc1".to_string(), 1), ("doc1".to_string(), 5)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_throttle_independently() {
        let (throttler, calls) = recording_throttler(Duration::from_secs(10));

        throttler.schedule("doc1".to_string(), ("doc1".to_string(), 1));
        throttler.schedule("doc2".to_string(), ("doc2".to_string(), 1));
        time::sleep(Duration::from_millis(1)).await;

        let mut seen = calls_of(&calls);
        seen.sort();
        assert_eq!(
            seen,
            vec![("doc1".to_string(), 1), ("doc2".to_string(), 1)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deferred_execution_restarts_cooldown() {
        let (throttler, calls) = recording_throttler(Duration::from_secs(10));

        throttler.schedule("doc1".to_string(), ("doc1".to_string(), 1));
        time::sleep(Duration::from_secs(5)).await;
        throttler.schedule("doc1".to_string(), ("doc1".to_string(), 2));

        // Deferred call fires at t=10.
        time::sleep(Duration::from_secs(6)).await;
        assert_eq!(calls_of(&calls).len(), 2);

        // A call shortly after the deferred run is still inside its window
        // and must defer again rather than run back-to-back.
        throttler.schedule("doc1".to_string(), ("doc1".to_string(), 3));
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls_of(&calls).len(), 2);

        time::sleep(Duration::from_secs(6)).await;
        assert_eq!(calls_of(&calls).len(), 3);
        assert_eq!(calls_of(&calls)[2], ("doc1".to_string(), 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_evicts_cooled_down_entries() {
        let (throttler, _calls) = recording_throttler(Duration::from_secs(10));

        throttler.schedule("doc1".to_string(), ("doc1".to_string(), 1));
        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(throttler.len(), 1);

        // Past the sweep period with nothing pending, the entry is gone.
        time::sleep(Duration::from_secs(101)).await;
        assert!(throttler.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_keeps_pending_entries() {
        let (throttler, calls) = recording_throttler(Duration::from_secs(10));

        throttler.schedule("doc1".to_string(), ("doc1".to_string(), 1));
        time::sleep(Duration::from_secs(95)).await;
        throttler.schedule("doc1".to_string(), ("doc1".to_string(), 2));
        time::sleep(Duration::from_secs(1)).await;
        // Deferred to t=105, crossing the sweep tick at t=100.
        throttler.schedule("doc1".to_string(), ("doc1".to_string(), 3));

        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(calls_of(&calls).len(), 2);

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls_of(&calls).len(), 3);
        assert_eq!(calls_of(&calls)[2], ("doc1".to_string(), 3));
    }
}
