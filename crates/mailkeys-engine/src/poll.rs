//! Keyed, cancellable polling tasks.
//!
//! Every bounded retry loop in the engine (waiting for a native menu, for
//! preset labels, for a deferred click target) runs through a [`Poller`] so
//! that overlapping starts replace each other and teardown can cancel
//! everything outstanding.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Timing bounds for one polling task.
#[derive(Debug, Clone, Copy)]
pub struct PollSpec {
    /// Delay before the first check.
    pub initial_delay: Duration,
    /// Maximum number of checks.
    pub attempts: u32,
    /// Delay between checks.
    pub interval: Duration,
}

impl PollSpec {
    /// A spec with no initial delay.
    pub const fn new(attempts: u32, interval_ms: u64) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            attempts,
            interval: Duration::from_millis(interval_ms),
        }
    }

    /// Add an initial delay before the first check.
    pub const fn after(mut self, initial_ms: u64) -> Self {
        self.initial_delay = Duration::from_millis(initial_ms);
        self
    }
}

/// Scheduler for keyed polling loops. Starting an id replaces any loop
/// already running under it; loops self-terminate on success or exhaustion.
#[derive(Clone, Default)]
pub struct Poller {
    entries: Arc<Mutex<HashMap<String, (u64, CancellationToken)>>>,
    generation: Arc<AtomicU64>,
}

impl Poller {
    /// Create an empty poller.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a loop is active for the given id.
    pub fn is_active(&self, id: &str) -> bool {
        self.entries.lock().contains_key(id)
    }

    /// Start or replace a polling loop. `tick` returns true when done.
    pub fn start<F>(&self, id: &str, spec: PollSpec, tick: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.start_or(id, spec, tick, || {});
    }

    /// Like [`Poller::start`], with an `exhausted` callback that runs if
    /// every attempt came up empty.
    pub fn start_or<F, E>(&self, id: &str, spec: PollSpec, mut tick: F, exhausted: E)
    where
        F: FnMut() -> bool + Send + 'static,
        E: FnOnce() + Send + 'static,
    {
        self.stop(id);
        let token = CancellationToken::new();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.entries
            .lock()
            .insert(id.to_string(), (generation, token.clone()));

        let entries = self.entries.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            trace!(id = %id, attempts = spec.attempts, "poll_start");
            let done = Self::run(&token, spec, &mut tick).await;
            if !done && !token.is_cancelled() {
                trace!(id = %id, "poll_exhausted");
                exhausted();
            }
            let mut map = entries.lock();
            if map.get(&id).is_some_and(|(g, _)| *g == generation) {
                map.remove(&id);
            }
        });
    }

    /// Stop a loop if present.
    pub fn stop(&self, id: &str) {
        if let Some((_, token)) = self.entries.lock().remove(id) {
            token.cancel();
            trace!(id = %id, "poll_stop");
        }
    }

    /// Cancel all outstanding loops.
    pub fn clear(&self) {
        let mut map = self.entries.lock();
        for (_, (_, token)) in map.drain() {
            token.cancel();
        }
    }

    async fn run<F>(token: &CancellationToken, spec: PollSpec, tick: &mut F) -> bool
    where
        F: FnMut() -> bool + Send,
    {
        if !spec.initial_delay.is_zero() {
            tokio::select! {
                _ = sleep(spec.initial_delay) => {}
                _ = token.cancelled() => return false,
            }
        }
        for attempt in 0..spec.attempts {
            if token.is_cancelled() {
                return false;
            }
            if tick() {
                return true;
            }
            if attempt + 1 < spec.attempts {
                tokio::select! {
                    _ = sleep(spec.interval) => {}
                    _ = token.cancelled() => return false,
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_until_done() {
        let poller = Poller::new();
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        poller.start("t", PollSpec::new(10, 20), move || {
            seen.fetch_add(1, Ordering::SeqCst) >= 2
        });
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(!poller.is_active("t"));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_callback_fires_once() {
        let poller = Poller::new();
        let exhausted = Arc::new(AtomicU32::new(0));
        let flag = exhausted.clone();
        poller.start_or(
            "t",
            PollSpec::new(3, 10),
            || false,
            move || {
                flag.fetch_add(1, Ordering::SeqCst);
            },
        );
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(exhausted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_previous_loop() {
        let poller = Poller::new();
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));
        let a = first.clone();
        poller.start("same", PollSpec::new(100, 10), move || {
            a.fetch_add(1, Ordering::SeqCst);
            false
        });
        let b = second.clone();
        poller.start("same", PollSpec::new(2, 10), move || {
            b.fetch_add(1, Ordering::SeqCst);
            false
        });
        tokio::time::sleep(Duration::from_millis(300)).await;
        // The first loop was cancelled before it could burn its attempts.
        assert!(first.load(Ordering::SeqCst) <= 1);
        assert_eq!(second.load(Ordering::SeqCst), 2);
        assert!(!poller.is_active("same"));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_and_suppresses_exhaustion() {
        let poller = Poller::new();
        let exhausted = Arc::new(AtomicU32::new(0));
        let flag = exhausted.clone();
        poller.start_or(
            "t",
            PollSpec::new(50, 20).after(10),
            || false,
            move || {
                flag.fetch_add(1, Ordering::SeqCst);
            },
        );
        poller.stop("t");
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(exhausted.load(Ordering::SeqCst), 0);
    }
}
