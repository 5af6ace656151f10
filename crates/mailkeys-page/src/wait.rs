use std::time::Duration;

use tokio::time::sleep;
use tracing::trace;

use crate::{NodeId, Page};

/// Bounds for a polling wait: a fixed number of attempts with a fixed delay
/// between them. Exhaustion is a silent give-up, never an error.
#[derive(Debug, Clone, Copy)]
pub struct RetrySpec {
    /// Maximum number of checks.
    pub attempts: u32,
    /// Delay between checks.
    pub interval: Duration,
}

impl RetrySpec {
    /// Construct a spec from attempts and a millisecond interval.
    pub const fn new(attempts: u32, interval_ms: u64) -> Self {
        Self {
            attempts,
            interval: Duration::from_millis(interval_ms),
        }
    }
}

impl Default for RetrySpec {
    fn default() -> Self {
        Self::new(50, 50)
    }
}

/// Poll `check` until it yields a value or the spec is exhausted.
///
/// The first check runs immediately; the delay sits between attempts, not
/// after the last one.
pub async fn poll_until<T, F>(spec: RetrySpec, mut check: F) -> Option<T>
where
    F: FnMut() -> Option<T>,
{
    for attempt in 0..spec.attempts {
        if let Some(found) = check() {
            return Some(found);
        }
        if attempt + 1 < spec.attempts {
            sleep(spec.interval).await;
        }
    }
    trace!(attempts = spec.attempts, "poll gave up");
    None
}

/// Wait for an element matching `selector` to appear.
pub async fn wait_for(page: &dyn Page, selector: &str, spec: RetrySpec) -> Option<NodeId> {
    poll_until(spec, || page.query(selector)).await
}

/// Wait for an element of `tag` whose trimmed subtree text equals `text`.
pub async fn wait_for_text(
    page: &dyn Page,
    tag: &str,
    text: &str,
    spec: RetrySpec,
) -> Option<NodeId> {
    poll_until(spec, || {
        page.query_all(tag)
            .into_iter()
            .find(|n| page.text(*n).trim() == text)
    })
    .await
}
