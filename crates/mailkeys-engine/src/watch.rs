//! Mutation watchers: the inbox-zero celebration trigger and the
//! post-undo restore refocus.
//!
//! Both wrap the page's mutation feed with an explicit start/stop
//! lifecycle and keep their decision step separate from the plumbing so
//! tests can drive it with synthetic batches.

use std::{collections::HashSet, sync::Arc, time::Duration};

use mailkeys_page::{NodeId, Page};
use mailkeys_protocol::MsgToUi;
use parking_lot::Mutex;
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{
    controls,
    list::{self, ListView},
    notify::UiSender,
};

/// How long the celebratory overlay stays up.
pub(crate) const CELEBRATION_MS: u64 = 6_500;

/// How long the restore watcher waits for an undone row to reappear.
pub(crate) const RESTORE_TIMEOUT: Duration = Duration::from_millis(3_000);

/// Fires a one-shot celebration when the selectable count transitions from
/// nonzero to zero in the primary list view.
pub(crate) struct CelebrationWatcher {
    page: Arc<dyn Page>,
    ui: UiSender,
    last_count: Arc<Mutex<Option<usize>>>,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl CelebrationWatcher {
    /// Create a stopped watcher.
    pub(crate) fn new(page: Arc<dyn Page>, ui: UiSender) -> Self {
        Self {
            page,
            ui,
            last_count: Arc::new(Mutex::new(None)),
            task: Mutex::new(None),
        }
    }

    /// Whether the watcher is currently observing.
    pub(crate) fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    /// Start observing. Establishes a fresh baseline first, so the very
    /// first observation never fires.
    pub(crate) fn start(&self) {
        self.stop();
        *self.last_count.lock() = Some(list::message_count(self.page.as_ref()));

        let token = CancellationToken::new();
        let cancel = token.clone();
        let page = self.page.clone();
        let ui = self.ui.clone();
        let last_count = self.last_count.clone();
        let mut rx = self.page.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    received = rx.recv() => match received {
                        Ok(_) => {
                            if observe_count(page.as_ref(), &mut last_count.lock()) {
                                debug!("selectable count reached zero, celebrating");
                                let _ = ui.send(MsgToUi::Celebrate { duration_ms: CELEBRATION_MS });
                                let ui = ui.clone();
                                let dismiss = cancel.clone();
                                tokio::spawn(async move {
                                    tokio::select! {
                                        _ = dismiss.cancelled() => {}
                                        _ = tokio::time::sleep(Duration::from_millis(CELEBRATION_MS)) => {
                                            let _ = ui.send(MsgToUi::CelebrationEnded);
                                        }
                                    }
                                });
                            }
                        }
                        Err(RecvError::Lagged(n)) => {
                            trace!("celebration watcher lagged by {} mutations", n);
                        }
                        Err(RecvError::Closed) => return,
                    },
                }
            }
        });
        *self.task.lock() = Some((token, handle));
    }

    /// Stop observing and forget the baseline.
    pub(crate) fn stop(&self) {
        if let Some((token, handle)) = self.task.lock().take() {
            token.cancel();
            handle.abort();
        }
        *self.last_count.lock() = None;
    }
}

/// One observation step: recompute the count and decide whether this
/// mutation is the >0 → 0 transition. The first observation only
/// establishes the baseline.
pub(crate) fn observe_count(page: &dyn Page, last: &mut Option<usize>) -> bool {
    let count = list::message_count(page);
    let fired = match *last {
        Some(prev) => prev > 0 && count == 0 && controls::is_inbox_view(&page.url()),
        None => false,
    };
    *last = Some(count);
    fired
}

/// Find the row restored by an undo: a row whose key was not in the
/// pre-undo snapshot, or, when keys are unavailable, the top row after a
/// net count increase.
pub(crate) fn find_restored(
    page: &dyn Page,
    prev_keys: &HashSet<String>,
    prev_count: usize,
) -> Option<NodeId> {
    let rows = list::message_rows(page);
    for row in &rows {
        if let Some(key) = list::row_key(page, *row)
            && !prev_keys.contains(&key)
        {
            return Some(*row);
        }
    }
    if rows.len() > prev_count {
        return rows.first().copied();
    }
    None
}

/// Watch for the restored row and refocus it. Resolves immediately when
/// already present; otherwise observes mutations until the timeout, after
/// which it gives up silently.
pub(crate) fn spawn_restore_watch(
    page: Arc<dyn Page>,
    prev_keys: HashSet<String>,
    prev_count: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let refocus = |row: NodeId| {
            ListView::messages(page.as_ref()).focus_and_reveal(row);
        };
        if let Some(row) = find_restored(page.as_ref(), &prev_keys, prev_count) {
            refocus(row);
            return;
        }
        let mut rx = page.subscribe();
        let deadline = Instant::now() + RESTORE_TIMEOUT;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    trace!("restore watch timed out");
                    return;
                }
                received = rx.recv() => match received {
                    Ok(_) => {
                        if let Some(row) = find_restored(page.as_ref(), &prev_keys, prev_count) {
                            refocus(row);
                            return;
                        }
                    }
                    Err(RecvError::Lagged(_)) => {
                        if let Some(row) = find_restored(page.as_ref(), &prev_keys, prev_count) {
                            refocus(row);
                            return;
                        }
                    }
                    Err(RecvError::Closed) => return,
                },
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use mailkeys_page::FakePage;

    use super::*;

    fn inbox_page(rows: usize) -> (Arc<FakePage>, Vec<NodeId>) {
        let page = Arc::new(FakePage::new());
        let nodes = page.with_dom(|dom| {
            dom.set_url("https://mail.example.com/mail/0/inbox");
            let body = dom.body();
            let grid = dom.append_with(body, "div", &[("role", "grid")], "");
            (0..rows)
                .map(|i| {
                    dom.append_with(
                        grid,
                        "div",
                        &[("role", "row"), ("data-item-id", &format!("m{}", i))],
                        "",
                    )
                })
                .collect()
        });
        (page, nodes)
    }

    #[test]
    fn observe_fires_only_on_zero_transition() {
        let (page, rows) = inbox_page(3);
        let mut last = Some(list::message_count(page.as_ref()));
        page.with_dom(|dom| dom.remove(rows[0]));
        assert!(!observe_count(page.as_ref(), &mut last), "3 -> 2");
        page.with_dom(|dom| dom.remove(rows[1]));
        assert!(!observe_count(page.as_ref(), &mut last), "2 -> 1");
        page.with_dom(|dom| dom.remove(rows[2]));
        assert!(observe_count(page.as_ref(), &mut last), "1 -> 0 fires");
        assert!(!observe_count(page.as_ref(), &mut last), "0 -> 0 stays quiet");
    }

    #[test]
    fn observe_without_baseline_only_seeds() {
        let (page, _rows) = inbox_page(0);
        let mut last = None;
        assert!(!observe_count(page.as_ref(), &mut last));
        assert_eq!(last, Some(0));
    }

    #[test]
    fn observe_requires_inbox_view() {
        let (page, rows) = inbox_page(1);
        page.with_dom(|dom| dom.set_url("https://mail.example.com/mail/0/archive"));
        let mut last = Some(1);
        page.with_dom(|dom| dom.remove(rows[0]));
        assert!(!observe_count(page.as_ref(), &mut last));
    }

    #[test]
    fn find_restored_prefers_new_keys() {
        let (page, _rows) = inbox_page(2);
        let (keys, count) = list::row_snapshot(page.as_ref());
        let grid = page.query(r#"[role="grid"]"#).expect("grid");
        let restored = page.with_dom(|dom| {
            let row = dom.insert(grid, 1, "div");
            dom.set_attr(row, "role", "row");
            dom.set_attr(row, "data-item-id", "returned");
            row
        });
        assert_eq!(find_restored(page.as_ref(), &keys, count), Some(restored));
    }

    #[test]
    fn find_restored_falls_back_to_count_increase() {
        let (page, _rows) = inbox_page(2);
        // Strip identity so key comparison is useless, then add a row.
        let (_, count) = list::row_snapshot(page.as_ref());
        let keys: HashSet<String> = HashSet::new();
        let grid = page.query(r#"[role="grid"]"#).expect("grid");
        page.with_dom(|dom| {
            for row in dom.child_ids(grid) {
                dom.remove_attr(row, "data-item-id");
            }
            let row = dom.insert(grid, 0, "div");
            dom.set_attr(row, "role", "row");
        });
        let rows = list::message_rows(page.as_ref());
        // Every key is "new" relative to an empty snapshot; the first
        // key-bearing row wins. With no keys at all the count fallback
        // takes the top row. Either way the result is the top row.
        assert_eq!(find_restored(page.as_ref(), &keys, count), Some(rows[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn restore_watch_refocuses_late_row() {
        let (page, _rows) = inbox_page(2);
        let (keys, count) = list::row_snapshot(page.as_ref());
        let handle = spawn_restore_watch(page.clone(), keys, count);
        tokio::time::sleep(Duration::from_millis(200)).await;
        let grid = page.query(r#"[role="grid"]"#).expect("grid");
        let restored = page.with_dom(|dom| {
            let row = dom.insert(grid, 0, "div");
            dom.set_attr(row, "role", "row");
            dom.set_attr(row, "data-item-id", "returned");
            row
        });
        handle.await.expect("join");
        assert!(page.clicks().contains(&restored));
        assert_eq!(page.focused(), Some(restored));
    }

    #[tokio::test(start_paused = true)]
    async fn restore_watch_gives_up_silently() {
        let (page, _rows) = inbox_page(2);
        let (keys, count) = list::row_snapshot(page.as_ref());
        let handle = spawn_restore_watch(page.clone(), keys, count);
        tokio::time::sleep(RESTORE_TIMEOUT + Duration::from_millis(100)).await;
        handle.await.expect("join");
        assert!(page.clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn celebration_watcher_fires_once_and_dismisses() {
        let (page, rows) = inbox_page(2);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let watcher = CelebrationWatcher::new(page.clone(), UiSender::new(tx));
        watcher.start();
        tokio::task::yield_now().await;

        page.with_dom(|dom| dom.remove(rows[0]));
        tokio::time::sleep(Duration::from_millis(10)).await;
        page.with_dom(|dom| dom.remove(rows[1]));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let msg = rx.recv().await.expect("celebrate");
        assert!(matches!(msg, MsgToUi::Celebrate { duration_ms: CELEBRATION_MS }));
        tokio::time::sleep(Duration::from_millis(CELEBRATION_MS + 100)).await;
        let msg = rx.recv().await.expect("dismiss");
        assert!(matches!(msg, MsgToUi::CelebrationEnded));
        assert!(rx.try_recv().is_err(), "no duplicate celebration");
        watcher.stop();
    }
}
