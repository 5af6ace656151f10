//! Test support utilities for mailkeys-engine integration/unit tests.
//! These helpers are public to avoid dead_code warnings and are lightweight.
//! They are intended for use by the test suite only.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use config::{MemoryStore, SettingsCache};
use mailkeys_page::{FakePage, NodeId, Rect};
use mailkeys_protocol::MsgToUi;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use crate::{Assist, AssistError, ElementInfo, Engine};

/// A webmail-shaped page: message grid, sidebar, top bar, undo and snooze
/// controls.
pub struct Fixture {
    /// The page itself.
    pub page: Arc<FakePage>,
    /// The message list container.
    pub grid: NodeId,
    /// Message rows, top to bottom.
    pub rows: Vec<NodeId>,
    /// Sidebar folder items, top to bottom.
    pub sidebar: Vec<NodeId>,
    /// The host undo control.
    pub undo: NodeId,
    /// The host snooze dropdown trigger.
    pub snooze: NodeId,
}

/// Build a fixture page with `row_count` selectable rows.
///
/// Clicking a row selects it exclusively and takes focus, like the host
/// list. Clicking the snooze trigger toggles a native-looking menu with
/// preset buttons carrying secondary time labels.
pub fn webmail_page(row_count: usize) -> Fixture {
    let page = Arc::new(FakePage::new());
    let (grid, rows, sidebar, undo, snooze) = page.with_dom(|dom| {
        dom.set_url("https://mail.example.com/mail/0/inbox");
        dom.set_viewport(Rect::new(0.0, 0.0, 1280.0, 800.0));
        let body = dom.body();

        let grid = dom.append_with(body, "div", &[("role", "grid")], "");
        let rows: Vec<NodeId> = (0..row_count)
            .map(|i| {
                dom.append_with(
                    grid,
                    "div",
                    &[("role", "row"), ("data-item-id", &format!("row-{}", i))],
                    "",
                )
            })
            .collect();

        let nav = dom.append(body, "nav");
        let sidebar: Vec<NodeId> = (0..3)
            .map(|i| {
                let item = dom.append_with(nav, "div", &[("role", "treeitem")], "");
                dom.set_rect(item, Rect::new(8.0, 60.0 + 32.0 * f64::from(i), 180.0, 28.0));
                item
            })
            .collect();
        // Top bar tabs share the sidebar's roles but sit far right.
        let bar = dom.append(body, "div");
        for _ in 0..2 {
            let tab = dom.append_with(bar, "div", &[("role", "tab")], "");
            dom.set_rect(tab, Rect::new(600.0, 4.0, 90.0, 28.0));
        }

        let undo = dom.append_with(body, "button", &[("aria-label", "Undo")], "");
        let snooze = dom.append_with(body, "button", &[("aria-label", "Snooze"), ("name", "Snooze")], "");
        (grid, rows, sidebar, undo, snooze)
    });

    for row in &rows {
        let row = *row;
        let all = rows.clone();
        page.on_click(row, move |dom| {
            for other in &all {
                dom.remove_attr(*other, "aria-selected");
            }
            dom.set_attr(row, "aria-selected", "true");
            dom.set_focus(Some(row));
        });
    }
    for item in &sidebar {
        let item = *item;
        let all = sidebar.clone();
        page.on_click(item, move |dom| {
            for other in &all {
                dom.remove_attr(*other, "aria-selected");
            }
            dom.set_attr(item, "aria-selected", "true");
            dom.set_focus(Some(item));
        });
    }

    let mut open_menu: Option<NodeId> = None;
    page.on_click(snooze, move |dom| match open_menu.take() {
        Some(menu) => dom.remove(menu),
        None => {
            let body = dom.body();
            let menu = dom.append_with(body, "div", &[("role", "menu")], "");
            for (name, time) in [
                ("Later today", "5:00 AM"),
                ("Tomorrow", "Tue 8:00 AM"),
                ("This weekend", "Sat 8:00 AM"),
                ("Next week", "Mon 8:00 AM"),
            ] {
                let button = dom.append_with(menu, "button", &[("name", name)], "");
                let span = dom.append_with(button, "span", &[("class", "secondaryTextMenu")], "");
                dom.set_text(span, time);
            }
            dom.append_with(menu, "button", &[("name", "Choose a date")], "");
            open_menu = Some(menu);
        }
    });

    Fixture {
        page,
        grid,
        rows,
        sidebar,
        undo,
        snooze,
    }
}

/// A fully wired engine over a fake page, memory store, and the given
/// assist service.
pub struct Harness {
    /// The engine under test.
    pub engine: Engine,
    /// UI messages it emits.
    pub ui: UnboundedReceiver<MsgToUi>,
    /// The backing store.
    pub store: Arc<MemoryStore>,
    /// The settings cache shared with the engine.
    pub settings: Arc<SettingsCache>,
}

/// Build a started engine with [`crate::NoAssist`].
pub async fn harness(page: Arc<FakePage>) -> Harness {
    harness_with(page, Arc::new(crate::NoAssist)).await
}

/// Build a started engine with a specific assist service.
pub async fn harness_with(page: Arc<FakePage>, assist: Arc<dyn Assist>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    harness_with_store(page, assist, store).await
}

/// Build a started engine over a pre-seeded store.
pub async fn harness_with_store(
    page: Arc<FakePage>,
    assist: Arc<dyn Assist>,
    store: Arc<MemoryStore>,
) -> Harness {
    let settings = SettingsCache::new(store.clone());
    let (tx, ui) = unbounded_channel();
    let engine = Engine::new(page, settings.clone(), assist, tx);
    engine.start().await;
    Harness {
        engine,
        ui,
        store,
        settings,
    }
}

/// An assist service with canned replies. `None` fields report the service
/// as unavailable.
pub struct StaticAssist {
    /// Canned summary reply.
    pub summary: Option<String>,
    /// Canned title reply.
    pub title: Option<String>,
}

#[async_trait]
impl Assist for StaticAssist {
    async fn summarize(&self, _body_text: &str) -> Result<String, AssistError> {
        self.summary
            .clone()
            .ok_or_else(|| AssistError::Unavailable("no summarizer".into()))
    }

    async fn format_title(&self, _info: &ElementInfo) -> Result<String, AssistError> {
        self.title
            .clone()
            .ok_or_else(|| AssistError::Unavailable("no formatter".into()))
    }
}

/// Receive UI messages until `pred` matches or `timeout_ms` elapses.
pub async fn recv_until<F>(
    rx: &mut UnboundedReceiver<MsgToUi>,
    timeout_ms: u64,
    mut pred: F,
) -> bool
where
    F: FnMut(&MsgToUi) -> bool,
{
    tokio::time::timeout(Duration::from_millis(timeout_ms), async {
        while let Some(msg) = rx.recv().await {
            if pred(&msg) {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false)
}

/// Drain everything currently queued.
pub fn drain(rx: &mut UnboundedReceiver<MsgToUi>) -> Vec<MsgToUi> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}
