//! Models over the two ordered, selectable collections we traverse: the
//! message list and the folder sidebar.
//!
//! Selection detection is layered: an explicit `aria-selected="true"` wins
//! immediately; otherwise the last row carrying `data-is-selected`, a
//! "selected" class, or the focused element is taken. Movement clamps at
//! both ends and never wraps.

use std::collections::HashSet;

use mailkeys_page::{NodeId, Page};

/// Vertical movement direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VDir {
    /// Toward the end of the list.
    Down,
    /// Toward the start of the list.
    Up,
}

/// Which collection a [`ListView`] traverses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListKind {
    /// The primary selectable message list.
    Messages,
    /// The folder/sidebar navigation list.
    Sidebar,
}

/// Rows with these phrases are empty-state placeholders, not messages.
/// English-only; localized hosts fall back to counting them as rows.
pub(crate) const PLACEHOLDER_PHRASES: &[&str] = &[
    "no items",
    "no conversations",
    "no messages",
    "you're all caught up",
];

/// Fraction of the viewport width the sidebar may occupy. Items further
/// right share ARIA roles with the horizontal top bar and are excluded.
const SIDEBAR_CUTOFF: f64 = 0.3;

/// Attributes tried, in order, when deriving a row identity key.
const ROW_KEY_ATTRS: &[&str] = &[
    "data-conversation-id",
    "data-conversationid",
    "data-thread-id",
    "data-threadid",
    "data-message-id",
    "data-messageid",
    "data-itemid",
    "data-item-id",
];

/// A view over one of the host's selectable lists.
pub(crate) struct ListView<'a> {
    page: &'a dyn Page,
    kind: ListKind,
}

impl<'a> ListView<'a> {
    /// View over the message list.
    pub(crate) fn messages(page: &'a dyn Page) -> Self {
        Self {
            page,
            kind: ListKind::Messages,
        }
    }

    /// View over the sidebar.
    pub(crate) fn sidebar(page: &'a dyn Page) -> Self {
        Self {
            page,
            kind: ListKind::Sidebar,
        }
    }

    /// Current items, in list order.
    pub(crate) fn items(&self) -> Vec<NodeId> {
        match self.kind {
            ListKind::Messages => message_rows(self.page),
            ListKind::Sidebar => sidebar_items(self.page),
        }
    }

    /// Index of the currently selected item among `items`, if any.
    pub(crate) fn current_index(&self, items: &[NodeId]) -> Option<usize> {
        let focused = self.page.focused();
        let mut fallback = None;
        for (i, item) in items.iter().enumerate() {
            if self.page.attr(*item, "aria-selected").as_deref() == Some("true") {
                return Some(i);
            }
            if self.page.attr(*item, "data-is-selected").as_deref() == Some("true") {
                fallback = Some(i);
            }
            let classes = self.page.attr(*item, "class").unwrap_or_default();
            if classes
                .split_whitespace()
                .any(|c| c == "is-selected" || c == "selected")
            {
                fallback = Some(i);
            }
            if let Some(f) = focused
                && self.page.contains(*item, f)
            {
                fallback = Some(i);
            }
        }
        fallback
    }

    /// Move the selection by one step, clamping at both ends. With no
    /// current selection, lands on the first item going down and the last
    /// going up.
    pub(crate) fn move_by(&self, dir: VDir) {
        let items = self.items();
        if items.is_empty() {
            return;
        }
        let index = match (self.current_index(&items), dir) {
            (None, VDir::Down) => 0,
            (None, VDir::Up) => items.len() - 1,
            (Some(i), VDir::Down) => (i + 1).min(items.len() - 1),
            (Some(i), VDir::Up) => i.saturating_sub(1),
        };
        self.focus_and_reveal(items[index]);
    }

    /// Click, focus, and scroll an item into view. The host reacts to the
    /// click for selection state and to focus for accessibility; scrolling
    /// is independent of both.
    pub(crate) fn focus_and_reveal(&self, item: NodeId) {
        self.page.click(item);
        self.page.focus(item);
        self.page.scroll_into_view(item);
    }
}

/// The primary selectable list container.
pub(crate) fn message_container(page: &dyn Page) -> Option<NodeId> {
    page.query(r#"[role="grid"]"#)
        .or_else(|| page.query(r#"[role="listbox"]"#))
        .or_else(|| page.query(r#"[role="treegrid"]"#))
}

/// The rows of the message list, in order.
pub(crate) fn message_rows(page: &dyn Page) -> Vec<NodeId> {
    let Some(container) = message_container(page) else {
        return Vec::new();
    };
    page.query_within(container, r#"[role="row"], [role="option"]"#)
}

/// True when some message row is currently selected.
pub(crate) fn has_selection(page: &dyn Page) -> bool {
    let view = ListView::messages(page);
    let items = view.items();
    !items.is_empty() && view.current_index(&items).is_some()
}

/// Sidebar items: role-bearing elements in the left portion of the
/// viewport. A cascade of increasingly loose selectors, first non-empty
/// set wins.
pub(crate) fn sidebar_items(page: &dyn Page) -> Vec<NodeId> {
    let cutoff = page.viewport().width * SIDEBAR_CUTOFF;
    let in_sidebar = |n: &NodeId| {
        let rect = page.rect(*n);
        rect.x >= 0.0 && rect.x < cutoff
    };
    let selectors = [
        r#"nav [role="treeitem"]"#,
        r#"nav [role="menuitem"]"#,
        r#"[role="tree"] [role="treeitem"]"#,
        r#"[role="menubar"] [role="menuitem"]"#,
        "[data-is-selected]",
        ".is-selected",
        ".selected",
    ];
    for sel in selectors {
        let found: Vec<NodeId> = page.query_all(sel).into_iter().filter(in_sidebar).collect();
        if !found.is_empty() {
            return found;
        }
    }
    page.query_all(r#"[role="treeitem"], [role="menuitem"], [role="tab"]"#)
        .into_iter()
        .filter(in_sidebar)
        .collect()
}

/// Best-effort stable identity for a row: id-like data attributes first,
/// then the aria-label, then a text prefix.
pub(crate) fn row_key(page: &dyn Page, row: NodeId) -> Option<String> {
    for attr in ROW_KEY_ATTRS {
        if let Some(value) = page.attr(row, attr)
            && !value.is_empty()
        {
            return Some(format!("{}:{}", attr, value));
        }
    }
    if let Some(label) = page.attr(row, "aria-label")
        && !label.is_empty()
    {
        return Some(format!("aria:{}", label));
    }
    let text = page.text(row);
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        let prefix: String = trimmed.chars().take(200).collect();
        return Some(format!("text:{}", prefix));
    }
    None
}

/// Snapshot of the row keys and count, taken before destructive actions.
pub(crate) fn row_snapshot(page: &dyn Page) -> (HashSet<String>, usize) {
    let rows = message_rows(page);
    let keys = rows.iter().filter_map(|r| row_key(page, *r)).collect();
    (keys, rows.len())
}

/// Count of real messages in the list, excluding empty-state placeholders.
pub(crate) fn message_count(page: &dyn Page) -> usize {
    message_rows(page)
        .into_iter()
        .filter(|row| !is_placeholder(page, *row))
        .count()
}

fn is_placeholder(page: &dyn Page, row: NodeId) -> bool {
    let label = page.attr(row, "aria-label").unwrap_or_default().to_lowercase();
    let text = page.text(row).trim().to_lowercase();
    PLACEHOLDER_PHRASES
        .iter()
        .any(|p| label.contains(p) || text.contains(p))
}
