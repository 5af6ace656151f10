//! The summary panel and reading-pane text helpers.
//!
//! The panel is a read-only display surface with three states; the assist
//! request itself runs in the engine, which drives the panel through
//! explicit opens.

use mailkeys_page::{NodeId, Page};
use mailkeys_protocol::SummaryState;

/// Body text handed to the summarizer is capped at this many characters,
/// keeping the tail (the newest content in a conversation).
const BODY_TEXT_MAX: usize = 20_000;

/// Selectors for message body regions inside the reading pane.
const BODY_SELECTORS: &[&str] = &[
    r#"div[role="document"]"#,
    r#"[data-message-id] [role="document"]"#,
    r#"div[aria-label="Message body"]"#,
    r#"div[aria-label="Message content"]"#,
];

/// Summary panel state. The panel owns nothing but its open flag; content
/// and state class travel in the update messages.
#[derive(Default)]
pub(crate) struct SummaryPanel {
    open: bool,
}

impl SummaryPanel {
    /// Whether the panel is open.
    pub(crate) fn is_open(&self) -> bool {
        self.open
    }

    /// Mark open.
    pub(crate) fn open(&mut self) {
        self.open = true;
    }

    /// Mark closed.
    pub(crate) fn close(&mut self) {
        self.open = false;
    }
}

/// A panel update: title, body, and content-region state.
#[derive(Debug, Clone)]
pub(crate) struct SummaryContent {
    /// Panel title.
    pub title: String,
    /// Panel body text.
    pub body: String,
    /// State class for the content region.
    pub state: SummaryState,
}

impl SummaryContent {
    /// A loading-state update.
    pub(crate) fn loading(title: &str, body: &str) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            state: SummaryState::Loading,
        }
    }

    /// A content-state update.
    pub(crate) fn content(title: &str, body: &str) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            state: SummaryState::Content,
        }
    }

    /// An error-state update.
    pub(crate) fn error(title: &str, body: &str) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            state: SummaryState::Error,
        }
    }
}

/// The root of the currently open message, falling back to the body.
pub(crate) fn reading_pane_root(page: &dyn Page) -> Option<NodeId> {
    page.query("#ConversationReadingPaneContainer")
        .or_else(|| page.query(r#"[data-app-section="ConversationContainer"]"#))
}

/// Collect the visible text of the open message: body regions first, then
/// collapsed-conversation preview blocks, deduplicated, tail-capped.
pub(crate) fn email_body_text(page: &dyn Page) -> String {
    let mut chunks: Vec<String> = Vec::new();
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();

    let scoped = reading_pane_root(page);
    let query = |sel: &str| match scoped {
        Some(root) => page.query_within(root, sel),
        None => page.query_all(sel),
    };

    for sel in BODY_SELECTORS {
        for node in query(sel) {
            let text = page.text(node);
            let text = text.trim();
            if !text.is_empty() && seen.insert(text.to_string()) {
                chunks.push(text.to_string());
            }
        }
    }
    // Collapsed messages in conversation view render as preview blocks;
    // capture those so the summary sees the surrounding context.
    for node in query("div._nzWz") {
        let text = page.text(node);
        let text = text.trim();
        if !text.is_empty() && seen.insert(text.to_string()) {
            chunks.push(text.to_string());
        }
    }

    if chunks.is_empty() {
        return String::new();
    }
    let full = chunks.join("\n\n---\n\n");
    if full.chars().count() > BODY_TEXT_MAX {
        let skip = full.chars().count() - BODY_TEXT_MAX;
        full.chars().skip(skip).collect()
    } else {
        full
    }
}

/// Find an unsubscribe link in the open message: first anchor whose text,
/// href, or aria-label mentions unsubscribing.
pub(crate) fn find_unsubscribe_link(page: &dyn Page) -> Option<NodeId> {
    let anchors = match reading_pane_root(page) {
        Some(root) => page.query_within(root, "a[href]"),
        None => page.query_all("a[href]"),
    };
    anchors.into_iter().find(|a| {
        let text = page.text(*a).to_lowercase();
        let href = page.attr(*a, "href").unwrap_or_default().to_lowercase();
        let aria = page.attr(*a, "aria-label").unwrap_or_default().to_lowercase();
        text.contains("unsubscribe") || href.contains("unsubscribe") || aria.contains("unsubscribe")
    })
}

#[cfg(test)]
mod tests {
    use mailkeys_page::FakePage;

    use super::*;

    fn reading_pane() -> (FakePage, NodeId) {
        let page = FakePage::new();
        let pane = page.with_dom(|dom| {
            let body = dom.body();
            dom.append_with(body, "div", &[("id", "ConversationReadingPaneContainer")], "")
        });
        (page, pane)
    }

    #[test]
    fn body_text_collects_and_dedupes() {
        let (page, pane) = reading_pane();
        page.with_dom(|dom| {
            let a = dom.append_with(pane, "div", &[("role", "document")], "");
            dom.set_text(a, "Hello there.");
            let b = dom.append_with(pane, "div", &[("role", "document")], "");
            dom.set_text(b, "Hello there.");
            let preview = dom.append_with(pane, "div", &[("class", "_nzWz")], "");
            dom.set_text(preview, "Earlier message preview");
        });
        let text = email_body_text(&page);
        assert_eq!(text, "Hello there.\n\n---\n\nEarlier message preview");
    }

    #[test]
    fn body_text_empty_without_content() {
        let (page, _pane) = reading_pane();
        assert_eq!(email_body_text(&page), "");
    }

    #[test]
    fn long_bodies_keep_the_tail() {
        let (page, pane) = reading_pane();
        page.with_dom(|dom| {
            let doc = dom.append_with(pane, "div", &[("role", "document")], "");
            let mut long = "x".repeat(BODY_TEXT_MAX);
            long.push_str("TAIL");
            dom.set_text(doc, &long);
        });
        let text = email_body_text(&page);
        assert_eq!(text.chars().count(), BODY_TEXT_MAX);
        assert!(text.ends_with("TAIL"));
    }

    #[test]
    fn unsubscribe_link_is_found_by_text_href_or_label() {
        let (page, pane) = reading_pane();
        let by_href = page.with_dom(|dom| {
            let wrapper = dom.append(pane, "div");
            let other = dom.append_with(wrapper, "a", &[("href", "https://example.com")], "");
            dom.set_text(other, "View online");
            dom.append_with(
                wrapper,
                "a",
                &[("href", "https://example.com/unsubscribe?u=1")],
                "",
            )
        });
        assert_eq!(find_unsubscribe_link(&page), Some(by_href));
    }

    #[test]
    fn panel_state_toggles() {
        let mut panel = SummaryPanel::default();
        assert!(!panel.is_open());
        panel.open();
        assert!(panel.is_open());
        panel.close();
        assert!(!panel.is_open());
    }
}
