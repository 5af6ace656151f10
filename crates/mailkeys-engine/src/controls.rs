//! Lookups for the host page's own controls.
//!
//! Every control is found through a selector cascade first and an
//! exact-text scan as the last resort; every lookup tolerates absence.
//! The host versions its markup independently of us, so all of this is
//! best-effort by construction.

use mailkeys_page::{NodeId, Page};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Host destinations reachable from the command palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostArea {
    /// The built-in settings panel.
    Settings,
    /// The calendar app.
    Calendar,
    /// Mail / the inbox.
    Inbox,
    /// The bookings app.
    Bookings,
    /// The to-do app.
    Todo,
}

/// Find a control by selector cascade, then by exact (case-insensitive)
/// button text.
pub(crate) fn find_control(
    page: &dyn Page,
    selectors: &[&str],
    texts: &[&str],
) -> Option<NodeId> {
    for sel in selectors {
        if let Some(node) = page.query(sel) {
            return Some(node);
        }
    }
    page.query_all("button").into_iter().find(|b| {
        let text = page.text(*b);
        let trimmed = text.trim();
        texts.iter().any(|t| trimmed.eq_ignore_ascii_case(t))
    })
}

/// The host's Undo control.
pub(crate) fn find_undo_button(page: &dyn Page) -> Option<NodeId> {
    find_control(
        page,
        &[
            r#"button[aria-label="Undo"]"#,
            r#"button[title="Undo"]"#,
            r#"button[aria-label*="Undo"]"#,
            r#"button[title*="Undo"]"#,
        ],
        &["undo"],
    )
}

/// The host's Snooze dropdown trigger.
pub(crate) fn find_snooze_button(page: &dyn Page) -> Option<NodeId> {
    find_control(
        page,
        &[
            r#"button[name="Snooze"]"#,
            r#"button[aria-label="Snooze"]"#,
            r#"button[aria-label^="Snooze"]"#,
            r#"button[title="Snooze"]"#,
            r#"button[title^="Snooze"]"#,
        ],
        &["snooze"],
    )
}

/// Click the host's Unsnooze control. Falls back to a label scan that
/// climbs to the nearest enclosing button.
pub(crate) fn click_unsnooze(page: &dyn Page) -> bool {
    for sel in [
        r#"button[aria-label="Unsnooze"]"#,
        r#"button[title="Unsnooze"]"#,
        r#"button[name="Unsnooze"]"#,
    ] {
        if let Some(btn) = page.query(sel) {
            page.click(btn);
            return true;
        }
    }
    for el in page.query_all("span, div, button") {
        if page.text(el).trim() == "Unsnooze" {
            let target = closest_button(page, el).unwrap_or(el);
            page.click(target);
            return true;
        }
    }
    false
}

/// Walk up from `node` (inclusive) to the nearest button element.
pub(crate) fn closest_button(page: &dyn Page, node: NodeId) -> Option<NodeId> {
    let mut cur = Some(node);
    while let Some(n) = cur {
        if page.tag(n).as_deref() == Some("button") {
            return Some(n);
        }
        cur = page.parent(n);
    }
    None
}

/// Click the navigation control for a host area. Returns false on a miss.
pub(crate) fn goto(page: &dyn Page, area: HostArea) -> bool {
    let found = match area {
        HostArea::Settings => find_control(
            page,
            &[
                "#owaSettingsButton",
                "button#owaSettingsButton",
                r#"button[aria-label="Settings"]"#,
                r#"button[title="Settings"]"#,
                r#"button[aria-label*="Settings"]"#,
                r#"button[title*="Settings"]"#,
            ],
            &["settings"],
        ),
        HostArea::Calendar => find_control(
            page,
            &[
                r#"button[aria-label="Calendar"]"#,
                r#"button[title="Calendar"]"#,
                r#"button[aria-label*="Calendar"]"#,
                r#"button[title*="Calendar"]"#,
            ],
            &["calendar"],
        ),
        HostArea::Inbox => find_control(
            page,
            &[
                r#"button[aria-label="Mail"]"#,
                r#"button[title="Mail"]"#,
                r#"button[aria-label*="Mail"]"#,
                r#"button[title*="Mail"]"#,
                r#"button[aria-label="Inbox"]"#,
                r#"button[title="Inbox"]"#,
            ],
            &["mail", "inbox"],
        ),
        HostArea::Bookings => find_control(
            page,
            &[
                r#"button[aria-label="Bookings"]"#,
                r#"button[title="Bookings"]"#,
                r#"button[aria-label*="Bookings"]"#,
            ],
            &["bookings"],
        ),
        HostArea::Todo => find_control(
            page,
            &[
                r#"button[aria-label="To Do"]"#,
                r#"button[title="To Do"]"#,
                r#"button[aria-label*="To Do"]"#,
                r#"button[aria-label="Todo"]"#,
            ],
            &["to do", "todo"],
        ),
    };
    match found {
        Some(btn) => {
            page.click(btn);
            true
        }
        None => {
            debug!(?area, "navigation control not found");
            false
        }
    }
}

static SCHEDULED_VIEW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/mail/[^/]*/scheduled([/?#]|$)").expect("static pattern"));

static INBOX_VIEW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/mail/[^/]*/inbox([/?#]|$)").expect("static pattern"));

/// Whether the URL is the scheduled (snoozed messages) view.
pub(crate) fn is_scheduled_view(url: &str) -> bool {
    SCHEDULED_VIEW.is_match(url)
        || url.contains("/mail/scheduled/")
        || url.ends_with("/mail/scheduled")
}

/// Whether the URL is the primary inbox list view.
pub(crate) fn is_inbox_view(url: &str) -> bool {
    let lower = url.to_lowercase();
    INBOX_VIEW.is_match(url) || lower.contains("/mail/inbox/") || lower.ends_with("/mail/inbox")
}

#[cfg(test)]
mod tests {
    use mailkeys_page::FakePage;

    use super::*;

    #[test]
    fn view_recognition() {
        assert!(is_inbox_view("https://mail.example.com/mail/0/inbox"));
        assert!(is_inbox_view("https://mail.example.com/mail/inbox/?view=a"));
        assert!(!is_inbox_view("https://mail.example.com/mail/0/archive"));
        assert!(is_scheduled_view("https://mail.example.com/mail/0/scheduled"));
        assert!(is_scheduled_view("https://mail.example.com/mail/scheduled/x"));
        assert!(!is_scheduled_view("https://mail.example.com/mail/0/inbox"));
    }

    #[test]
    fn cascade_prefers_selectors_over_text() {
        let page = FakePage::new();
        let (labeled, by_text) = page.with_dom(|dom| {
            let body = dom.body();
            let by_text = dom.append(body, "button");
            dom.set_text(by_text, "Undo");
            let labeled = dom.append_with(body, "button", &[("aria-label", "Undo")], "");
            (labeled, by_text)
        });
        assert_eq!(find_undo_button(&page), Some(labeled));
        page.with_dom(|dom| dom.remove(labeled));
        assert_eq!(find_undo_button(&page), Some(by_text));
    }

    #[test]
    fn unsnooze_label_scan_climbs_to_button() {
        let page = FakePage::new();
        let button = page.with_dom(|dom| {
            let body = dom.body();
            let button = dom.append(body, "button");
            let label = dom.append(button, "span");
            dom.set_text(label, "Unsnooze");
            button
        });
        assert!(click_unsnooze(&page));
        assert_eq!(page.clicks(), vec![button]);
    }

    #[test]
    fn missing_controls_are_soft_misses() {
        let page = FakePage::new();
        assert!(find_undo_button(&page).is_none());
        assert!(!click_unsnooze(&page));
        assert!(!goto(&page, HostArea::Calendar));
    }
}
