//! Element-picking mode: hover highlights the nearest actionable element,
//! click captures it, and menu-opening triggers defer into a nested
//! submenu mode that remembers the trigger as a prerequisite click.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use mailkeys_page::{NodeId, Page};

/// Ancestors walked when searching for an actionable element.
const ACTIONABLE_WALK: usize = 5;

/// Instruction line shown while picking.
pub(crate) const PICK_INSTRUCTIONS: &str =
    "Hover over an element to highlight it, then click to add it as a shortcut. Press Esc to cancel.";

/// Instruction line shown in submenu mode.
pub(crate) const SUBMENU_INSTRUCTIONS: &str =
    "Menu opened! Select an item from the menu, or press Esc to go back.";

/// Picker state.
#[derive(Default)]
pub(crate) struct Picker {
    active: bool,
    submenu: bool,
    trigger: Option<NodeId>,
    highlighted: Option<NodeId>,
}

impl Picker {
    /// Whether picking mode is active.
    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the nested submenu sub-mode is active.
    pub(crate) fn in_submenu(&self) -> bool {
        self.submenu
    }

    /// The remembered menu trigger, if any.
    pub(crate) fn trigger(&self) -> Option<NodeId> {
        self.trigger
    }

    /// The currently highlighted element.
    pub(crate) fn highlighted(&self) -> Option<NodeId> {
        self.highlighted
    }

    /// Enter picking mode.
    pub(crate) fn start(&mut self) {
        *self = Self {
            active: true,
            ..Self::default()
        };
    }

    /// Leave picking mode entirely.
    pub(crate) fn close(&mut self) {
        *self = Self::default();
    }

    /// Enter submenu mode, remembering the trigger.
    pub(crate) fn enter_submenu(&mut self, trigger: NodeId) {
        self.submenu = true;
        self.trigger = Some(trigger);
        self.highlighted = None;
    }

    /// Step back one level: out of submenu mode, or out of picking mode.
    /// Returns true when picking mode itself ended.
    pub(crate) fn back(&mut self) -> bool {
        if self.submenu {
            self.submenu = false;
            self.trigger = None;
            false
        } else {
            self.close();
            true
        }
    }

    /// Update the highlight target.
    pub(crate) fn set_highlight(&mut self, node: Option<NodeId>) {
        self.highlighted = node;
    }
}

/// Generate a unique custom-shortcut id.
pub(crate) fn generate_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let nonce = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("custom-{}-{:x}", millis, nonce)
}

/// Find the actionable element for a hover/click target: the element
/// itself, the nearest actionable ancestor (bounded walk), or a wrapped
/// button/link descendant.
pub(crate) fn find_actionable(page: &dyn Page, node: NodeId) -> Option<NodeId> {
    if is_actionable(page, node, true) {
        return Some(node);
    }
    let mut current = page.parent(node);
    let mut depth = 0;
    while let Some(el) = current {
        if depth >= ACTIONABLE_WALK {
            break;
        }
        if is_actionable(page, el, false) {
            return Some(el);
        }
        current = page.parent(el);
        depth += 1;
    }
    page.query_within(
        node,
        r#"button, a[href], input[type="button"], input[type="submit"], [role="button"]"#,
    )
    .into_iter()
    .next()
}

fn is_actionable(page: &dyn Page, el: NodeId, allow_labeled_containers: bool) -> bool {
    let tag = page.tag(el).unwrap_or_default();
    if matches!(tag.as_str(), "button" | "a" | "input" | "select") {
        return true;
    }
    let role = page.attr(el, "role").unwrap_or_default();
    if matches!(role.as_str(), "button" | "link" | "menuitem" | "tab") {
        return true;
    }
    if page.attr(el, "tabindex").is_some() {
        return true;
    }
    if allow_labeled_containers
        && page.attr(el, "aria-label").is_some()
        && (tag == "div" || tag == "span")
    {
        return true;
    }
    false
}

/// Whether clicking this element looks like it opens a submenu.
pub(crate) fn might_open_menu(page: &dyn Page, el: NodeId) -> bool {
    if let Some(popup) = page.attr(el, "aria-haspopup")
        && matches!(popup.as_str(), "true" | "menu" | "listbox")
    {
        return true;
    }
    let expanded = page.attr(el, "aria-expanded");
    if expanded.as_deref() == Some("false") || expanded.is_none() {
        let classes = page.attr(el, "class").unwrap_or_default();
        if classes.contains("dropdown")
            || classes.contains("menu")
            || page.attr(el, "data-toggle").as_deref() == Some("dropdown")
        {
            return true;
        }
    }
    false
}

/// Find a visible, freshly opened menu surface.
pub(crate) fn find_open_menu(page: &dyn Page) -> Option<NodeId> {
    const MENU_SELECTORS: &[&str] = &[
        r#"[role="menu"]:not([aria-hidden="true"])"#,
        r#"[role="listbox"]:not([aria-hidden="true"])"#,
        r#".ms-Callout:not([aria-hidden="true"])"#,
        r#"[data-focus-zone]:not([aria-hidden="true"])"#,
        r#"[aria-expanded="true"][role="menu"]"#,
        r#"[aria-expanded="true"][role="listbox"]"#,
    ];
    for sel in MENU_SELECTORS {
        for menu in page.query_all(sel) {
            if page.rect(menu).has_area() && page.is_visible(menu) {
                return Some(menu);
            }
        }
    }
    None
}

/// Whether a selector's target is currently rendered and clickable.
pub(crate) fn is_visibly_present(page: &dyn Page, selector: &str) -> Option<NodeId> {
    let node = page.query(selector)?;
    (page.rect(node).has_area() && page.is_visible(node)).then_some(node)
}
