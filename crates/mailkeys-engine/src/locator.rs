//! Selector generation for arbitrary host-page elements.
//!
//! Strategies are tried in order and a candidate is accepted only when it
//! matches exactly one element right now. That is a heuristic, not a
//! guarantee: the host re-renders freely, so the same selector may later
//! match zero or many elements. Callers treat that as a soft miss.
//!
//! Interactive elements prefer label-based strategies because the host's
//! ids are dynamically generated numbers; numeric-only ids are rejected
//! outright.

use mailkeys_page::{
    selector::{escape_attr_value, is_safe_ident},
    NodeId, Page,
};

use crate::assist::ElementInfo;

/// Ancestors examined when anchoring a relative path.
const ANCHOR_DEPTH: usize = 5;

/// Maximum steps in an ancestor-anchored relative path.
const PATH_DEPTH: usize = 10;

/// Text longer than this is never used for matching.
const TEXT_MATCH_MAX: usize = 100;

/// Description display cap.
const DESCRIPTION_MAX: usize = 60;

/// Compute a selector that uniquely re-identifies `el`, or `None` for
/// detached or unnameable elements.
pub(crate) fn locate(page: &dyn Page, el: NodeId) -> Option<String> {
    let tag = page.tag(el)?;
    let role = page.attr(el, "role").unwrap_or_default();
    let interactive = tag == "button" || role == "button" || role == "link";

    let aria_label = attr_trimmed(page, el, "aria-label");
    let title = attr_trimmed(page, el, "title");

    if interactive {
        for (name, value) in [("aria-label", &aria_label), ("title", &title)] {
            if let Some(sel) = value
                .as_deref()
                .and_then(|v| unique_attr(page, &tag, name, v))
            {
                return Some(sel);
            }
        }
        if let Some(sel) = attr_trimmed(page, el, "name")
            .as_deref()
            .and_then(|v| unique_attr(page, &tag, "name", v))
        {
            return Some(sel);
        }
        if !role.is_empty()
            && let Some(label) = aria_label.as_deref()
        {
            let sel = format!(
                "{}[role=\"{}\"][aria-label=\"{}\"]",
                tag,
                escape_attr_value(&role),
                escape_attr_value(label)
            );
            if is_unique(page, &sel) {
                return Some(sel);
            }
        }
        // A label selector is still preferred when the element is the only
        // one of its tag with this exact text.
        if unique_by_text(page, &tag, el) {
            if let Some(label) = aria_label.as_deref() {
                return Some(attr_selector(&tag, "aria-label", label));
            }
            if let Some(t) = title.as_deref() {
                return Some(attr_selector(&tag, "title", t));
            }
        }
        if let Some(id) = attr_trimmed(page, el, "id")
            && is_safe_ident(&id)
        {
            return Some(format!("#{}", id));
        }
    } else if let Some(id) = attr_trimmed(page, el, "id")
        && is_safe_ident(&id)
    {
        return Some(format!("#{}", id));
    }

    // Unique data attributes, common in modern hosts.
    for name in page.attr_names(el) {
        if !name.starts_with("data-") {
            continue;
        }
        if let Some(value) = attr_trimmed(page, el, &name)
            && let Some(sel) = unique_attr(page, &tag, &name, &value)
        {
            return Some(sel);
        }
    }

    if !interactive {
        for (name, value) in [
            ("aria-label", &aria_label),
            ("name", &attr_trimmed(page, el, "name")),
        ] {
            if let Some(sel) = value
                .as_deref()
                .and_then(|v| unique_attr(page, &tag, name, v))
            {
                return Some(sel);
            }
        }
        if !role.is_empty()
            && let Some(label) = aria_label.as_deref()
        {
            let sel = format!(
                "{}[role=\"{}\"][aria-label=\"{}\"]",
                tag,
                escape_attr_value(&role),
                escape_attr_value(label)
            );
            if is_unique(page, &sel) {
                return Some(sel);
            }
        }
        if let Some(sel) = title
            .as_deref()
            .and_then(|v| unique_attr(page, &tag, "title", v))
        {
            return Some(sel);
        }
    }

    // Anchor on the nearest ancestor carrying a stable identifier.
    if let Some(sel) = anchored_path(page, el) {
        return Some(sel);
    }

    // Class selector, skipping generated (underscore-bearing) class names.
    if let Some(class_attr) = page.attr(el, "class") {
        let class = class_attr
            .split_whitespace()
            .find(|c| !c.contains('_') && is_safe_ident(c));
        if let Some(class) = class {
            let sel = format!("{}.{}", tag, class);
            if is_unique(page, &sel) {
                return Some(sel);
            }
            if let Some(n) = nth_of_type(page, el) {
                return Some(format!("{}:nth-of-type({})", sel, n));
            }
        }
    }

    // Exact text content, falling back to a positional selector.
    if unique_by_text(page, &tag, el)
        && let Some(n) = nth_of_type(page, el)
    {
        return Some(format!("{}:nth-of-type({})", tag, n));
    }

    match nth_of_type(page, el) {
        Some(n) => Some(format!("{}:nth-of-type({})", tag, n)),
        None => Some(tag),
    }
}

/// Resolve a previously generated selector, tolerating staleness.
pub(crate) fn resolve(page: &dyn Page, selector: &str) -> Option<NodeId> {
    page.query(selector)
}

/// Derive a human-readable description from an element's accessible text.
pub(crate) fn describe(page: &dyn Page, el: NodeId) -> String {
    if let Some(label) = attr_trimmed(page, el, "aria-label") {
        return tidy(&label);
    }
    if let Some(title) = attr_trimmed(page, el, "title") {
        return tidy(&title);
    }
    let tag = page.tag(el).unwrap_or_default();
    if (tag == "input" || tag == "button")
        && let Some(value) = attr_trimmed(page, el, "value")
    {
        return tidy(&value);
    }
    let text = page.text(el);
    let text = text.trim();
    if !text.is_empty() {
        return tidy(text);
    }
    if let Some(alt) = attr_trimmed(page, el, "alt") {
        return tidy(&alt);
    }
    if let Some(placeholder) = attr_trimmed(page, el, "placeholder") {
        return format!("Input: {}", tidy(&placeholder));
    }
    if tag == "input"
        && let Some(ty) = attr_trimmed(page, el, "type")
    {
        return format!("Input ({})", ty);
    }
    if let Some(role) = attr_trimmed(page, el, "role") {
        return capitalize(&role.replace('-', " "));
    }
    if tag.is_empty() {
        "Unknown element".into()
    } else {
        capitalize(&tag)
    }
}

/// Collect the metadata the assist title formatter sees.
pub(crate) fn element_info(page: &dyn Page, el: NodeId, selector: &str) -> ElementInfo {
    let text = page.text(el);
    ElementInfo {
        selector: selector.to_string(),
        current_description: describe(page, el),
        tag: page.tag(el).unwrap_or_default(),
        aria_label: page.attr(el, "aria-label").unwrap_or_default(),
        title: page.attr(el, "title").unwrap_or_default(),
        text: text.trim().chars().take(200).collect(),
        role: page.attr(el, "role").unwrap_or_default(),
    }
}

/// Collapse whitespace, capitalize, and cap for display.
pub(crate) fn tidy(text: &str) -> String {
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let cleaned = capitalize(&cleaned);
    if cleaned.chars().count() > DESCRIPTION_MAX {
        let cut: String = cleaned.chars().take(DESCRIPTION_MAX).collect();
        format!("{}…", cut.trim_end())
    } else {
        cleaned
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn attr_trimmed(page: &dyn Page, el: NodeId, name: &str) -> Option<String> {
    let value = page.attr(el, name)?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn attr_selector(tag: &str, name: &str, value: &str) -> String {
    format!("{}[{}=\"{}\"]", tag, name, escape_attr_value(value))
}

fn is_unique(page: &dyn Page, selector: &str) -> bool {
    page.query_all(selector).len() == 1
}

fn unique_attr(page: &dyn Page, tag: &str, name: &str, value: &str) -> Option<String> {
    let sel = attr_selector(tag, name, value);
    is_unique(page, &sel).then_some(sel)
}

fn unique_by_text(page: &dyn Page, tag: &str, el: NodeId) -> bool {
    let own = page.text(el);
    let own = own.trim();
    if own.is_empty() || own.chars().count() >= TEXT_MATCH_MAX {
        return false;
    }
    page.query_all(tag)
        .into_iter()
        .filter(|n| page.text(*n).trim() == own)
        .count()
        == 1
}

/// 1-based index among same-tag siblings.
fn nth_of_type(page: &dyn Page, el: NodeId) -> Option<usize> {
    let parent = page.parent(el)?;
    let tag = page.tag(el)?;
    page.children(parent)
        .into_iter()
        .filter(|c| page.tag(*c).as_deref() == Some(tag.as_str()))
        .position(|c| c == el)
        .map(|i| i + 1)
}

/// Anchor a relative path on the nearest ancestor with a stable id or data
/// attribute.
fn anchored_path(page: &dyn Page, el: NodeId) -> Option<String> {
    let mut current = page.parent(el);
    let mut depth = 0;
    while let Some(anchor) = current {
        if depth >= ANCHOR_DEPTH {
            break;
        }
        if let Some(id) = attr_trimmed(page, anchor, "id")
            && is_safe_ident(&id)
        {
            let path = path_from(page, anchor, el)?;
            let sel = format!("#{} {}", id, path);
            return is_unique(page, &sel).then_some(sel);
        }
        for name in page.attr_names(anchor) {
            if !name.starts_with("data-") {
                continue;
            }
            let Some(value) = attr_trimmed(page, anchor, &name) else {
                continue;
            };
            let anchor_tag = page.tag(anchor)?;
            let path = path_from(page, anchor, el)?;
            let sel = format!(
                "{}[{}=\"{}\"] {}",
                anchor_tag,
                name,
                escape_attr_value(&value),
                path
            );
            if is_unique(page, &sel) {
                return Some(sel);
            }
            break;
        }
        current = page.parent(anchor);
        depth += 1;
    }
    None
}

/// Build a `>`-joined structural path from `anchor` down to `target`.
fn path_from(page: &dyn Page, anchor: NodeId, target: NodeId) -> Option<String> {
    let mut path = Vec::new();
    let mut current = target;
    while current != anchor {
        let tag = page.tag(current)?;
        let parent = page.parent(current)?;
        let same_tag: Vec<NodeId> = page
            .children(parent)
            .into_iter()
            .filter(|c| page.tag(*c).as_deref() == Some(tag.as_str()))
            .collect();
        if same_tag.len() > 1 {
            let index = same_tag.iter().position(|c| *c == current)?;
            path.push(format!("{}:nth-of-type({})", tag, index + 1));
        } else {
            path.push(tag);
        }
        current = parent;
        if path.len() > PATH_DEPTH {
            break;
        }
    }
    path.reverse();
    Some(path.join(" > "))
}

#[cfg(test)]
mod tests {
    use mailkeys_page::FakePage;

    use super::*;

    #[test]
    fn buttons_prefer_aria_label_over_id() {
        let page = FakePage::new();
        let btn = page.with_dom(|dom| {
            let body = dom.body();
            dom.append_with(
                body,
                "button",
                &[("aria-label", "Archive"), ("id", "btn42")],
                "",
            )
        });
        let sel = locate(&page, btn).expect("selector");
        assert_eq!(sel, r#"button[aria-label="Archive"]"#);
        assert_eq!(resolve(&page, &sel), Some(btn));
    }

    #[test]
    fn ambiguous_labels_fall_through() {
        let page = FakePage::new();
        let (first, _second) = page.with_dom(|dom| {
            let body = dom.body();
            let first =
                dom.append_with(body, "button", &[("aria-label", "More"), ("id", "tools-a")], "");
            let second = dom.append_with(body, "button", &[("aria-label", "More")], "");
            (first, second)
        });
        let sel = locate(&page, first).expect("selector");
        assert_eq!(sel, "#tools-a");
    }

    #[test]
    fn numeric_ids_are_rejected() {
        let page = FakePage::new();
        let btn = page.with_dom(|dom| {
            let body = dom.body();
            dom.append_with(body, "button", &[("id", "11000")], "")
        });
        let sel = locate(&page, btn).expect("selector");
        assert!(!sel.contains("11000"), "unexpected selector {}", sel);
    }

    #[test]
    fn non_interactive_elements_use_id_first() {
        let page = FakePage::new();
        let el = page.with_dom(|dom| {
            let body = dom.body();
            dom.append_with(body, "div", &[("id", "readingPane"), ("aria-label", "Pane")], "")
        });
        assert_eq!(locate(&page, el).as_deref(), Some("#readingPane"));
    }

    #[test]
    fn data_attributes_when_unique() {
        let page = FakePage::new();
        let el = page.with_dom(|dom| {
            let body = dom.body();
            dom.append_with(body, "div", &[("data-pane", "reader")], "")
        });
        assert_eq!(
            locate(&page, el).as_deref(),
            Some(r#"div[data-pane="reader"]"#)
        );
    }

    #[test]
    fn anchored_path_from_identified_ancestor() {
        let page = FakePage::new();
        let target = page.with_dom(|dom| {
            let body = dom.body();
            let toolbar = dom.append_with(body, "div", &[("id", "mailTools")], "");
            dom.append(toolbar, "button");
            dom.append(toolbar, "button")
        });
        let sel = locate(&page, target).expect("selector");
        assert_eq!(sel, "#mailTools button:nth-of-type(2)");
        assert_eq!(resolve(&page, &sel), Some(target));
    }

    #[test]
    fn positional_fallback_resolves() {
        let page = FakePage::new();
        let second = page.with_dom(|dom| {
            let body = dom.body();
            dom.append(body, "section");
            dom.append(body, "section")
        });
        let sel = locate(&page, second).expect("selector");
        assert_eq!(sel, "section:nth-of-type(2)");
        assert_eq!(resolve(&page, &sel), Some(second));
    }

    #[test]
    fn generated_class_names_are_skipped() {
        let page = FakePage::new();
        let el = page.with_dom(|dom| {
            let body = dom.body();
            dom.append_with(body, "span", &[("class", "_gen123 badge")], "")
        });
        let sel = locate(&page, el).expect("selector");
        assert_eq!(sel, "span.badge");
    }

    #[test]
    fn stale_selectors_resolve_to_none() {
        let page = FakePage::new();
        let el = page.with_dom(|dom| {
            let body = dom.body();
            dom.append_with(body, "button", &[("aria-label", "Archive")], "")
        });
        let sel = locate(&page, el).expect("selector");
        page.with_dom(|dom| dom.remove(el));
        assert_eq!(resolve(&page, &sel), None);
    }

    #[test]
    fn descriptions_prioritize_accessible_text() {
        let page = FakePage::new();
        let (labeled, texty, plain_input) = page.with_dom(|dom| {
            let body = dom.body();
            let labeled =
                dom.append_with(body, "button", &[("aria-label", "mark  all   read")], "");
            let texty = dom.append(body, "a");
            dom.set_text(texty, "  Open settings  ");
            let input = dom.append_with(body, "input", &[("placeholder", "Search mail")], "");
            (labeled, texty, input)
        });
        assert_eq!(describe(&page, labeled), "Mark all read");
        assert_eq!(describe(&page, texty), "Open settings");
        assert_eq!(describe(&page, plain_input), "Input: Search mail");
    }

    #[test]
    fn long_descriptions_are_capped() {
        let long = "a".repeat(100);
        let out = tidy(&long);
        assert!(out.chars().count() <= DESCRIPTION_MAX + 1);
        assert!(out.ends_with('…'));
    }
}
