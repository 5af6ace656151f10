use std::collections::HashMap;

use keyspec::KeyInput;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::{
    selector::{AttrOp, Combinator, Complex, Compound},
    Mutation, MutationKind, NodeId, Page, Rect, SelectorCache,
};

/// Mutation applied when a node is clicked, standing in for whatever the
/// host page would do (select a row, open a menu, ...).
type ClickEffect = Box<dyn FnMut(&mut Dom) + Send>;

/// Broadcast capacity for mutation subscribers.
const MUTATION_BUFFER: usize = 256;

struct NodeData {
    tag: String,
    attrs: Vec<(String, String)>,
    text: String,
    parent: Option<u64>,
    children: Vec<u64>,
    rect: Rect,
    visible: bool,
}

/// The mutable document tree behind a [`FakePage`].
///
/// Tests and click effects manipulate it directly through
/// [`FakePage::with_dom`]; every mutating call queues a [`Mutation`] which
/// the page broadcasts once the lock is released.
pub struct Dom {
    nodes: HashMap<u64, NodeData>,
    root: u64,
    next: u64,
    focused: Option<u64>,
    url: String,
    viewport: Rect,
    effects: HashMap<u64, ClickEffect>,
    pending: Vec<Mutation>,
    clicks: Vec<u64>,
    scrolled: Vec<u64>,
    relayed: Vec<KeyInput>,
}

impl Dom {
    fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            0,
            NodeData {
                tag: "body".into(),
                attrs: Vec::new(),
                text: String::new(),
                parent: None,
                children: Vec::new(),
                rect: Rect::new(0.0, 0.0, 1280.0, 800.0),
                visible: true,
            },
        );
        Self {
            nodes,
            root: 0,
            next: 1,
            focused: None,
            url: String::new(),
            viewport: Rect::new(0.0, 0.0, 1280.0, 800.0),
            effects: HashMap::new(),
            pending: Vec::new(),
            clicks: Vec::new(),
            scrolled: Vec::new(),
            relayed: Vec::new(),
        }
    }

    /// The document body.
    pub fn body(&self) -> NodeId {
        NodeId::from_raw(self.root)
    }

    /// Append a child element.
    pub fn append(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let index = self.children_of(parent.raw()).len();
        self.insert(parent, index, tag)
    }

    /// Insert a child element at `index` (clamped to the child count).
    pub fn insert(&mut self, parent: NodeId, index: usize, tag: &str) -> NodeId {
        let id = self.next;
        self.next += 1;
        self.nodes.insert(
            id,
            NodeData {
                tag: tag.to_lowercase(),
                attrs: Vec::new(),
                text: String::new(),
                parent: Some(parent.raw()),
                children: Vec::new(),
                rect: Rect::new(0.0, 0.0, 100.0, 20.0),
                visible: true,
            },
        );
        if let Some(p) = self.nodes.get_mut(&parent.raw()) {
            let at = index.min(p.children.len());
            p.children.insert(at, id);
        }
        self.pending.push(Mutation {
            kind: MutationKind::ChildList,
            target: parent,
        });
        NodeId::from_raw(id)
    }

    /// Append a child with attributes and text in one step.
    pub fn append_with(
        &mut self,
        parent: NodeId,
        tag: &str,
        attrs: &[(&str, &str)],
        text: &str,
    ) -> NodeId {
        let node = self.append(parent, tag);
        for (name, value) in attrs {
            self.set_attr(node, name, value);
        }
        if !text.is_empty() {
            self.set_text(node, text);
        }
        node
    }

    /// Set or replace an attribute.
    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(data) = self.nodes.get_mut(&node.raw()) {
            if let Some(slot) = data.attrs.iter_mut().find(|(n, _)| n == name) {
                slot.1 = value.to_string();
            } else {
                data.attrs.push((name.to_string(), value.to_string()));
            }
            self.pending.push(Mutation {
                kind: MutationKind::Attributes,
                target: node,
            });
        }
    }

    /// Remove an attribute if present.
    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        if let Some(data) = self.nodes.get_mut(&node.raw()) {
            let before = data.attrs.len();
            data.attrs.retain(|(n, _)| n != name);
            if data.attrs.len() != before {
                self.pending.push(Mutation {
                    kind: MutationKind::Attributes,
                    target: node,
                });
            }
        }
    }

    /// Set the node's own text.
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(data) = self.nodes.get_mut(&node.raw()) {
            data.text = text.to_string();
            self.pending.push(Mutation {
                kind: MutationKind::CharacterData,
                target: node,
            });
        }
    }

    /// Set the node's bounding box.
    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        if let Some(data) = self.nodes.get_mut(&node.raw()) {
            data.rect = rect;
        }
    }

    /// Show or hide the node (display/visibility style).
    pub fn set_visible(&mut self, node: NodeId, visible: bool) {
        if let Some(data) = self.nodes.get_mut(&node.raw()) {
            data.visible = visible;
            self.pending.push(Mutation {
                kind: MutationKind::Attributes,
                target: node,
            });
        }
    }

    /// Detach a node and its subtree.
    pub fn remove(&mut self, node: NodeId) {
        let Some(parent) = self.nodes.get(&node.raw()).and_then(|d| d.parent) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|c| *c != node.raw());
        }
        let mut stack = vec![node.raw()];
        while let Some(id) = stack.pop() {
            if let Some(data) = self.nodes.remove(&id) {
                stack.extend(data.children);
            }
            self.effects.remove(&id);
            if self.focused == Some(id) {
                self.focused = None;
            }
        }
        self.pending.push(Mutation {
            kind: MutationKind::ChildList,
            target: NodeId::from_raw(parent),
        });
    }

    /// Move focus (as the host page would on its own).
    pub fn set_focus(&mut self, node: Option<NodeId>) {
        self.focused = node.map(NodeId::raw);
    }

    /// Set the page URL.
    pub fn set_url(&mut self, url: &str) {
        self.url = url.to_string();
    }

    /// Set the viewport box.
    pub fn set_viewport(&mut self, rect: Rect) {
        self.viewport = rect;
    }

    /// Read an attribute (for effects and assertions).
    pub fn attr_of(&self, node: NodeId, name: &str) -> Option<String> {
        self.nodes
            .get(&node.raw())
            .and_then(|d| d.attrs.iter().find(|(n, _)| n == name))
            .map(|(_, v)| v.clone())
    }

    /// Child node ids, in order.
    pub fn child_ids(&self, node: NodeId) -> Vec<NodeId> {
        self.children_of(node.raw())
            .into_iter()
            .map(NodeId::from_raw)
            .collect()
    }

    fn children_of(&self, id: u64) -> Vec<u64> {
        self.nodes
            .get(&id)
            .map(|d| d.children.clone())
            .unwrap_or_default()
    }

    fn click(&mut self, node: NodeId) {
        if !self.nodes.contains_key(&node.raw()) {
            return;
        }
        self.clicks.push(node.raw());
        if let Some(mut effect) = self.effects.remove(&node.raw()) {
            effect(self);
            self.effects.entry(node.raw()).or_insert(effect);
        }
    }

    fn document_order(&self) -> Vec<u64> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            for child in self.children_of(id).into_iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    fn deep_text(&self, id: u64, out: &mut String) {
        if let Some(data) = self.nodes.get(&id) {
            out.push_str(&data.text);
            for child in &data.children {
                self.deep_text(*child, out);
            }
        }
    }

    fn matches_compound(&self, id: u64, compound: &Compound) -> bool {
        let Some(data) = self.nodes.get(&id) else {
            return false;
        };
        if let Some(tag) = &compound.tag
            && data.tag != *tag
        {
            return false;
        }
        if let Some(want) = &compound.id
            && self.attr_of(NodeId::from_raw(id), "id").as_deref() != Some(want.as_str())
        {
            return false;
        }
        if !compound.classes.is_empty() {
            let class_attr = self
                .attr_of(NodeId::from_raw(id), "class")
                .unwrap_or_default();
            let have: Vec<&str> = class_attr.split_whitespace().collect();
            if !compound.classes.iter().all(|c| have.contains(&c.as_str())) {
                return false;
            }
        }
        for test in &compound.attrs {
            let value = self.attr_of(NodeId::from_raw(id), &test.name);
            let ok = match (&test.op, &value) {
                (AttrOp::Exists, v) => v.is_some(),
                (AttrOp::Equals, Some(v)) => *v == test.value,
                (AttrOp::Prefix, Some(v)) => v.starts_with(&test.value),
                (AttrOp::Contains, Some(v)) => v.contains(&test.value),
                _ => false,
            };
            if !ok {
                return false;
            }
        }
        if let Some(n) = compound.nth_of_type {
            let Some(parent) = data.parent else {
                return false;
            };
            let position = self
                .children_of(parent)
                .into_iter()
                .filter(|c| self.nodes.get(c).is_some_and(|d| d.tag == data.tag))
                .position(|c| c == id);
            if position.map(|p| p + 1) != Some(n) {
                return false;
            }
        }
        if compound.not.iter().any(|inner| {
            // :not() takes a simple compound, matched without structure.
            let mut flat = inner.clone();
            flat.nth_of_type = None;
            self.matches_compound(id, &flat)
        }) {
            return false;
        }
        true
    }

    fn matches_complex(&self, id: u64, complex: &Complex) -> bool {
        self.matches_from(id, complex, complex.parts.len() - 1)
    }

    fn matches_from(&self, id: u64, complex: &Complex, idx: usize) -> bool {
        if !self.matches_compound(id, &complex.parts[idx].1) {
            return false;
        }
        if idx == 0 {
            return true;
        }
        let parent = self.nodes.get(&id).and_then(|d| d.parent);
        match complex.parts[idx].0 {
            Combinator::Child => {
                parent.is_some_and(|p| self.matches_from(p, complex, idx - 1))
            }
            Combinator::Descendant => {
                let mut cur = parent;
                while let Some(p) = cur {
                    if self.matches_from(p, complex, idx - 1) {
                        return true;
                    }
                    cur = self.nodes.get(&p).and_then(|d| d.parent);
                }
                false
            }
        }
    }
}

/// A fully scripted, in-memory [`Page`] for tests.
///
/// Behavior the host page would exhibit (selecting a row on click, opening a
/// menu) is expressed as per-node click effects that mutate the tree; every
/// tree mutation is broadcast to subscribers exactly like the real page's
/// mutation observer feed.
pub struct FakePage {
    dom: Mutex<Dom>,
    tx: broadcast::Sender<Mutation>,
    selectors: SelectorCache,
}

impl Default for FakePage {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePage {
    /// Create an empty page (a bare body).
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(MUTATION_BUFFER);
        Self {
            dom: Mutex::new(Dom::new()),
            tx,
            selectors: SelectorCache::new(),
        }
    }

    /// Run `f` against the tree, then broadcast all queued mutations.
    pub fn with_dom<R>(&self, f: impl FnOnce(&mut Dom) -> R) -> R {
        let (result, pending) = {
            let mut dom = self.dom.lock();
            let result = f(&mut dom);
            (result, std::mem::take(&mut dom.pending))
        };
        for m in pending {
            let _ = self.tx.send(m);
        }
        result
    }

    /// The document body.
    pub fn body(&self) -> NodeId {
        self.dom.lock().body()
    }

    /// Register (or replace) the click effect for a node.
    pub fn on_click(&self, node: NodeId, effect: impl FnMut(&mut Dom) + Send + 'static) {
        self.dom.lock().effects.insert(node.raw(), Box::new(effect));
    }

    /// Clicks observed so far, in order.
    pub fn clicks(&self) -> Vec<NodeId> {
        self.dom.lock().clicks.iter().copied().map(NodeId::from_raw).collect()
    }

    /// Nodes scrolled into view so far, in order.
    pub fn scrolled(&self) -> Vec<NodeId> {
        self.dom.lock().scrolled.iter().copied().map(NodeId::from_raw).collect()
    }

    /// Synthesized key events relayed into the page so far.
    pub fn relayed(&self) -> Vec<KeyInput> {
        self.dom.lock().relayed.clone()
    }

    fn query_impl(&self, scope: Option<NodeId>, selector: &str) -> Vec<NodeId> {
        let Some(parsed) = self.selectors.get_or_parse(selector) else {
            return Vec::new();
        };
        let dom = self.dom.lock();
        let mut out = Vec::new();
        for id in dom.document_order() {
            if let Some(root) = scope {
                if id == root.raw() || !self.contained(&dom, root.raw(), id) {
                    continue;
                }
            }
            if parsed.complexes.iter().any(|c| dom.matches_complex(id, c)) {
                out.push(NodeId::from_raw(id));
            }
        }
        out
    }

    fn contained(&self, dom: &Dom, ancestor: u64, mut id: u64) -> bool {
        loop {
            match dom.nodes.get(&id).and_then(|d| d.parent) {
                Some(p) if p == ancestor => return true,
                Some(p) => id = p,
                None => return false,
            }
        }
    }
}

impl Page for FakePage {
    fn query(&self, selector: &str) -> Option<NodeId> {
        self.query_impl(None, selector).into_iter().next()
    }

    fn query_all(&self, selector: &str) -> Vec<NodeId> {
        self.query_impl(None, selector)
    }

    fn query_within(&self, root: NodeId, selector: &str) -> Vec<NodeId> {
        self.query_impl(Some(root), selector)
    }

    fn tag(&self, node: NodeId) -> Option<String> {
        self.dom.lock().nodes.get(&node.raw()).map(|d| d.tag.clone())
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        self.dom.lock().attr_of(node, name)
    }

    fn attr_names(&self, node: NodeId) -> Vec<String> {
        self.dom
            .lock()
            .nodes
            .get(&node.raw())
            .map(|d| d.attrs.iter().map(|(n, _)| n.clone()).collect())
            .unwrap_or_default()
    }

    fn text(&self, node: NodeId) -> String {
        let dom = self.dom.lock();
        let mut out = String::new();
        dom.deep_text(node.raw(), &mut out);
        out
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.dom
            .lock()
            .nodes
            .get(&node.raw())
            .and_then(|d| d.parent)
            .map(NodeId::from_raw)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.dom.lock().child_ids(node)
    }

    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        if ancestor == node {
            return true;
        }
        let dom = self.dom.lock();
        self.contained(&dom, ancestor.raw(), node.raw())
    }

    fn rect(&self, node: NodeId) -> Rect {
        self.dom
            .lock()
            .nodes
            .get(&node.raw())
            .map(|d| d.rect)
            .unwrap_or_default()
    }

    fn viewport(&self) -> Rect {
        self.dom.lock().viewport
    }

    fn is_visible(&self, node: NodeId) -> bool {
        self.dom
            .lock()
            .nodes
            .get(&node.raw())
            .is_some_and(|d| d.visible)
    }

    fn is_connected(&self, node: NodeId) -> bool {
        self.dom.lock().nodes.contains_key(&node.raw())
    }

    fn click(&self, node: NodeId) {
        self.with_dom(|dom| dom.click(node));
    }

    fn focus(&self, node: NodeId) {
        let mut dom = self.dom.lock();
        if dom.nodes.contains_key(&node.raw()) {
            dom.focused = Some(node.raw());
        }
    }

    fn focused(&self) -> Option<NodeId> {
        self.dom.lock().focused.map(NodeId::from_raw)
    }

    fn scroll_into_view(&self, node: NodeId) {
        self.dom.lock().scrolled.push(node.raw());
    }

    fn url(&self) -> String {
        self.dom.lock().url.clone()
    }

    fn relay_key(&self, input: KeyInput) {
        self.dom.lock().relayed.push(input);
    }

    fn subscribe(&self) -> broadcast::Receiver<Mutation> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with_rows() -> (FakePage, NodeId, Vec<NodeId>) {
        let page = FakePage::new();
        let (grid, rows) = page.with_dom(|dom| {
            let body = dom.body();
            let grid = dom.append_with(body, "div", &[("role", "grid")], "");
            let rows = (0..3)
                .map(|i| {
                    dom.append_with(
                        grid,
                        "div",
                        &[("role", "row"), ("data-item-id", &format!("m{}", i))],
                        "",
                    )
                })
                .collect();
            (grid, rows)
        });
        (page, grid, rows)
    }

    #[test]
    fn query_matches_in_document_order() {
        let (page, _grid, rows) = page_with_rows();
        let found = page.query_all("[role=\"row\"]");
        assert_eq!(found, rows);
        assert_eq!(page.query("[role=\"row\"]"), Some(rows[0]));
    }

    #[test]
    fn query_within_excludes_root_and_outsiders() {
        let (page, grid, rows) = page_with_rows();
        let outside = page.with_dom(|dom| {
            let body = dom.body();
            dom.append_with(body, "div", &[("role", "row")], "")
        });
        let found = page.query_within(grid, "[role=\"row\"]");
        assert_eq!(found, rows);
        assert!(!found.contains(&outside));
    }

    #[test]
    fn nth_of_type_counts_same_tag_siblings() {
        let page = FakePage::new();
        let (second_span,) = page.with_dom(|dom| {
            let body = dom.body();
            dom.append(body, "div");
            dom.append(body, "span");
            let second = dom.append(body, "span");
            (second,)
        });
        assert_eq!(page.query("span:nth-of-type(2)"), Some(second_span));
        assert_eq!(page.query("span:nth-of-type(3)"), None);
    }

    #[test]
    fn child_and_descendant_combinators() {
        let page = FakePage::new();
        let (inner, deep) = page.with_dom(|dom| {
            let body = dom.body();
            let outer = dom.append_with(body, "div", &[("id", "tools")], "");
            let inner = dom.append(outer, "button");
            let wrap = dom.append(outer, "div");
            let deep = dom.append(wrap, "button");
            (inner, deep)
        });
        assert_eq!(page.query_all("#tools > button"), vec![inner]);
        assert_eq!(page.query_all("#tools button"), vec![inner, deep]);
    }

    #[test]
    fn attribute_operators_match() {
        let page = FakePage::new();
        let btn = page.with_dom(|dom| {
            let body = dom.body();
            dom.append_with(body, "button", &[("aria-label", "Snooze until later")], "")
        });
        assert_eq!(page.query("button[aria-label^=\"Snooze\"]"), Some(btn));
        assert_eq!(page.query("button[aria-label*=\"until\"]"), Some(btn));
        assert_eq!(page.query("button[aria-label=\"Snooze\"]"), None);
    }

    #[test]
    fn not_pseudo_class_filters() {
        let page = FakePage::new();
        let (shown, _hidden) = page.with_dom(|dom| {
            let body = dom.body();
            let shown = dom.append_with(body, "div", &[("role", "menu")], "");
            let hidden =
                dom.append_with(body, "div", &[("role", "menu"), ("aria-hidden", "true")], "");
            (shown, hidden)
        });
        assert_eq!(
            page.query_all("[role=\"menu\"]:not([aria-hidden=\"true\"])"),
            vec![shown]
        );
    }

    #[test]
    fn click_effects_mutate_and_broadcast() {
        let (page, _grid, rows) = page_with_rows();
        let row = rows[1];
        page.on_click(row, move |dom| {
            dom.set_attr(row, "aria-selected", "true");
        });
        let mut rx = page.subscribe();
        page.click(row);
        assert_eq!(page.attr(row, "aria-selected").as_deref(), Some("true"));
        let m = rx.try_recv().expect("mutation broadcast");
        assert_eq!(m.target, row);
        assert_eq!(page.clicks(), vec![row]);
    }

    #[test]
    fn text_concatenates_subtree() {
        let page = FakePage::new();
        let button = page.with_dom(|dom| {
            let body = dom.body();
            let button = dom.append(body, "button");
            let label = dom.append(button, "span");
            dom.set_text(label, "Later today");
            let secondary = dom.append(button, "span");
            dom.set_text(secondary, "5:00 AM");
            button
        });
        assert_eq!(page.text(button), "Later today5:00 AM");
    }

    #[test]
    fn removal_disconnects_subtree() {
        let (page, grid, rows) = page_with_rows();
        page.with_dom(|dom| dom.remove(rows[0]));
        assert!(!page.is_connected(rows[0]));
        assert_eq!(page.query_all("[role=\"row\"]").len(), 2);
        assert_eq!(page.children(grid).len(), 2);
    }

    #[test]
    fn insert_at_front_models_restored_rows() {
        let (page, grid, rows) = page_with_rows();
        let restored = page.with_dom(|dom| {
            let restored = dom.insert(grid, 0, "div");
            dom.set_attr(restored, "role", "row");
            dom.set_attr(restored, "data-item-id", "restored");
            restored
        });
        let all = page.query_all("[role=\"row\"]");
        assert_eq!(all[0], restored);
        assert_eq!(all.len(), rows.len() + 1);
    }
}
