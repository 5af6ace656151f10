//! The host page surface mailkeys drives.
//!
//! The page is an external, uncontrolled, continuously-mutating document.
//! This crate models it as a narrow capability trait ([`Page`]) so the
//! layers above it (the element locator, the list models, the overlay
//! coordinators) can run against a scripted [`FakePage`] in tests without a
//! rendering engine.
//!
//! Lookups never fail hard: a selector that resolves to nothing yields
//! `None`/empty, and callers treat that as a soft miss.

use keyspec::KeyInput;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

mod cache;
mod fake;
pub mod selector;
mod wait;

pub use cache::SelectorCache;
pub use fake::{Dom, FakePage};
pub use wait::{poll_until, wait_for, wait_for_text, RetrySpec};

/// Opaque handle to a live node in the host page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    /// Construct from a raw id (adapters and fakes only).
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A bounding box in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Rect {
    /// Construct a rect.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the rect encloses any area at all.
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// What changed in an observed mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// Children were added or removed under the target.
    ChildList,
    /// An attribute on the target changed.
    Attributes,
    /// The target's own text changed.
    CharacterData,
}

/// One observed DOM mutation.
#[derive(Debug, Clone, Copy)]
pub struct Mutation {
    /// What changed.
    pub kind: MutationKind,
    /// The node it changed on.
    pub target: NodeId,
}

/// Capability surface over the host page.
///
/// Handles may go stale at any time; every accessor tolerates a dead or
/// disconnected node by returning `None`, an empty value, or doing nothing.
pub trait Page: Send + Sync {
    /// First element matching `selector`, in document order.
    fn query(&self, selector: &str) -> Option<NodeId>;

    /// All elements matching `selector`, in document order.
    fn query_all(&self, selector: &str) -> Vec<NodeId>;

    /// All elements matching `selector` among the descendants of `root`.
    fn query_within(&self, root: NodeId, selector: &str) -> Vec<NodeId>;

    /// Lowercased tag name.
    fn tag(&self, node: NodeId) -> Option<String>;

    /// Attribute value, if the attribute is present.
    fn attr(&self, node: NodeId, name: &str) -> Option<String>;

    /// Names of all attributes on the node.
    fn attr_names(&self, node: NodeId) -> Vec<String>;

    /// Concatenated text content of the node's subtree.
    fn text(&self, node: NodeId) -> String;

    /// Parent element, if any.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Child elements, in order.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Whether `ancestor` contains `node` (or is it).
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool;

    /// Bounding box; zero-sized when the node is gone.
    fn rect(&self, node: NodeId) -> Rect;

    /// The viewport box.
    fn viewport(&self) -> Rect;

    /// Whether the node is rendered (display/visibility-wise).
    fn is_visible(&self, node: NodeId) -> bool;

    /// Whether the node is still attached to the document.
    fn is_connected(&self, node: NodeId) -> bool;

    /// Simulate a user click.
    fn click(&self, node: NodeId);

    /// Set native focus.
    fn focus(&self, node: NodeId);

    /// The currently focused node, if any.
    fn focused(&self) -> Option<NodeId>;

    /// Scroll the node into view with "nearest" alignment.
    fn scroll_into_view(&self, node: NodeId);

    /// The page URL.
    fn url(&self) -> String;

    /// Dispatch a synthesized (untrusted) key event to the focused element.
    fn relay_key(&self, input: KeyInput);

    /// Subscribe to mutation notifications under the page body.
    fn subscribe(&self) -> broadcast::Receiver<Mutation>;
}
