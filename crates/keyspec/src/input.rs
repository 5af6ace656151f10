use serde::{Deserialize, Serialize};

/// Coarse classification of a keydown's event target.
///
/// The embedder classifies the concrete target before handing the event to
/// the dispatcher; the dispatcher never touches the raw node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum KeyTarget {
    /// Anywhere in the host page that is not an editable field.
    #[default]
    Page,
    /// An editable field: input, textarea, select, or contenteditable.
    Editable,
    /// The text input owned by an open overlay (the command palette's query
    /// field).
    OverlayInput,
}

/// A single observed keydown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInput {
    /// The key value as reported by the host, e.g. "j", "Escape", "ArrowDown".
    pub key: String,
    /// Control held.
    pub ctrl: bool,
    /// Alt held.
    pub alt: bool,
    /// Shift held.
    pub shift: bool,
    /// Meta held.
    pub meta: bool,
    /// False for synthesized events. The dispatcher ignores untrusted input
    /// so its own relayed events never feed back into it.
    pub trusted: bool,
    /// What the event targeted.
    pub target: KeyTarget,
}

impl KeyInput {
    /// A trusted, unmodified key press targeting the page.
    pub fn plain(key: &str) -> Self {
        Self {
            key: key.into(),
            ctrl: false,
            alt: false,
            shift: false,
            meta: false,
            trusted: true,
            target: KeyTarget::Page,
        }
    }

    /// A trusted shifted key press targeting the page.
    pub fn shifted(key: &str) -> Self {
        Self {
            shift: true,
            ..Self::plain(key)
        }
    }

    /// Lowercased key value, as the dispatcher compares it.
    pub fn key_lower(&self) -> String {
        self.key.to_lowercase()
    }

    /// True when no modifier is held.
    pub fn no_modifiers(&self) -> bool {
        !self.ctrl && !self.alt && !self.shift && !self.meta
    }

    /// Retarget the input (builder style).
    pub fn with_target(mut self, target: KeyTarget) -> Self {
        self.target = target;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_has_no_modifiers() {
        let input = KeyInput::plain("j");
        assert!(input.no_modifiers());
        assert!(input.trusted);
        assert_eq!(input.target, KeyTarget::Page);
    }

    #[test]
    fn shifted_sets_only_shift() {
        let input = KeyInput::shifted("j");
        assert!(input.shift && !input.ctrl && !input.alt && !input.meta);
        assert!(!input.no_modifiers());
    }

    #[test]
    fn key_lower_normalizes() {
        assert_eq!(KeyInput::plain("Escape").key_lower(), "escape");
    }
}
