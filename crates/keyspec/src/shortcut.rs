use std::fmt;

use serde::{Deserialize, Serialize};

use crate::KeyInput;

/// A key chord: up to four modifiers plus a single key.
///
/// The wire field names match the storage schema used by the browser side
/// (`ctrlKey`, `altKey`, ...), so shortcuts saved there deserialize directly.
/// An empty `key` means the shortcut is unset; it matches no event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Shortcut {
    /// Control modifier.
    #[serde(rename = "ctrlKey")]
    pub ctrl: bool,
    /// Alt/Option modifier.
    #[serde(rename = "altKey")]
    pub alt: bool,
    /// Shift modifier.
    #[serde(rename = "shiftKey")]
    pub shift: bool,
    /// Meta/Command modifier.
    #[serde(rename = "metaKey")]
    pub meta: bool,
    /// The non-modifier key, lowercased. Empty when unset.
    pub key: String,
}

impl Shortcut {
    /// Build a shortcut from parts, normalizing the key to lowercase.
    pub fn new(ctrl: bool, alt: bool, shift: bool, meta: bool, key: &str) -> Self {
        Self {
            ctrl,
            alt,
            shift,
            meta,
            key: key.to_lowercase(),
        }
    }

    /// A plain, unmodified key.
    pub fn plain(key: &str) -> Self {
        Self::new(false, false, false, false, key)
    }

    /// Capture a shortcut from an observed keydown.
    pub fn from_input(input: &KeyInput) -> Self {
        Self::new(input.ctrl, input.alt, input.shift, input.meta, &input.key)
    }

    /// Parses a chord specification of the form "ctrl+shift+k".
    ///
    /// - Case-insensitive for both modifiers and the key.
    /// - Components are separated by "+"; the last component is always the key.
    /// - Modifier aliases: ctrl/control, alt/opt/option, shift, meta/cmd/command.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts: Vec<&str> = s.split('+').collect();
        let key_raw = parts.pop()?.trim();
        if key_raw.is_empty() {
            return None;
        }
        let mut out = Self::plain(key_raw);
        for part in parts {
            match part.trim().to_lowercase().as_str() {
                "ctrl" | "control" => out.ctrl = true,
                "alt" | "opt" | "option" => out.alt = true,
                "shift" => out.shift = true,
                "meta" | "cmd" | "command" => out.meta = true,
                _ => return None,
            }
        }
        Some(out)
    }

    /// True when a key has been assigned.
    pub fn is_set(&self) -> bool {
        !self.key.is_empty()
    }

    /// Whether this shortcut matches an observed keydown.
    ///
    /// All four modifiers must agree exactly; the key comparison ignores
    /// case. An unset shortcut never matches.
    pub fn matches(&self, input: &KeyInput) -> bool {
        self.is_set()
            && input.key.to_lowercase() == self.key.to_lowercase()
            && input.ctrl == self.ctrl
            && input.alt == self.alt
            && input.shift == self.shift
            && input.meta == self.meta
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_set() {
            return write!(f, "Not set");
        }
        let mut parts: Vec<String> = Vec::new();
        if self.ctrl {
            parts.push("Ctrl".into());
        }
        if self.alt {
            parts.push("Alt".into());
        }
        if self.shift {
            parts.push("Shift".into());
        }
        if self.meta {
            parts.push("Meta".into());
        }
        parts.push(self.key.to_uppercase());
        write!(f, "{}", parts.join(" + "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyTarget;

    fn input(key: &str, ctrl: bool, alt: bool, shift: bool, meta: bool) -> KeyInput {
        KeyInput {
            key: key.into(),
            ctrl,
            alt,
            shift,
            meta,
            trusted: true,
            target: KeyTarget::Page,
        }
    }

    #[test]
    fn parse_basic_chord() {
        let s = Shortcut::parse("ctrl+shift+K").expect("parse");
        assert!(s.ctrl && s.shift && !s.alt && !s.meta);
        assert_eq!(s.key, "k");
        assert_eq!(s.to_string(), "Ctrl + Shift + K");
    }

    #[test]
    fn parse_rejects_unknown_modifier() {
        assert!(Shortcut::parse("hyper+k").is_none());
        assert!(Shortcut::parse("").is_none());
    }

    #[test]
    fn matching_ignores_key_case() {
        let s = Shortcut::new(true, false, false, false, "z");
        assert!(s.matches(&input("Z", true, false, false, false)));
        assert!(s.matches(&input("z", true, false, false, false)));
        assert!(!s.matches(&input("z", true, false, true, false)));
        assert!(!s.matches(&input("x", true, false, false, false)));
    }

    #[test]
    fn unset_shortcut_never_matches() {
        let s = Shortcut::default();
        assert!(!s.is_set());
        assert!(!s.matches(&input("", false, false, false, false)));
        assert_eq!(s.to_string(), "Not set");
    }

    #[test]
    fn wire_roundtrip() {
        let s = Shortcut::new(true, false, true, false, "k");
        let json = serde_json::to_string(&s).expect("serialize");
        assert!(json.contains("\"ctrlKey\":true"));
        let back: Shortcut = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(s, back);
    }

    #[test]
    fn deserializes_partial_wire_form() {
        // The storage layer merges over defaults; missing fields are false.
        let s: Shortcut = serde_json::from_str(r#"{"key":"z"}"#).expect("deserialize");
        assert_eq!(s, Shortcut::plain("z"));
    }
}
