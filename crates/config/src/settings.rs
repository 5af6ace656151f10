use keyspec::Shortcut;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::ValueMap;

/// Storage key names, shared with the options surface.
pub mod keys {
    /// Undo shortcut (synced).
    pub const UNDO_SHORTCUT: &str = "undoShortcut";
    /// Command palette shortcut (synced).
    pub const PALETTE_SHORTCUT: &str = "paletteShortcut";
    /// Vim navigation toggle (synced).
    pub const VIM_ENABLED: &str = "vimEnabled";
    /// Dark overlay theme toggle (synced).
    pub const DARK_MODE: &str = "darkMode";
    /// Inbox-zero celebration toggle (synced).
    pub const CELEBRATION: &str = "celebration";
    /// Host chrome hidden toggle (synced).
    pub const CHROME_HIDDEN: &str = "chromeHidden";
    /// Assist-formatted shortcut titles toggle (synced).
    pub const ASSIST_TITLES: &str = "assistTitles";
    /// Custom shortcut list (synced).
    pub const CUSTOM_SHORTCUTS: &str = "customShortcuts";
    /// Transient scroll-target marker (local only).
    pub const SCROLL_TO_SHORTCUT: &str = "scrollToShortcut";

    /// All synced keys, in storage order.
    pub const SYNCED: &[&str] = &[
        UNDO_SHORTCUT,
        PALETTE_SHORTCUT,
        VIM_ENABLED,
        DARK_MODE,
        CELEBRATION,
        CHROME_HIDDEN,
        ASSIST_TITLES,
        CUSTOM_SHORTCUTS,
    ];
}

/// A user-defined shortcut bound to an element on the host page.
///
/// `selector` re-locates the target; `menu_trigger_selector`, when present,
/// names a control that must be clicked first to reveal a menu-gated target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomShortcut {
    /// Generated unique token.
    pub id: String,
    /// Selector for the target element.
    pub selector: String,
    /// Human-readable description, shown in the palette and options.
    pub description: String,
    /// Bound chord; `None` until assigned in the options surface.
    #[serde(default)]
    pub shortcut: Option<Shortcut>,
    /// Selector for the menu trigger to click before resolving `selector`.
    #[serde(rename = "menuTriggerSelector", default)]
    pub menu_trigger_selector: Option<String>,
}

/// Immutable-per-read aggregate of all user preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Chord that triggers the host's undo control.
    pub undo_shortcut: Shortcut,
    /// Chord that toggles the command palette.
    pub palette_shortcut: Shortcut,
    /// Vim-style j/k/h/l navigation.
    pub vim_enabled: bool,
    /// Dark theme for overlays.
    pub dark_mode: bool,
    /// Celebrate when the inbox reaches zero.
    pub celebration: bool,
    /// Host chrome (options bar, header) hidden.
    pub chrome_hidden: bool,
    /// Format picked-element titles through the assist service.
    pub assist_titles: bool,
    /// User-defined element shortcuts.
    pub custom_shortcuts: Vec<CustomShortcut>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            undo_shortcut: Shortcut::plain("z"),
            palette_shortcut: Shortcut::new(false, false, false, true, "k"),
            vim_enabled: true,
            dark_mode: true,
            celebration: false,
            chrome_hidden: false,
            assist_titles: true,
            custom_shortcuts: Vec::new(),
        }
    }
}

impl Settings {
    /// Build a snapshot from stored values, falling back to defaults for
    /// missing or mistyped entries.
    pub fn from_values(values: &ValueMap) -> Self {
        Self::default().merged(values)
    }

    /// Return a copy of this snapshot with `values` applied over it.
    ///
    /// Unknown keys are ignored; entries that fail to deserialize keep the
    /// current value. This is the only way snapshots change.
    pub fn merged(&self, values: &ValueMap) -> Self {
        let mut out = self.clone();
        if let Some(s) = get_as::<Shortcut>(values, keys::UNDO_SHORTCUT) {
            out.undo_shortcut = s;
        }
        if let Some(s) = get_as::<Shortcut>(values, keys::PALETTE_SHORTCUT) {
            out.palette_shortcut = s;
        }
        if let Some(b) = get_bool(values, keys::VIM_ENABLED) {
            out.vim_enabled = b;
        }
        if let Some(b) = get_bool(values, keys::DARK_MODE) {
            out.dark_mode = b;
        }
        if let Some(b) = get_bool(values, keys::CELEBRATION) {
            out.celebration = b;
        }
        if let Some(b) = get_bool(values, keys::CHROME_HIDDEN) {
            out.chrome_hidden = b;
        }
        if let Some(b) = get_bool(values, keys::ASSIST_TITLES) {
            out.assist_titles = b;
        }
        if let Some(list) = get_as::<Vec<CustomShortcut>>(values, keys::CUSTOM_SHORTCUTS) {
            out.custom_shortcuts = list;
        }
        out
    }

    /// Serialize the full snapshot into storage values.
    pub fn to_values(&self) -> ValueMap {
        let mut out = ValueMap::new();
        out.insert(keys::UNDO_SHORTCUT.into(), json(&self.undo_shortcut));
        out.insert(keys::PALETTE_SHORTCUT.into(), json(&self.palette_shortcut));
        out.insert(keys::VIM_ENABLED.into(), Value::Bool(self.vim_enabled));
        out.insert(keys::DARK_MODE.into(), Value::Bool(self.dark_mode));
        out.insert(keys::CELEBRATION.into(), Value::Bool(self.celebration));
        out.insert(keys::CHROME_HIDDEN.into(), Value::Bool(self.chrome_hidden));
        out.insert(keys::ASSIST_TITLES.into(), Value::Bool(self.assist_titles));
        out.insert(keys::CUSTOM_SHORTCUTS.into(), json(&self.custom_shortcuts));
        out
    }
}

fn json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn get_bool(values: &ValueMap, key: &str) -> Option<bool> {
    values.get(key).and_then(Value::as_bool)
}

fn get_as<T: serde::de::DeserializeOwned>(values: &ValueMap, key: &str) -> Option<T> {
    let value = values.get(key)?;
    if value.is_null() {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}
