//! Keyboard routing: the strict ownership priority chain, evaluated on
//! every trusted keydown.
//!
//! Routing is pure: it looks at the event, the settings snapshot, and the
//! overlay-open predicates, and produces a [`KeyAction`] plus an event
//! disposition. The engine executes the action afterwards; nothing here
//! touches the page.

use config::Settings;
use keyspec::{KeyInput, KeyTarget};

use crate::list::VDir;

/// What should happen to the browser event itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    /// Not ours; let the host see it untouched.
    Pass,
    /// Stop propagation but allow the default action (overlay input
    /// typing).
    Stop,
    /// Prevent default and stop propagation.
    Consume,
}

/// The resolved action for a keydown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum KeyAction {
    /// Escape in the picker: step back one level.
    PickerBack,
    /// Close the palette from its own Escape.
    PaletteEscape,
    /// Move the palette cursor.
    PaletteMove(VDir),
    /// Execute the palette's active (or first) command.
    PaletteEnter,
    /// Close the summary panel.
    SummaryClose,
    /// Focus entered an editable field: reset the navigation context.
    ResetNavContext,
    /// Run the custom shortcut at this index in the snapshot.
    RunCustom(usize),
    /// Relay Shift+Arrow range selection to the host.
    RelayMultiSelect(VDir),
    /// Move the snooze overlay cursor.
    SnoozeMove(VDir),
    /// Activate the snooze overlay's current entry.
    SnoozeActivate,
    /// Close the snooze overlay.
    SnoozeClose,
    /// Toggle the snooze overlay.
    SnoozeToggle,
    /// Vim vertical movement in the current context.
    VimMove(VDir),
    /// Vim `h`: pin and focus the sidebar.
    VimSidebar,
    /// Vim `l`: return from the sidebar, or behave like `h`.
    VimRight,
    /// Toggle the command palette.
    PaletteToggle,
    /// Trigger undo.
    Undo,
}

/// Routing decision: an optional action plus the event disposition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Routed {
    /// The action to execute, if any.
    pub action: Option<KeyAction>,
    /// What happens to the event.
    pub disposition: KeyDisposition,
}

impl Routed {
    fn pass() -> Self {
        Self {
            action: None,
            disposition: KeyDisposition::Pass,
        }
    }

    fn swallow() -> Self {
        Self {
            action: None,
            disposition: KeyDisposition::Consume,
        }
    }

    fn consume(action: KeyAction) -> Self {
        Self {
            action: Some(action),
            disposition: KeyDisposition::Consume,
        }
    }
}

/// Overlay-open predicates the router consults, in priority order.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct OverlayStates {
    /// Element picker active.
    pub picker: bool,
    /// Command palette open.
    pub palette: bool,
    /// Summary panel open.
    pub summary: bool,
    /// Snooze overlay open.
    pub snooze: bool,
}

/// Resolve a keydown against the ownership chain. First match wins.
pub(crate) fn route(input: &KeyInput, settings: &Settings, overlays: OverlayStates) -> Routed {
    // Synthetic events (including our own relayed arrows) never re-enter.
    if !input.trusted {
        return Routed::pass();
    }
    let key = input.key_lower();

    // 1. Picker owns everything; only Escape means anything.
    if overlays.picker {
        if key == "escape" {
            return Routed::consume(KeyAction::PickerBack);
        }
        return Routed::swallow();
    }

    // 2. Palette owns all input while open.
    if overlays.palette {
        if key == "escape" {
            return Routed::consume(KeyAction::PaletteEscape);
        }
        if !input.meta && !input.ctrl && !input.alt {
            match key.as_str() {
                "arrowdown" => return Routed::consume(KeyAction::PaletteMove(VDir::Down)),
                "arrowup" => return Routed::consume(KeyAction::PaletteMove(VDir::Up)),
                "enter" => return Routed::consume(KeyAction::PaletteEnter),
                _ => {}
            }
        }
        if input.target == KeyTarget::OverlayInput {
            // Typing in the palette's own input: keep it local.
            return Routed {
                action: None,
                disposition: KeyDisposition::Stop,
            };
        }
        return Routed::swallow();
    }

    // 3. Summary panel closes on Escape.
    if overlays.summary && key == "escape" {
        return Routed::consume(KeyAction::SummaryClose);
    }

    // 4. Editable targets behave natively; typing is never shortcut input.
    if input.target == KeyTarget::Editable {
        return Routed {
            action: Some(KeyAction::ResetNavContext),
            disposition: KeyDisposition::Pass,
        };
    }

    // 5. Custom shortcuts run before every built-in binding.
    for (index, custom) in settings.custom_shortcuts.iter().enumerate() {
        if let Some(shortcut) = &custom.shortcut
            && shortcut.matches(input)
        {
            return Routed::consume(KeyAction::RunCustom(index));
        }
    }

    // 6. Shift+j/k hands range selection to the host.
    if settings.vim_enabled
        && input.shift
        && !input.ctrl
        && !input.alt
        && !input.meta
        && (key == "j" || key == "k")
        && !overlays.snooze
    {
        let dir = if key == "j" { VDir::Down } else { VDir::Up };
        return Routed::consume(KeyAction::RelayMultiSelect(dir));
    }

    if input.no_modifiers() {
        // 7. Keys owned by the open snooze overlay.
        if overlays.snooze {
            match key.as_str() {
                "j" => return Routed::consume(KeyAction::SnoozeMove(VDir::Down)),
                "k" => return Routed::consume(KeyAction::SnoozeMove(VDir::Up)),
                "enter" => return Routed::consume(KeyAction::SnoozeActivate),
                // Navigation must not leak behind the overlay.
                "h" | "l" => return Routed::swallow(),
                "escape" => return Routed::consume(KeyAction::SnoozeClose),
                "s" => return Routed::consume(KeyAction::SnoozeToggle),
                _ => {}
            }
        } else if key == "s" {
            // 8. Toggle the snooze overlay.
            return Routed::consume(KeyAction::SnoozeToggle);
        }

        // 9. Vim navigation.
        if settings.vim_enabled {
            match key.as_str() {
                "j" => return Routed::consume(KeyAction::VimMove(VDir::Down)),
                "k" => return Routed::consume(KeyAction::VimMove(VDir::Up)),
                "h" => return Routed::consume(KeyAction::VimSidebar),
                "l" => return Routed::consume(KeyAction::VimRight),
                _ => {}
            }
        }
    }

    // 10. The configurable palette shortcut.
    if settings.palette_shortcut.matches(input) {
        return Routed::consume(KeyAction::PaletteToggle);
    }

    // 11. The configurable undo shortcut.
    if settings.undo_shortcut.matches(input) {
        return Routed::consume(KeyAction::Undo);
    }

    Routed::pass()
}

#[cfg(test)]
mod tests {
    use config::CustomShortcut;
    use keyspec::Shortcut;

    use super::*;

    fn settings() -> Settings {
        Settings::default()
    }

    fn plain(key: &str) -> KeyInput {
        KeyInput::plain(key)
    }

    #[test]
    fn untrusted_events_pass_untouched() {
        let input = KeyInput {
            trusted: false,
            ..KeyInput::shifted("ArrowDown")
        };
        let routed = route(&input, &settings(), OverlayStates::default());
        assert_eq!(routed, Routed::pass());
    }

    #[test]
    fn picker_owns_everything_but_escape() {
        let overlays = OverlayStates {
            picker: true,
            ..OverlayStates::default()
        };
        let routed = route(&plain("Escape"), &settings(), overlays);
        assert_eq!(routed.action, Some(KeyAction::PickerBack));
        let routed = route(&plain("j"), &settings(), overlays);
        assert_eq!(routed.action, None);
        assert_eq!(routed.disposition, KeyDisposition::Consume);
    }

    #[test]
    fn palette_routes_navigation_and_guards_input() {
        let overlays = OverlayStates {
            palette: true,
            ..OverlayStates::default()
        };
        assert_eq!(
            route(&plain("ArrowDown"), &settings(), overlays).action,
            Some(KeyAction::PaletteMove(VDir::Down))
        );
        assert_eq!(
            route(&plain("Enter"), &settings(), overlays).action,
            Some(KeyAction::PaletteEnter)
        );
        // Typing into the palette input: allowed but stopped.
        let typing = plain("x").with_target(KeyTarget::OverlayInput);
        let routed = route(&typing, &settings(), overlays);
        assert_eq!(routed.disposition, KeyDisposition::Stop);
        assert_eq!(routed.action, None);
        // Keys aimed at the page behind the palette are suppressed.
        let routed = route(&plain("x"), &settings(), overlays);
        assert_eq!(routed.disposition, KeyDisposition::Consume);
        assert_eq!(routed.action, None);
    }

    #[test]
    fn editable_targets_reset_context_and_pass() {
        let mut s = settings();
        s.custom_shortcuts.push(CustomShortcut {
            id: "custom-1".into(),
            selector: "button".into(),
            description: "X".into(),
            shortcut: Some(Shortcut::plain("j")),
            menu_trigger_selector: None,
        });
        let input = plain("j").with_target(KeyTarget::Editable);
        let routed = route(&input, &s, OverlayStates::default());
        assert_eq!(routed.action, Some(KeyAction::ResetNavContext));
        assert_eq!(routed.disposition, KeyDisposition::Pass);
    }

    #[test]
    fn custom_shortcuts_precede_vim_keys() {
        let mut s = settings();
        s.custom_shortcuts.push(CustomShortcut {
            id: "custom-1".into(),
            selector: "button".into(),
            description: "X".into(),
            shortcut: Some(Shortcut::plain("j")),
            menu_trigger_selector: None,
        });
        let routed = route(&plain("j"), &s, OverlayStates::default());
        assert_eq!(routed.action, Some(KeyAction::RunCustom(0)));
    }

    #[test]
    fn shift_jk_relays_multi_select_unless_snoozing() {
        let routed = route(&KeyInput::shifted("j"), &settings(), OverlayStates::default());
        assert_eq!(routed.action, Some(KeyAction::RelayMultiSelect(VDir::Down)));
        let overlays = OverlayStates {
            snooze: true,
            ..OverlayStates::default()
        };
        let routed = route(&KeyInput::shifted("k"), &settings(), overlays);
        assert_eq!(routed.action, None);
    }

    #[test]
    fn snooze_overlay_owns_plain_keys() {
        let overlays = OverlayStates {
            snooze: true,
            ..OverlayStates::default()
        };
        assert_eq!(
            route(&plain("j"), &settings(), overlays).action,
            Some(KeyAction::SnoozeMove(VDir::Down))
        );
        assert_eq!(
            route(&plain("Enter"), &settings(), overlays).action,
            Some(KeyAction::SnoozeActivate)
        );
        let routed = route(&plain("h"), &settings(), overlays);
        assert_eq!(routed.action, None);
        assert_eq!(routed.disposition, KeyDisposition::Consume);
        assert_eq!(
            route(&plain("s"), &settings(), overlays).action,
            Some(KeyAction::SnoozeToggle)
        );
    }

    #[test]
    fn vim_keys_route_when_enabled() {
        assert_eq!(
            route(&plain("j"), &settings(), OverlayStates::default()).action,
            Some(KeyAction::VimMove(VDir::Down))
        );
        assert_eq!(
            route(&plain("h"), &settings(), OverlayStates::default()).action,
            Some(KeyAction::VimSidebar)
        );
        let mut s = settings();
        s.vim_enabled = false;
        let routed = route(&plain("j"), &s, OverlayStates::default());
        assert_eq!(routed, Routed::pass());
    }

    #[test]
    fn configured_chords_toggle_palette_and_undo() {
        let mut s = settings();
        s.undo_shortcut = Shortcut::new(true, false, false, false, "k");
        let input = KeyInput {
            ctrl: true,
            ..plain("k")
        };
        let routed = route(&input, &s, OverlayStates::default());
        assert_eq!(routed.action, Some(KeyAction::Undo));

        let palette = KeyInput {
            meta: true,
            ..plain("K")
        };
        let routed = route(&palette, &s, OverlayStates::default());
        assert_eq!(routed.action, Some(KeyAction::PaletteToggle));
    }

    #[test]
    fn unset_shortcut_never_routes() {
        let mut s = settings();
        s.undo_shortcut = Shortcut::default();
        let routed = route(&plain("z"), &s, OverlayStates::default());
        assert_eq!(routed, Routed::pass());
    }

    #[test]
    fn unclaimed_keys_pass() {
        let routed = route(&plain("q"), &settings(), OverlayStates::default());
        assert_eq!(routed, Routed::pass());
    }
}
