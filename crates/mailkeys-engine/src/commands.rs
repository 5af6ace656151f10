//! The command registry behind the palette: static commands, one
//! synthesized command per custom shortcut, and query scoring.

use config::Settings;
use mailkeys_protocol::{OverlayItem, SnoozePreset};
use regex::Regex;

use crate::controls::HostArea;

/// Score for an exact match of the full matchable text.
const SCORE_EXACT: u32 = 100;
/// Score for a prefix match.
const SCORE_PREFIX: u32 = 50;
/// Score for a whole-word match.
const SCORE_WORD: u32 = 40;
/// Score for a plain substring match.
const SCORE_SUBSTRING: u32 = 25;

/// What a command does when executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandAction {
    /// Trigger the host's undo control and arm the restore watcher.
    Undo,
    /// Summarize the open message through the assist service.
    Summarize,
    /// Find and click an unsubscribe link in the open message.
    Unsubscribe,
    /// Apply a snooze preset through the host's own menu.
    Snooze(SnoozePreset),
    /// Move a scheduled message back to the inbox.
    Unsnooze,
    /// Focus the folder sidebar.
    FocusSidebar,
    /// Focus the message list.
    FocusMessageList,
    /// Toggle the inbox-zero celebration.
    ToggleCelebration,
    /// Toggle host chrome visibility.
    ToggleChrome,
    /// Toggle the dark overlay theme.
    ToggleDarkMode,
    /// Click through to a host destination.
    HostGoto(HostArea),
    /// Enter element-picking mode.
    StartPicker,
    /// Execute the custom shortcut with this id.
    Custom(String),
}

/// One palette command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Stable identifier, also part of the matchable text.
    pub id: String,
    /// Display title (state-dependent for toggles).
    pub title: String,
    /// Display subtitle.
    pub subtitle: String,
    /// Trailing shortcut hint; empty when none.
    pub hint: String,
    /// What executing it does.
    pub action: CommandAction,
}

impl Command {
    fn new(id: &str, title: &str, subtitle: &str, hint: &str, action: CommandAction) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            subtitle: subtitle.into(),
            hint: hint.into(),
            action,
        }
    }

    /// Render as an overlay row.
    pub fn item(&self) -> OverlayItem {
        OverlayItem {
            id: self.id.clone(),
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            hint: self.hint.clone(),
        }
    }
}

/// Build the registry from the current settings snapshot. Toggle commands
/// bake their state-dependent titles in, so scoring sees what the user
/// sees.
pub fn build_registry(settings: &Settings) -> Vec<Command> {
    let mut commands = vec![
        Command::new(
            "undo",
            "Undo last action",
            "Trigger the host's built-in Undo for message actions",
            &settings.undo_shortcut.to_string(),
            CommandAction::Undo,
        ),
        Command::new(
            "summarize-email",
            "Summarize current email",
            "Highlight key points from the open message",
            "",
            CommandAction::Summarize,
        ),
        Command::new(
            "unsubscribe",
            "Unsubscribe",
            "Find and click an unsubscribe link in the current email",
            "",
            CommandAction::Unsubscribe,
        ),
        Command::new(
            "snooze-later-today",
            "Snooze – Later today",
            "Move selected message to later today",
            "S, then preset",
            CommandAction::Snooze(SnoozePreset::LaterToday),
        ),
        Command::new(
            "snooze-tomorrow",
            "Snooze – Tomorrow",
            "Move selected message to tomorrow morning",
            "S, then preset",
            CommandAction::Snooze(SnoozePreset::Tomorrow),
        ),
        Command::new(
            "snooze-this-weekend",
            "Snooze – This weekend",
            "Move selected message to this weekend",
            "S, then preset",
            CommandAction::Snooze(SnoozePreset::ThisWeekend),
        ),
        Command::new(
            "snooze-next-week",
            "Snooze – Next week",
            "Move selected message to next week",
            "S, then preset",
            CommandAction::Snooze(SnoozePreset::NextWeek),
        ),
        Command::new(
            "unsnooze",
            "Unsnooze",
            "Move scheduled message back to Inbox",
            "S, then Unsnooze",
            CommandAction::Unsnooze,
        ),
        Command::new(
            "focus-sidebar",
            "Focus sidebar",
            "Jump focus to folder list/navigation",
            "h",
            CommandAction::FocusSidebar,
        ),
        Command::new(
            "focus-message-list",
            "Focus message list",
            "Jump focus back to the message list",
            "l (from sidebar)",
            CommandAction::FocusMessageList,
        ),
        Command::new(
            "toggle-celebration",
            if settings.celebration {
                "Disable celebration"
            } else {
                "Enable celebration"
            },
            if settings.celebration {
                "Disable the celebration overlay when the inbox reaches zero"
            } else {
                "Enable the celebration overlay when the inbox reaches zero"
            },
            "",
            CommandAction::ToggleCelebration,
        ),
        Command::new(
            "toggle-chrome",
            if settings.chrome_hidden {
                "Show host options"
            } else {
                "Hide host options"
            },
            if settings.chrome_hidden {
                "Show the host's options bar and header"
            } else {
                "Hide the host's options bar and header"
            },
            "",
            CommandAction::ToggleChrome,
        ),
        Command::new(
            "toggle-dark-mode",
            if settings.dark_mode {
                "Switch to light mode"
            } else {
                "Switch to dark mode"
            },
            "Switch between dark and light theme for overlays",
            "",
            CommandAction::ToggleDarkMode,
        ),
        Command::new(
            "host-settings",
            "Host settings",
            "Open the host's built-in settings panel",
            "",
            CommandAction::HostGoto(HostArea::Settings),
        ),
        Command::new(
            "calendar",
            "Calendar",
            "Open the calendar",
            "",
            CommandAction::HostGoto(HostArea::Calendar),
        ),
        Command::new(
            "inbox",
            "Inbox",
            "Open Mail/Inbox",
            "",
            CommandAction::HostGoto(HostArea::Inbox),
        ),
        Command::new(
            "bookings",
            "Bookings",
            "Open Bookings",
            "",
            CommandAction::HostGoto(HostArea::Bookings),
        ),
        Command::new(
            "todo",
            "To Do",
            "Open To Do",
            "",
            CommandAction::HostGoto(HostArea::Todo),
        ),
        Command::new(
            "add-custom-shortcut",
            "Add custom shortcut",
            "Select an element on screen to add a keyboard shortcut",
            "",
            CommandAction::StartPicker,
        ),
    ];

    for cs in &settings.custom_shortcuts {
        let title = if cs.description.is_empty() {
            "Custom shortcut"
        } else {
            cs.description.as_str()
        };
        let hint = cs
            .shortcut
            .as_ref()
            .filter(|s| s.is_set())
            .map(|s| s.to_string())
            .unwrap_or_default();
        commands.push(Command::new(
            &cs.id,
            title,
            title,
            &hint,
            CommandAction::Custom(cs.id.clone()),
        ));
    }

    commands
}

/// Score one command against a lower-cased query. Zero excludes it.
pub fn score(cmd: &Command, query: &str) -> u32 {
    let q = query.to_lowercase();
    let q = q.trim();
    if q.is_empty() {
        return 1;
    }
    let haystack = format!(
        "{} {} {}",
        cmd.title.to_lowercase(),
        cmd.subtitle.to_lowercase(),
        cmd.id.to_lowercase()
    );
    if haystack == q {
        return SCORE_EXACT;
    }
    if haystack.starts_with(q) {
        return SCORE_PREFIX;
    }
    let word = format!(r"\b{}\b", regex::escape(q));
    if Regex::new(&word).map(|re| re.is_match(&haystack)).unwrap_or(false) {
        return SCORE_WORD;
    }
    if haystack.contains(q) {
        return SCORE_SUBSTRING;
    }
    0
}

/// Filter the registry: indices of matching commands, best score first,
/// ties in registry order.
pub fn filter(commands: &[Command], query: &str) -> Vec<usize> {
    let mut scored: Vec<(usize, u32)> = commands
        .iter()
        .enumerate()
        .map(|(i, c)| (i, score(c, query)))
        .filter(|(_, s)| *s > 0)
        .collect();
    scored.sort_by_key(|(_, s)| std::cmp::Reverse(*s));
    scored.into_iter().map(|(i, _)| i).collect()
}

#[cfg(test)]
mod tests {
    use config::CustomShortcut;
    use keyspec::Shortcut;

    use super::*;

    #[test]
    fn empty_query_keeps_registry_order() {
        let commands = build_registry(&Settings::default());
        let filtered = filter(&commands, "");
        let expected: Vec<usize> = (0..commands.len()).collect();
        assert_eq!(filtered, expected);
    }

    #[test]
    fn score_tiers_are_strictly_ordered() {
        let cmd = Command::new("unsnooze", "Unsnooze", "Move scheduled message back to Inbox", "", CommandAction::Unsnooze);
        let exact = score(&cmd, "unsnooze move scheduled message back to inbox unsnooze");
        let prefix = score(&cmd, "unsno");
        let word = score(&cmd, "scheduled");
        let substring = score(&cmd, "chedul");
        assert!(exact > prefix && prefix > word && word > substring);
        assert!(substring > 0);
        assert_eq!(score(&cmd, "calendar"), 0);
    }

    #[test]
    fn filter_ranks_best_first_and_excludes_misses() {
        let commands = build_registry(&Settings::default());
        let filtered = filter(&commands, "snooze");
        assert!(!filtered.is_empty());
        // Everything surviving must actually match.
        for idx in &filtered {
            assert!(score(&commands[*idx], "snooze") > 0);
        }
        // "Unsnooze" title starts with neither, but word-boundary matches
        // rank above substring-only hits.
        let first = &commands[filtered[0]];
        assert!(score(first, "snooze") >= SCORE_WORD);
    }

    #[test]
    fn custom_shortcuts_become_commands() {
        let mut settings = Settings::default();
        settings.custom_shortcuts.push(CustomShortcut {
            id: "custom-7".into(),
            selector: "button".into(),
            description: "Mark all read".into(),
            shortcut: Some(Shortcut::new(true, false, false, false, "m")),
            menu_trigger_selector: None,
        });
        let commands = build_registry(&settings);
        let custom = commands.iter().find(|c| c.id == "custom-7").expect("custom");
        assert_eq!(custom.title, "Mark all read");
        assert_eq!(custom.hint, "Ctrl + M");
        assert_eq!(custom.action, CommandAction::Custom("custom-7".into()));
    }

    #[test]
    fn toggle_titles_track_state() {
        let mut settings = Settings::default();
        let commands = build_registry(&settings);
        let toggle = commands
            .iter()
            .find(|c| c.id == "toggle-celebration")
            .expect("toggle");
        assert_eq!(toggle.title, "Enable celebration");
        settings.celebration = true;
        let commands = build_registry(&settings);
        let toggle = commands
            .iter()
            .find(|c| c.id == "toggle-celebration")
            .expect("toggle");
        assert_eq!(toggle.title, "Disable celebration");
    }
}
