//! Command palette state: a filterable command list with a clamped
//! selection cursor.
//!
//! While open, the palette owns keyboard input exclusively; the dispatcher
//! enforces that contract and routes arrows/Enter/Escape here.

use mailkeys_protocol::OverlayItem;

use crate::{
    commands::{self, Command},
    list::VDir,
};

/// Palette overlay state. Created empty; populated on open; torn down
/// completely on close.
#[derive(Default)]
pub(crate) struct Palette {
    open: bool,
    query: String,
    commands: Vec<Command>,
    filtered: Vec<usize>,
    active: Option<usize>,
}

impl Palette {
    /// Whether the palette is open.
    pub(crate) fn is_open(&self) -> bool {
        self.open
    }

    /// Open with a freshly built registry and an empty query.
    pub(crate) fn open_with(&mut self, commands: Vec<Command>) {
        self.open = true;
        self.query.clear();
        self.commands = commands;
        self.refilter();
    }

    /// Close and release everything.
    pub(crate) fn close(&mut self) {
        *self = Self::default();
    }

    /// Replace the registry in place (settings changed while open).
    pub(crate) fn replace_commands(&mut self, commands: Vec<Command>) {
        self.commands = commands;
        self.refilter();
    }

    /// Update the query and refilter.
    pub(crate) fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
        self.refilter();
    }

    /// Move the active index, clamping at both ends.
    pub(crate) fn move_active(&mut self, dir: VDir) -> Option<usize> {
        if self.filtered.is_empty() {
            self.active = None;
            return None;
        }
        let last = self.filtered.len() - 1;
        let next = match (self.active, dir) {
            (None, VDir::Down) => 0,
            (None, VDir::Up) => last,
            (Some(i), VDir::Down) => (i + 1).min(last),
            (Some(i), VDir::Up) => i.saturating_sub(1),
        };
        self.active = Some(next);
        self.active
    }

    /// The command to execute on Enter: the active one, or the first
    /// filtered one when nothing was explicitly selected.
    pub(crate) fn enter(&self) -> Option<&Command> {
        let slot = self.active.unwrap_or(0);
        let idx = *self.filtered.get(slot)?;
        self.commands.get(idx)
    }

    /// The currently active index (for selection messages).
    pub(crate) fn active(&self) -> Option<usize> {
        self.active
    }

    /// Render the filtered commands as overlay rows.
    pub(crate) fn items(&self) -> Vec<OverlayItem> {
        self.filtered
            .iter()
            .filter_map(|i| self.commands.get(*i))
            .map(Command::item)
            .collect()
    }

    fn refilter(&mut self) {
        self.filtered = commands::filter(&self.commands, &self.query);
        self.active = if self.filtered.is_empty() { None } else { Some(0) };
    }
}

#[cfg(test)]
mod tests {
    use config::Settings;

    use super::*;
    use crate::commands::build_registry;

    fn open_palette() -> Palette {
        let mut p = Palette::default();
        p.open_with(build_registry(&Settings::default()));
        p
    }

    #[test]
    fn open_selects_first_item() {
        let p = open_palette();
        assert!(p.is_open());
        assert_eq!(p.active(), Some(0));
        assert!(!p.items().is_empty());
    }

    #[test]
    fn movement_clamps_no_wrap() {
        let mut p = open_palette();
        p.set_query("zzzz-no-match");
        assert_eq!(p.move_active(VDir::Down), None);

        let mut p = open_palette();
        p.move_active(VDir::Up);
        assert_eq!(p.active(), Some(0), "no wrap from the top");
        let count = p.items().len();
        for _ in 0..count + 5 {
            p.move_active(VDir::Down);
        }
        assert_eq!(p.active(), Some(count - 1), "no wrap at the bottom");
    }

    #[test]
    fn enter_without_movement_takes_best_match() {
        let mut p = open_palette();
        p.set_query("snooze");
        let cmd = p.enter().expect("match");
        let items = p.items();
        assert_eq!(cmd.id, items[0].id);
    }

    #[test]
    fn close_releases_state() {
        let mut p = open_palette();
        p.set_query("inbox");
        p.close();
        assert!(!p.is_open());
        assert!(p.items().is_empty());
        assert_eq!(p.active(), None);
    }

    #[test]
    fn filtering_excludes_nonmatches() {
        let mut p = open_palette();
        let all = p.items().len();
        p.set_query("calendar");
        assert!(p.items().len() < all);
        assert!(p.items().iter().any(|i| i.id == "calendar"));
    }
}
