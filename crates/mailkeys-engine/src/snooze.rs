//! The snooze overlay: a keyboard-accessible skin over the host's own
//! snooze menu, not a replacement. Activating a preset drives the host's
//! button-click sequence; the overlay only owns its cursor and labels.

use mailkeys_page::{NodeId, Page};
use mailkeys_protocol::{OverlayItem, SnoozePreset};

use crate::list::VDir;

/// One overlay entry: a preset plus the host's concrete time label once
/// hydration finds it.
#[derive(Debug, Clone)]
pub(crate) struct SnoozeEntry {
    /// The preset this entry activates.
    pub preset: SnoozePreset,
    /// Secondary label ("5:00 AM"); empty until hydrated.
    pub secondary: String,
}

/// Which variant the overlay shows, decided by the page URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SnoozeVariant {
    /// Time-bucket presets plus the date chooser.
    Snooze,
    /// The single unsnooze action (scheduled view).
    Unsnooze,
}

/// Snooze overlay state.
#[derive(Default)]
pub(crate) struct SnoozeOverlay {
    open: bool,
    entries: Vec<SnoozeEntry>,
    active: usize,
}

impl SnoozeOverlay {
    /// Whether the overlay is open.
    pub(crate) fn is_open(&self) -> bool {
        self.open
    }

    /// Open with the entries for `variant`; cursor starts at the top.
    pub(crate) fn open_variant(&mut self, variant: SnoozeVariant) {
        self.open = true;
        self.active = 0;
        self.entries = match variant {
            SnoozeVariant::Unsnooze => vec![SnoozeEntry {
                preset: SnoozePreset::Unsnooze,
                secondary: "Move back to Inbox".into(),
            }],
            SnoozeVariant::Snooze => {
                let mut entries: Vec<SnoozeEntry> = SnoozePreset::buckets()
                    .into_iter()
                    .map(|preset| SnoozeEntry {
                        preset,
                        secondary: String::new(),
                    })
                    .collect();
                entries.push(SnoozeEntry {
                    preset: SnoozePreset::ChooseDate,
                    secondary: String::new(),
                });
                entries
            }
        };
    }

    /// Close and release everything.
    pub(crate) fn close(&mut self) {
        *self = Self::default();
    }

    /// Move the cursor with wraparound in both directions.
    pub(crate) fn move_cursor(&mut self, dir: VDir) -> usize {
        let total = self.entries.len();
        if total == 0 {
            return 0;
        }
        self.active = match dir {
            VDir::Down => (self.active + 1) % total,
            VDir::Up => (self.active + total - 1) % total,
        };
        self.active
    }

    /// The cursor position.
    pub(crate) fn active(&self) -> usize {
        self.active
    }

    /// The preset under the cursor.
    pub(crate) fn active_preset(&self) -> Option<SnoozePreset> {
        self.entries.get(self.active).map(|e| e.preset)
    }

    /// Fill in secondary labels found during hydration. Labels that are
    /// already set keep their value. Returns true when anything changed.
    pub(crate) fn hydrate(&mut self, times: &[(SnoozePreset, String)]) -> bool {
        let mut updated = false;
        for (preset, time) in times {
            if time.is_empty() {
                continue;
            }
            if let Some(entry) = self.entries.iter_mut().find(|e| e.preset == *preset)
                && entry.secondary.is_empty()
            {
                entry.secondary = time.clone();
                updated = true;
            }
        }
        updated
    }

    /// Render as overlay rows.
    pub(crate) fn items(&self) -> Vec<OverlayItem> {
        self.entries
            .iter()
            .map(|e| OverlayItem {
                id: format!("snooze:{}", e.preset.host_label()),
                title: e.preset.host_label().to_string(),
                subtitle: e.secondary.clone(),
                hint: String::new(),
            })
            .collect()
    }
}

/// Read the concrete date/time strings the host shows in its own snooze
/// menu, so the overlay can mirror them. Missing entries are simply
/// absent; the overlay then keeps its generic labels.
pub(crate) fn native_preset_times(page: &dyn Page) -> Vec<(SnoozePreset, String)> {
    SnoozePreset::buckets()
        .into_iter()
        .filter_map(|preset| {
            let btn = find_preset_button(page, preset)?;
            let text = secondary_text(page, btn)?;
            Some((preset, text))
        })
        .collect()
}

/// Find the host's own control for a preset: labeled lookups first, then
/// an exact-text scan.
pub(crate) fn find_preset_button(page: &dyn Page, preset: SnoozePreset) -> Option<NodeId> {
    let label = preset.host_label();
    let sel = format!(
        r#"button[name="{label}"], button[aria-label^="{label}"], button[aria-label="{label}"]"#
    );
    if let Some(btn) = page.query(&sel) {
        return Some(btn);
    }
    let want = label.to_lowercase();
    page.query_all("button")
        .into_iter()
        .find(|b| page.text(*b).trim().to_lowercase() == want)
}

/// Click the host's control for a preset. Returns false on a miss.
pub(crate) fn click_preset(page: &dyn Page, preset: SnoozePreset) -> bool {
    match find_preset_button(page, preset) {
        Some(btn) => {
            page.click(btn);
            true
        }
        None => false,
    }
}

/// The secondary text span inside a host preset button. The host's class
/// names shift between builds, so the match is kept loose.
fn secondary_text(page: &dyn Page, btn: NodeId) -> Option<String> {
    let span = page
        .query_within(btn, ".secondaryTextMenu")
        .into_iter()
        .next()
        .or_else(|| {
            page.query_within(btn, r#"span[class*="secondaryText"]"#)
                .into_iter()
                .next()
        })?;
    let text = page.text(span);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use mailkeys_page::FakePage;

    use super::*;

    #[test]
    fn snooze_variant_lists_buckets_then_chooser() {
        let mut overlay = SnoozeOverlay::default();
        overlay.open_variant(SnoozeVariant::Snooze);
        let items = overlay.items();
        assert_eq!(items.len(), 5);
        assert_eq!(items[0].title, "Later today");
        assert_eq!(items[4].title, "Choose a date");
    }

    #[test]
    fn unsnooze_variant_is_single_action() {
        let mut overlay = SnoozeOverlay::default();
        overlay.open_variant(SnoozeVariant::Unsnooze);
        assert_eq!(overlay.items().len(), 1);
        assert_eq!(overlay.active_preset(), Some(SnoozePreset::Unsnooze));
    }

    #[test]
    fn cursor_wraps_both_directions() {
        let mut overlay = SnoozeOverlay::default();
        overlay.open_variant(SnoozeVariant::Snooze);
        assert_eq!(overlay.active(), 0);
        overlay.move_cursor(VDir::Up);
        assert_eq!(overlay.active(), 4, "wraps from first to last");
        overlay.move_cursor(VDir::Down);
        assert_eq!(overlay.active(), 0, "wraps from last to first");
    }

    #[test]
    fn hydrate_fills_only_empty_labels() {
        let mut overlay = SnoozeOverlay::default();
        overlay.open_variant(SnoozeVariant::Snooze);
        let changed = overlay.hydrate(&[
            (SnoozePreset::LaterToday, "5:00 AM".into()),
            (SnoozePreset::Tomorrow, String::new()),
        ]);
        assert!(changed);
        assert_eq!(overlay.items()[0].subtitle, "5:00 AM");
        assert_eq!(overlay.items()[1].subtitle, "");
        // A second hydration with a different value does not overwrite.
        let changed = overlay.hydrate(&[(SnoozePreset::LaterToday, "6:00 AM".into())]);
        assert!(!changed);
        assert_eq!(overlay.items()[0].subtitle, "5:00 AM");
    }

    #[test]
    fn native_times_read_secondary_spans() {
        let page = FakePage::new();
        page.with_dom(|dom| {
            let body = dom.body();
            let menu = dom.append_with(body, "div", &[("role", "menu")], "");
            let btn = dom.append_with(menu, "button", &[("name", "Later today")], "");
            let span = dom.append_with(
                btn,
                "span",
                &[("class", "secondaryTextMenu secondaryText-356")],
                "",
            );
            dom.set_text(span, " 5:00 AM ");
            dom.append_with(menu, "button", &[("name", "Tomorrow")], "");
        });
        let times = native_preset_times(&page);
        assert_eq!(times, vec![(SnoozePreset::LaterToday, "5:00 AM".to_string())]);
    }

    #[test]
    fn preset_click_falls_back_to_text_scan() {
        let page = FakePage::new();
        let btn = page.with_dom(|dom| {
            let body = dom.body();
            let btn = dom.append(body, "button");
            dom.set_text(btn, "Next week");
            btn
        });
        assert!(click_preset(&page, SnoozePreset::NextWeek));
        assert_eq!(page.clicks(), vec![btn]);
        assert!(!click_preset(&page, SnoozePreset::LaterToday));
    }
}
