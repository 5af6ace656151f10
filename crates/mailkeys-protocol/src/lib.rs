//! Message types the mailkeys engine emits to whatever renders its overlays.
//!
//! The engine owns all overlay *state* (which overlay is open, its items, the
//! active index); the renderer owns the pixels. Every state change crosses
//! this boundary as a [`MsgToUi`].

use serde::{Deserialize, Serialize};

/// Notification urgency kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyKind {
    /// Informational message.
    Info,
    /// Warning message.
    Warn,
    /// Error message.
    Error,
    /// Success message.
    Success,
}

/// The overlay surfaces the engine coordinates. At most one is open at a
/// time; the dispatcher enforces that ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayKind {
    /// The filterable command palette.
    CommandPalette,
    /// The snooze / unsnooze preset menu.
    Snooze,
    /// The element-picking mode for custom shortcuts.
    Picker,
    /// The read-only summary panel.
    Summary,
}

/// Snooze presets, mirroring the host's own snooze menu entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnoozePreset {
    /// Later today.
    LaterToday,
    /// Tomorrow morning.
    Tomorrow,
    /// This weekend.
    ThisWeekend,
    /// Next week.
    NextWeek,
    /// Open the host's own date chooser.
    ChooseDate,
    /// Move a scheduled message back to the inbox.
    Unsnooze,
}

impl SnoozePreset {
    /// The label the host page uses for this entry's own control.
    pub fn host_label(self) -> &'static str {
        match self {
            Self::LaterToday => "Later today",
            Self::Tomorrow => "Tomorrow",
            Self::ThisWeekend => "This weekend",
            Self::NextWeek => "Next week",
            Self::ChooseDate => "Choose a date",
            Self::Unsnooze => "Unsnooze",
        }
    }

    /// The four time-bucket presets that carry a concrete host time label.
    pub fn buckets() -> [Self; 4] {
        [
            Self::LaterToday,
            Self::Tomorrow,
            Self::ThisWeekend,
            Self::NextWeek,
        ]
    }
}

/// Display state of the summary panel's content region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummaryState {
    /// A request is in flight.
    Loading,
    /// Content is available.
    Content,
    /// The request failed; body carries the error text.
    Error,
}

/// One row in a list-style overlay (palette commands, snooze entries).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayItem {
    /// Stable identifier of the row.
    pub id: String,
    /// Primary label.
    pub title: String,
    /// Secondary label; empty when absent.
    pub subtitle: String,
    /// Shortcut hint shown at the row's trailing edge; empty when absent.
    pub hint: String,
}

/// Messages from the engine to the overlay renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MsgToUi {
    /// An overlay opened. `dark` carries the current theme flag so the
    /// renderer can style without a settings round-trip.
    OverlayOpened {
        /// Which overlay.
        kind: OverlayKind,
        /// Dark theme active.
        dark: bool,
    },
    /// An overlay closed; all its DOM must be torn down.
    OverlayClosed {
        /// Which overlay.
        kind: OverlayKind,
    },
    /// Replace an overlay's rows.
    OverlayItems {
        /// Which overlay.
        kind: OverlayKind,
        /// The rows, in display order.
        items: Vec<OverlayItem>,
    },
    /// Move an overlay's selection cursor. `None` clears it.
    OverlaySelection {
        /// Which overlay.
        kind: OverlayKind,
        /// Active row, if any.
        index: Option<usize>,
    },
    /// Update the summary panel's title, body and state class.
    SummaryUpdate {
        /// Panel title.
        title: String,
        /// Panel body text.
        body: String,
        /// Content region state.
        state: SummaryState,
    },
    /// Update the element picker's instruction line.
    PickerInstructions {
        /// Instruction text.
        text: String,
    },
    /// Highlight a picked element by its bounding box, or clear with `None`.
    PickerHighlight {
        /// Highlight rectangle `(x, y, width, height)` in page coordinates,
        /// plus the derived description for the tooltip.
        rect: Option<(f64, f64, f64, f64)>,
        /// Tooltip text for the highlighted element.
        description: String,
    },
    /// Show the celebratory overlay; it self-dismisses after `duration_ms`.
    Celebrate {
        /// How long the renderer should keep the overlay up.
        duration_ms: u64,
    },
    /// The celebratory overlay's dismissal tick.
    CelebrationEnded,
    /// Transient user-facing notification.
    Notify {
        /// Urgency.
        kind: NotifyKind,
        /// Short title.
        title: String,
        /// Body text.
        text: String,
    },
    /// The host chrome visibility toggle changed.
    ChromeHidden(bool),
    /// The dark mode flag changed.
    DarkMode(bool),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_labels_match_host_menu() {
        assert_eq!(SnoozePreset::LaterToday.host_label(), "Later today");
        assert_eq!(SnoozePreset::ChooseDate.host_label(), "Choose a date");
        assert_eq!(SnoozePreset::buckets().len(), 4);
    }

    #[test]
    fn messages_roundtrip_through_json() {
        let msg = MsgToUi::OverlayItems {
            kind: OverlayKind::Snooze,
            items: vec![OverlayItem {
                id: "laterToday".into(),
                title: "Later today".into(),
                subtitle: "5:00 AM".into(),
                hint: String::new(),
            }],
        };
        let json = serde_json::to_string(&msg).expect("serialize");
        let back: MsgToUi = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(msg, back);
    }
}
