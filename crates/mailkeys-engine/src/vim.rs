//! Vim-style navigation: j/k vertical movement, h/l context switching, and
//! the shift-arrow relay that hands range selection to the host's own
//! multi-select logic.

use keyspec::{KeyInput, KeyTarget};
use mailkeys_page::Page;

use crate::list::{ListView, VDir};

/// Which logical list j/k currently target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavContext {
    /// The message list (default).
    #[default]
    Auto,
    /// The folder sidebar, pinned by `h`.
    Sidebar,
}

/// Move vertically within the current context.
pub(crate) fn move_vertical(page: &dyn Page, ctx: NavContext, dir: VDir) {
    match ctx {
        NavContext::Sidebar => ListView::sidebar(page).move_by(dir),
        NavContext::Auto => ListView::messages(page).move_by(dir),
    }
}

/// Focus the sidebar's selected (or first) item and pin sidebar context.
pub(crate) fn focus_sidebar(page: &dyn Page, ctx: &mut NavContext) {
    let view = ListView::sidebar(page);
    let items = view.items();
    if items.is_empty() {
        return;
    }
    let index = view.current_index(&items).unwrap_or(0);
    view.focus_and_reveal(items[index]);
    *ctx = NavContext::Sidebar;
}

/// Return focus to the message list's selected (or first) row and reset the
/// context. The context resets even when the list is empty.
pub(crate) fn focus_message_list(page: &dyn Page, ctx: &mut NavContext) {
    *ctx = NavContext::Auto;
    let view = ListView::messages(page);
    let items = view.items();
    if items.is_empty() {
        return;
    }
    let index = view.current_index(&items).unwrap_or(0);
    view.focus_and_reveal(items[index]);
}

/// Synthesize Shift+ArrowDown/Up on the focused element so the host's own
/// range-selection logic runs. The event is marked untrusted so the
/// dispatcher drops it on re-entry.
pub(crate) fn send_shift_arrow(page: &dyn Page, dir: VDir) {
    let key = match dir {
        VDir::Down => "ArrowDown",
        VDir::Up => "ArrowUp",
    };
    page.relay_key(KeyInput {
        key: key.into(),
        ctrl: false,
        alt: false,
        shift: true,
        meta: false,
        trusted: false,
        target: KeyTarget::Page,
    });
}
