//! Mailkeys Engine
//!
//! The engine coordinates keyboard-driven navigation and quick actions over
//! an uncontrolled webmail page:
//! - routes every trusted keydown through a strict ownership priority chain
//! - owns the overlay state machines (command palette, snooze menu, element
//!   picker, summary panel) and enforces that at most one is open
//! - drives vim-style list/sidebar movement and the undo/restore flow
//! - watches page mutations for the inbox-zero celebration and post-undo
//!   refocus
//!
//! It exposes a small, documented API: [`Engine`] is the primary type you
//! construct and drive; [`Assist`] and the `config`/`mailkeys-page` seams
//! are injected at construction time so tests can substitute fakes. All
//! rendering happens on the far side of an [`MsgToUi`] channel.

use std::sync::Arc;

use config::{keys, CustomShortcut, Settings, SettingsCache, ValueMap};
use keyspec::{KeyInput, KeyTarget};
use mailkeys_page::{NodeId, Page};
use mailkeys_protocol::{MsgToUi, NotifyKind, OverlayKind, SnoozePreset};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast::error::RecvError, mpsc::UnboundedSender};
use tracing::{debug, trace};

mod assist;
mod commands;
mod controls;
mod dispatch;
mod error;
mod list;
mod locator;
mod notify;
mod palette;
mod picker;
mod poll;
mod snooze;
mod summary;
pub mod test_support;
mod vim;
mod watch;

pub use assist::{Assist, AssistError, ElementInfo, NoAssist};
pub use commands::{build_registry, Command, CommandAction};
pub use controls::HostArea;
pub use dispatch::KeyDisposition;
pub use error::{Error, Result};
pub use list::VDir;
pub use notify::UiSender;
pub use poll::{PollSpec, Poller};
pub use vim::NavContext;

use dispatch::{KeyAction, OverlayStates};
use palette::Palette;
use picker::Picker;
use snooze::{SnoozeOverlay, SnoozeVariant};
use summary::{SummaryContent, SummaryPanel};
use watch::CelebrationWatcher;

/// Poller id: the open-then-close priming toggle of the host snooze menu.
const POLL_SNOOZE_PRIME: &str = "snooze.prime";
/// Poller id: hydration of preset time labels from the host menu.
const POLL_SNOOZE_HYDRATE: &str = "snooze.hydrate";
/// Poller id: clicking a preset once the host menu materializes.
const POLL_SNOOZE_APPLY: &str = "snooze.apply";
/// Poller id: waiting for a menu after a deferred picker click.
const POLL_PICKER_MENU: &str = "picker.menu";
/// Poller id: waiting for a menu-gated custom shortcut target.
const POLL_CUSTOM_APPLY: &str = "custom.apply";

/// The engine. Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct Engine {
    /// The host page surface.
    page: Arc<dyn Page>,
    /// The process-wide settings snapshot.
    settings: Arc<SettingsCache>,
    /// Summaries and title formatting.
    assist: Arc<dyn Assist>,
    /// Channel to the overlay renderer.
    ui: UiSender,
    /// Which list j/k currently target.
    nav: Arc<Mutex<NavContext>>,
    /// Command palette state.
    palette: Arc<Mutex<Palette>>,
    /// Snooze overlay state.
    snooze: Arc<Mutex<SnoozeOverlay>>,
    /// Element picker state.
    picker: Arc<Mutex<Picker>>,
    /// Summary panel state.
    summary: Arc<Mutex<SummaryPanel>>,
    /// Keyed polling loops.
    poller: Poller,
    /// Inbox-zero celebration watcher.
    celebration: Arc<CelebrationWatcher>,
}

impl Engine {
    /// Create a new engine over the injected collaborators.
    pub fn new(
        page: Arc<dyn Page>,
        settings: Arc<SettingsCache>,
        assist: Arc<dyn Assist>,
        ui_tx: UnboundedSender<MsgToUi>,
    ) -> Self {
        let ui = UiSender::new(ui_tx);
        let celebration = Arc::new(CelebrationWatcher::new(page.clone(), ui.clone()));
        Self {
            page,
            settings,
            assist,
            ui,
            nav: Arc::new(Mutex::new(NavContext::Auto)),
            palette: Arc::new(Mutex::new(Palette::default())),
            snooze: Arc::new(Mutex::new(SnoozeOverlay::default())),
            picker: Arc::new(Mutex::new(Picker::default())),
            summary: Arc::new(Mutex::new(SummaryPanel::default())),
            poller: Poller::new(),
            celebration,
        }
    }

    /// Load settings, start the settings watch pump, and bring up the
    /// celebration watcher when enabled.
    pub async fn start(&self) {
        self.settings.load().await;
        let _watch = self.settings.spawn_watch();
        if self.settings.snapshot().celebration {
            self.celebration.start();
        }
        let engine = self.clone();
        let mut rx = self.settings.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(snapshot) => {
                        let running = engine.celebration.is_running();
                        if snapshot.celebration && !running {
                            engine.celebration.start();
                        } else if !snapshot.celebration && running {
                            engine.celebration.stop();
                        }
                        engine.refresh_palette(&snapshot);
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    /// Cancel outstanding polls and watchers.
    pub fn shutdown(&self) {
        self.poller.clear();
        self.celebration.stop();
    }

    /// Handle one keydown. Every failure inside is caught, logged at debug
    /// level, and swallowed so host page interaction is never disrupted.
    pub async fn handle_key(&self, input: &KeyInput) -> KeyDisposition {
        let snapshot = self.settings.snapshot();
        let overlays = OverlayStates {
            picker: self.picker.lock().is_active(),
            palette: self.palette.lock().is_open(),
            summary: self.summary.lock().is_open(),
            snooze: self.snooze.lock().is_open(),
        };
        let routed = dispatch::route(input, &snapshot, overlays);
        if let Some(action) = routed.action.clone() {
            trace!(?action, key = %input.key, "keydown action");
            if let Err(e) = self.execute(action, &snapshot).await {
                debug!("keydown handling failed: {}", e);
            }
        }
        routed.disposition
    }

    /// Execute a command (also used by the renderer when a palette row is
    /// clicked).
    pub async fn run_command(&self, action: CommandAction) -> Result<()> {
        match action {
            CommandAction::Undo => {
                self.trigger_undo();
                Ok(())
            }
            CommandAction::Summarize => self.summarize(),
            CommandAction::Unsubscribe => {
                match summary::find_unsubscribe_link(self.page.as_ref()) {
                    Some(link) => self.page.click(link),
                    None => debug!("no unsubscribe link found in current email"),
                }
                Ok(())
            }
            CommandAction::Snooze(preset) => {
                self.apply_snooze_preset(preset);
                Ok(())
            }
            CommandAction::Unsnooze => {
                controls::click_unsnooze(self.page.as_ref());
                Ok(())
            }
            CommandAction::FocusSidebar => {
                vim::focus_sidebar(self.page.as_ref(), &mut self.nav.lock());
                Ok(())
            }
            CommandAction::FocusMessageList => {
                vim::focus_message_list(self.page.as_ref(), &mut self.nav.lock());
                Ok(())
            }
            CommandAction::ToggleCelebration => {
                let next = !self.settings.snapshot().celebration;
                if self.toggle_setting(keys::CELEBRATION, next).await? {
                    if next {
                        self.celebration.start();
                    } else {
                        self.celebration.stop();
                    }
                    self.refresh_palette(&self.settings.snapshot());
                }
                Ok(())
            }
            CommandAction::ToggleChrome => {
                let next = !self.settings.snapshot().chrome_hidden;
                if self.toggle_setting(keys::CHROME_HIDDEN, next).await? {
                    self.ui.send(MsgToUi::ChromeHidden(next))?;
                    self.refresh_palette(&self.settings.snapshot());
                }
                Ok(())
            }
            CommandAction::ToggleDarkMode => {
                let next = !self.settings.snapshot().dark_mode;
                if self.toggle_setting(keys::DARK_MODE, next).await? {
                    self.ui.send(MsgToUi::DarkMode(next))?;
                    self.refresh_palette(&self.settings.snapshot());
                }
                Ok(())
            }
            CommandAction::HostGoto(area) => {
                controls::goto(self.page.as_ref(), area);
                Ok(())
            }
            CommandAction::StartPicker => self.start_picker(),
            CommandAction::Custom(id) => {
                let snapshot = self.settings.snapshot();
                if let Some(cs) = snapshot.custom_shortcuts.iter().find(|c| c.id == id) {
                    self.run_custom(cs);
                }
                Ok(())
            }
        }
    }

    /// Whether the command palette is open.
    pub fn palette_open(&self) -> bool {
        self.palette.lock().is_open()
    }

    /// Whether the snooze overlay is open.
    pub fn snooze_open(&self) -> bool {
        self.snooze.lock().is_open()
    }

    /// Whether element picking is active.
    pub fn picker_active(&self) -> bool {
        self.picker.lock().is_active()
    }

    /// Whether the summary panel is open.
    pub fn summary_open(&self) -> bool {
        self.summary.lock().is_open()
    }

    /// The current vim navigation context.
    pub fn nav_context(&self) -> NavContext {
        *self.nav.lock()
    }

    /// The renderer reports palette input changes here.
    pub fn palette_input(&self, query: &str) -> Result<()> {
        let (items, active) = {
            let mut palette = self.palette.lock();
            if !palette.is_open() {
                return Ok(());
            }
            palette.set_query(query);
            (palette.items(), palette.active())
        };
        self.ui.send(MsgToUi::OverlayItems {
            kind: OverlayKind::CommandPalette,
            items,
        })?;
        self.ui.send(MsgToUi::OverlaySelection {
            kind: OverlayKind::CommandPalette,
            index: active,
        })
    }

    /// The renderer reports pointer movement while picking.
    pub fn picker_hover(&self, node: NodeId) -> Result<()> {
        if !self.picker.lock().is_active() {
            return Ok(());
        }
        if self.picker.lock().in_submenu()
            && let Some(menu) = picker::find_open_menu(self.page.as_ref())
            && !self.page.contains(menu, node)
        {
            return self.clear_picker_highlight();
        }
        match picker::find_actionable(self.page.as_ref(), node) {
            Some(el) => {
                self.picker.lock().set_highlight(Some(el));
                let rect = self.page.rect(el);
                self.ui.send(MsgToUi::PickerHighlight {
                    rect: Some((rect.x, rect.y, rect.width, rect.height)),
                    description: locator::describe(self.page.as_ref(), el),
                })
            }
            None => self.clear_picker_highlight(),
        }
    }

    /// The renderer reports clicks while picking. The return value says
    /// whether the click was captured or must proceed natively.
    pub fn picker_click(&self, node: NodeId) -> KeyDisposition {
        if !self.picker.lock().is_active() {
            return KeyDisposition::Pass;
        }
        let highlighted = self.picker.lock().highlighted();
        let Some(el) = picker::find_actionable(self.page.as_ref(), node).or(highlighted) else {
            return KeyDisposition::Pass;
        };
        let in_submenu = self.picker.lock().in_submenu();
        if !in_submenu && picker::might_open_menu(self.page.as_ref(), el) {
            // Let the click through so the host opens its menu, then poll
            // for it; if none appears, treat this as a plain selection.
            let waiter = self.clone();
            let fallback = self.clone();
            self.poller.start_or(
                POLL_PICKER_MENU,
                PollSpec::new(30, 50).after(100),
                move || {
                    if picker::find_open_menu(waiter.page.as_ref()).is_none() {
                        return false;
                    }
                    waiter.picker.lock().enter_submenu(el);
                    let _ = waiter.ui.send(MsgToUi::PickerInstructions {
                        text: picker::SUBMENU_INSTRUCTIONS.into(),
                    });
                    let _ = waiter.clear_picker_highlight();
                    true
                },
                move || {
                    fallback.capture_element(el);
                },
            );
            return KeyDisposition::Pass;
        }
        self.capture_element(el);
        KeyDisposition::Consume
    }

    // ---- dispatch execution ----

    async fn execute(&self, action: KeyAction, snapshot: &Arc<Settings>) -> Result<()> {
        match action {
            KeyAction::PickerBack => self.picker_back(),
            KeyAction::PaletteEscape => self.close_palette(),
            KeyAction::PaletteMove(dir) => {
                let active = self.palette.lock().move_active(dir);
                self.ui.send(MsgToUi::OverlaySelection {
                    kind: OverlayKind::CommandPalette,
                    index: active,
                })
            }
            KeyAction::PaletteEnter => {
                let command = self.palette.lock().enter().cloned();
                self.close_palette()?;
                match command {
                    Some(cmd) => self.run_command(cmd.action).await,
                    None => Ok(()),
                }
            }
            KeyAction::SummaryClose => self.close_summary(),
            KeyAction::ResetNavContext => {
                *self.nav.lock() = NavContext::Auto;
                Ok(())
            }
            KeyAction::RunCustom(index) => {
                if let Some(cs) = snapshot.custom_shortcuts.get(index) {
                    self.run_custom(cs);
                }
                Ok(())
            }
            KeyAction::RelayMultiSelect(dir) => {
                vim::send_shift_arrow(self.page.as_ref(), dir);
                Ok(())
            }
            KeyAction::SnoozeMove(dir) => {
                let active = self.snooze.lock().move_cursor(dir);
                self.ui.send(MsgToUi::OverlaySelection {
                    kind: OverlayKind::Snooze,
                    index: Some(active),
                })
            }
            KeyAction::SnoozeActivate => self.snooze_activate(),
            KeyAction::SnoozeClose => self.close_snooze(),
            KeyAction::SnoozeToggle => self.toggle_snooze(snapshot),
            KeyAction::VimMove(dir) => {
                let ctx = *self.nav.lock();
                vim::move_vertical(self.page.as_ref(), ctx, dir);
                Ok(())
            }
            KeyAction::VimSidebar => {
                vim::focus_sidebar(self.page.as_ref(), &mut self.nav.lock());
                Ok(())
            }
            KeyAction::VimRight => {
                let mut nav = self.nav.lock();
                if *nav == NavContext::Sidebar {
                    vim::focus_message_list(self.page.as_ref(), &mut nav);
                } else {
                    vim::focus_sidebar(self.page.as_ref(), &mut nav);
                }
                Ok(())
            }
            KeyAction::PaletteToggle => {
                if self.palette.lock().is_open() {
                    self.close_palette()
                } else {
                    self.open_palette(snapshot)
                }
            }
            KeyAction::Undo => {
                self.trigger_undo();
                Ok(())
            }
        }
    }

    // ---- palette ----

    fn open_palette(&self, snapshot: &Settings) -> Result<()> {
        self.close_overlays_except(None)?;
        let (items, active) = {
            let mut palette = self.palette.lock();
            palette.open_with(commands::build_registry(snapshot));
            (palette.items(), palette.active())
        };
        self.ui.send(MsgToUi::OverlayOpened {
            kind: OverlayKind::CommandPalette,
            dark: snapshot.dark_mode,
        })?;
        self.ui.send(MsgToUi::OverlayItems {
            kind: OverlayKind::CommandPalette,
            items,
        })?;
        self.ui.send(MsgToUi::OverlaySelection {
            kind: OverlayKind::CommandPalette,
            index: active,
        })
    }

    fn close_palette(&self) -> Result<()> {
        let was_open = {
            let mut palette = self.palette.lock();
            let was_open = palette.is_open();
            palette.close();
            was_open
        };
        if was_open {
            self.ui.send(MsgToUi::OverlayClosed {
                kind: OverlayKind::CommandPalette,
            })?;
        }
        Ok(())
    }

    /// Rebuild the palette registry in place after a settings change.
    fn refresh_palette(&self, snapshot: &Settings) {
        let refreshed = {
            let mut palette = self.palette.lock();
            if !palette.is_open() {
                None
            } else {
                palette.replace_commands(commands::build_registry(snapshot));
                Some((palette.items(), palette.active()))
            }
        };
        if let Some((items, active)) = refreshed {
            let _ = self.ui.send(MsgToUi::OverlayItems {
                kind: OverlayKind::CommandPalette,
                items,
            });
            let _ = self.ui.send(MsgToUi::OverlaySelection {
                kind: OverlayKind::CommandPalette,
                index: active,
            });
        }
    }

    // ---- snooze ----

    fn toggle_snooze(&self, snapshot: &Settings) -> Result<()> {
        if self.snooze.lock().is_open() {
            return self.close_snooze();
        }
        if !list::has_selection(self.page.as_ref()) {
            return Ok(());
        }
        self.open_snooze(snapshot)
    }

    fn open_snooze(&self, snapshot: &Settings) -> Result<()> {
        self.close_overlays_except(None)?;
        let variant = if controls::is_scheduled_view(&self.page.url()) {
            SnoozeVariant::Unsnooze
        } else {
            SnoozeVariant::Snooze
        };
        // Toggle the host's own snooze menu open and closed once so its
        // lazy DOM (unsnooze wiring, concrete preset times) materializes.
        self.prime_snooze_menu();
        let items = {
            let mut overlay = self.snooze.lock();
            overlay.open_variant(variant);
            overlay.items()
        };
        self.ui.send(MsgToUi::OverlayOpened {
            kind: OverlayKind::Snooze,
            dark: snapshot.dark_mode,
        })?;
        self.ui.send(MsgToUi::OverlayItems {
            kind: OverlayKind::Snooze,
            items,
        })?;
        self.ui.send(MsgToUi::OverlaySelection {
            kind: OverlayKind::Snooze,
            index: Some(0),
        })?;
        if variant == SnoozeVariant::Snooze {
            self.spawn_snooze_hydration();
        }
        Ok(())
    }

    fn close_snooze(&self) -> Result<()> {
        let was_open = {
            let mut overlay = self.snooze.lock();
            let was_open = overlay.is_open();
            overlay.close();
            was_open
        };
        if was_open {
            self.poller.stop(POLL_SNOOZE_HYDRATE);
            self.ui.send(MsgToUi::OverlayClosed {
                kind: OverlayKind::Snooze,
            })?;
        }
        Ok(())
    }

    fn snooze_activate(&self) -> Result<()> {
        let preset = self.snooze.lock().active_preset();
        self.close_snooze()?;
        match preset {
            Some(SnoozePreset::Unsnooze) => {
                controls::click_unsnooze(self.page.as_ref());
            }
            Some(preset) => self.apply_snooze_preset(preset),
            None => {}
        }
        Ok(())
    }

    /// Apply a preset by driving the host's own menu: open it, then poll
    /// until the preset's control exists and click it.
    pub fn apply_snooze_preset(&self, preset: SnoozePreset) {
        let Some(button) = controls::find_snooze_button(self.page.as_ref()) else {
            debug!("no snooze control found on this page");
            return;
        };
        self.page.click(button);
        let page = self.page.clone();
        self.poller.start(
            POLL_SNOOZE_APPLY,
            PollSpec::new(8, 80).after(80),
            move || snooze::click_preset(page.as_ref(), preset),
        );
    }

    fn prime_snooze_menu(&self) {
        let Some(button) = controls::find_snooze_button(self.page.as_ref()) else {
            return;
        };
        self.page.click(button);
        // Close it again shortly after so the host menu does not stay
        // open underneath the overlay.
        let page = self.page.clone();
        self.poller.start(
            POLL_SNOOZE_PRIME,
            PollSpec::new(1, 0).after(120),
            move || {
                if let Some(btn) = controls::find_snooze_button(page.as_ref()) {
                    page.click(btn);
                }
                true
            },
        );
    }

    fn spawn_snooze_hydration(&self) {
        let engine = self.clone();
        self.poller.start(
            POLL_SNOOZE_HYDRATE,
            PollSpec::new(8, 80),
            move || {
                let times = snooze::native_preset_times(engine.page.as_ref());
                if times.is_empty() {
                    return false;
                }
                let items = {
                    let mut overlay = engine.snooze.lock();
                    if !overlay.is_open() {
                        return true;
                    }
                    if !overlay.hydrate(&times) {
                        return false;
                    }
                    overlay.items()
                };
                let _ = engine.ui.send(MsgToUi::OverlayItems {
                    kind: OverlayKind::Snooze,
                    items,
                });
                true
            },
        );
    }

    // ---- summary ----

    fn summarize(&self) -> Result<()> {
        let body = summary::email_body_text(self.page.as_ref());
        if body.is_empty() {
            return self.show_summary(SummaryContent::error(
                "Email summary",
                "Could not find any visible email content to summarize.",
            ));
        }
        self.show_summary(SummaryContent::loading(
            "Summarizing…",
            "Summarizing the current email. This usually takes a moment.",
        ))?;
        let engine = self.clone();
        tokio::spawn(async move {
            let content = match engine.assist.summarize(&body).await {
                Ok(s) if !s.trim().is_empty() => SummaryContent::content("Email summary", &s),
                Ok(_) => SummaryContent::error(
                    "Summary unavailable",
                    "The assistant returned an empty summary for this email.",
                ),
                Err(e) => SummaryContent::error("Summary unavailable", &e.to_string()),
            };
            let _ = engine.show_summary(content);
        });
        Ok(())
    }

    fn show_summary(&self, content: SummaryContent) -> Result<()> {
        let first = {
            let mut panel = self.summary.lock();
            let first = !panel.is_open();
            panel.open();
            first
        };
        if first {
            self.close_overlays_except(Some(OverlayKind::Summary))?;
            self.ui.send(MsgToUi::OverlayOpened {
                kind: OverlayKind::Summary,
                dark: self.settings.snapshot().dark_mode,
            })?;
        }
        self.ui.send(MsgToUi::SummaryUpdate {
            title: content.title,
            body: content.body,
            state: content.state,
        })
    }

    fn close_summary(&self) -> Result<()> {
        let was_open = {
            let mut panel = self.summary.lock();
            let was_open = panel.is_open();
            panel.close();
            was_open
        };
        if was_open {
            self.ui.send(MsgToUi::OverlayClosed {
                kind: OverlayKind::Summary,
            })?;
        }
        Ok(())
    }

    // ---- picker ----

    /// Enter element-picking mode.
    pub fn start_picker(&self) -> Result<()> {
        if self.picker.lock().is_active() {
            return Ok(());
        }
        self.close_overlays_except(None)?;
        self.picker.lock().start();
        self.ui.send(MsgToUi::OverlayOpened {
            kind: OverlayKind::Picker,
            dark: self.settings.snapshot().dark_mode,
        })?;
        self.ui.send(MsgToUi::PickerInstructions {
            text: picker::PICK_INSTRUCTIONS.into(),
        })
    }

    fn picker_back(&self) -> Result<()> {
        let exited = self.picker.lock().back();
        if exited {
            self.poller.stop(POLL_PICKER_MENU);
            return self.ui.send(MsgToUi::OverlayClosed {
                kind: OverlayKind::Picker,
            });
        }
        // Ask the host to close whatever menu the trigger opened.
        self.page.relay_key(KeyInput {
            key: "Escape".into(),
            ctrl: false,
            alt: false,
            shift: false,
            meta: false,
            trusted: false,
            target: KeyTarget::Page,
        });
        self.ui.send(MsgToUi::PickerInstructions {
            text: picker::PICK_INSTRUCTIONS.into(),
        })?;
        self.clear_picker_highlight()
    }

    fn close_picker(&self) -> Result<()> {
        let was_active = {
            let mut p = self.picker.lock();
            let was_active = p.is_active();
            p.close();
            was_active
        };
        if was_active {
            self.poller.stop(POLL_PICKER_MENU);
            self.ui.send(MsgToUi::OverlayClosed {
                kind: OverlayKind::Picker,
            })?;
        }
        Ok(())
    }

    fn clear_picker_highlight(&self) -> Result<()> {
        self.picker.lock().set_highlight(None);
        self.ui.send(MsgToUi::PickerHighlight {
            rect: None,
            description: String::new(),
        })
    }

    /// Generate a selector and description for `el` and save it as a
    /// custom shortcut. Saving is best-effort: a storage failure is
    /// reported once and not rolled back.
    fn capture_element(&self, el: NodeId) {
        let Some(selector) = locator::locate(self.page.as_ref(), el) else {
            return;
        };
        let description = locator::describe(self.page.as_ref(), el);
        let info = locator::element_info(self.page.as_ref(), el, &selector);
        let trigger_selector = {
            let p = self.picker.lock();
            if p.in_submenu() {
                p.trigger()
                    .and_then(|t| locator::locate(self.page.as_ref(), t))
            } else {
                None
            }
        };
        let engine = self.clone();
        tokio::spawn(async move {
            let title = if engine.settings.snapshot().assist_titles {
                match engine.assist.format_title(&info).await {
                    Ok(t) if !t.trim().is_empty() => t,
                    Ok(_) | Err(_) => description,
                }
            } else {
                description
            };
            let shortcut = CustomShortcut {
                id: picker::generate_id(),
                selector,
                description: locator::tidy(&title),
                shortcut: None,
                menu_trigger_selector: trigger_selector,
            };
            if let Err(e) = engine.save_custom_shortcut(shortcut).await {
                debug!("could not save custom shortcut: {}", e);
                let _ = engine.ui.notify(
                    NotifyKind::Error,
                    "Custom shortcuts",
                    "Could not save the new shortcut.",
                );
            }
            let _ = engine.close_picker();
        });
    }

    async fn save_custom_shortcut(&self, shortcut: CustomShortcut) -> Result<()> {
        let id = shortcut.id.clone();
        let mut all = self.settings.snapshot().custom_shortcuts.clone();
        all.push(shortcut);
        let mut values = ValueMap::new();
        values.insert(
            keys::CUSTOM_SHORTCUTS.into(),
            serde_json::to_value(all).unwrap_or(Value::Null),
        );
        self.settings.persist(values).await?;
        // Hand the options surface a pointer at the new entry.
        if let Err(e) = self.settings.set_scroll_marker(&id).await {
            debug!("could not set scroll marker: {}", e);
        }
        self.refresh_palette(&self.settings.snapshot());
        Ok(())
    }

    /// Execute a saved custom shortcut: click straight through, or open
    /// its gating menu first and poll for the target.
    fn run_custom(&self, shortcut: &CustomShortcut) {
        let page = self.page.as_ref();
        let Some(trigger_selector) = &shortcut.menu_trigger_selector else {
            match locator::resolve(page, &shortcut.selector) {
                Some(target) => page.click(target),
                None => debug!(selector = %shortcut.selector, "custom shortcut target not found"),
            }
            return;
        };
        // The menu may already be open from a previous interaction.
        if let Some(target) = picker::is_visibly_present(page, &shortcut.selector) {
            page.click(target);
            return;
        }
        let Some(trigger) = locator::resolve(page, trigger_selector) else {
            debug!(selector = %trigger_selector, "menu trigger not found");
            if let Some(target) = locator::resolve(page, &shortcut.selector) {
                page.click(target);
            }
            return;
        };
        page.click(trigger);
        let page = self.page.clone();
        let selector = shortcut.selector.clone();
        let wanted = selector.clone();
        self.poller.start_or(
            POLL_CUSTOM_APPLY,
            PollSpec::new(40, 50).after(150),
            move || match picker::is_visibly_present(page.as_ref(), &selector) {
                Some(target) => {
                    page.click(target);
                    true
                }
                None => false,
            },
            move || {
                debug!(selector = %wanted, "custom shortcut target never became visible");
            },
        );
    }

    // ---- undo ----

    /// Click the host's undo control, snapshotting the list first so the
    /// restore watcher can refocus whatever comes back.
    pub fn trigger_undo(&self) {
        let Some(button) = controls::find_undo_button(self.page.as_ref()) else {
            debug!("no undo control found");
            return;
        };
        let (keys, count) = list::row_snapshot(self.page.as_ref());
        self.page.click(button);
        watch::spawn_restore_watch(self.page.clone(), keys, count);
    }

    // ---- shared ----

    /// Enforce the single-open-overlay invariant.
    fn close_overlays_except(&self, keep: Option<OverlayKind>) -> Result<()> {
        if keep != Some(OverlayKind::CommandPalette) {
            self.close_palette()?;
        }
        if keep != Some(OverlayKind::Snooze) {
            self.close_snooze()?;
        }
        if keep != Some(OverlayKind::Picker) {
            self.close_picker()?;
        }
        if keep != Some(OverlayKind::Summary) {
            self.close_summary()?;
        }
        Ok(())
    }

    /// Persist one boolean setting. Returns whether the write (and
    /// therefore the snapshot) actually changed; a store failure is
    /// reported once and otherwise ignored.
    async fn toggle_setting(&self, key: &str, next: bool) -> Result<bool> {
        let mut values = ValueMap::new();
        values.insert(key.into(), Value::Bool(next));
        match self.settings.persist(values).await {
            Ok(()) => Ok(true),
            Err(e) => {
                debug!("could not persist {}: {}", key, e);
                let _ = self.ui.notify(
                    NotifyKind::Warn,
                    "Settings",
                    "Could not save the setting; it will reset on reload.",
                );
                Ok(false)
            }
        }
    }
}
