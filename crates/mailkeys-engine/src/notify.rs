use mailkeys_protocol::{MsgToUi, NotifyKind};
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

use crate::{Error, Result};

/// Sends overlay state and notifications to the rendering layer.
#[derive(Clone)]
pub struct UiSender {
    tx: UnboundedSender<MsgToUi>,
}

impl UiSender {
    /// Create a sender from a UI message channel.
    pub fn new(tx: UnboundedSender<MsgToUi>) -> Self {
        Self { tx }
    }

    /// Send a message to the renderer.
    pub fn send(&self, msg: MsgToUi) -> Result<()> {
        self.tx.send(msg).map_err(|_| Error::ChannelClosed)
    }

    /// Send a notification with the given kind, title, and text.
    ///
    /// Notification displays are always logged at info level for
    /// traceability.
    pub fn notify(&self, kind: NotifyKind, title: &str, text: &str) -> Result<()> {
        info!(kind = ?kind, title = %title, text = %text, "notification_display");
        self.send(MsgToUi::Notify {
            kind,
            title: title.to_string(),
            text: text.to_string(),
        })
    }
}
