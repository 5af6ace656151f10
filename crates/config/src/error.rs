use thiserror::Error;

/// Convenient result type for the config crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the settings layer.
///
/// Nothing here is fatal to the caller: reads fall back to defaults and
/// writes are reported once and dropped.
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// The backing store reported a failure.
    #[error("settings store error: {0}")]
    Store(String),

    /// The change-notification channel has been closed.
    #[error("settings change channel closed")]
    ChannelClosed,
}
