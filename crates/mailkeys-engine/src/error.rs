use thiserror::Error;

/// Convenient result type for the engine crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the mailkeys engine.
///
/// Nothing in here ever reaches the host page: the dispatcher's outermost
/// boundary logs and swallows every failure.
#[derive(Debug, Error)]
pub enum Error {
    /// The UI event channel has been closed by the receiver.
    #[error("UI channel closed")]
    ChannelClosed,

    /// Errors from the settings layer.
    #[error("settings error: {0}")]
    Settings(#[from] config::Error),

    /// Generic error with context.
    #[error("engine error: {0}")]
    Msg(String),
}
