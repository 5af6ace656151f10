//! The assist service seam: summarization and title formatting.
//!
//! The engine only ever sees this trait; the real implementation lives with
//! the extension's background messaging and is out of scope here.

use async_trait::async_trait;
use thiserror::Error;

/// Failures from the assist service. Always recoverable: callers fall back
/// to local behavior.
#[derive(Debug, Error, Clone)]
pub enum AssistError {
    /// The service could not be reached or refused the request.
    #[error("{0}")]
    Unavailable(String),

    /// The service answered with nothing usable.
    #[error("the assistant returned an empty reply")]
    Empty,
}

/// Element metadata handed to the title formatter.
#[derive(Debug, Clone, Default)]
pub struct ElementInfo {
    /// The generated selector.
    pub selector: String,
    /// The locally derived description.
    pub current_description: String,
    /// Lowercased tag name.
    pub tag: String,
    /// `aria-label`, if any.
    pub aria_label: String,
    /// `title` attribute, if any.
    pub title: String,
    /// Trimmed text content, capped at 200 chars.
    pub text: String,
    /// `role` attribute, if any.
    pub role: String,
}

/// Async request/response collaborator for summaries and shortcut titles.
#[async_trait]
pub trait Assist: Send + Sync {
    /// Summarize the given message body.
    async fn summarize(&self, body_text: &str) -> Result<String, AssistError>;

    /// Produce a polished title for a picked element.
    async fn format_title(&self, info: &ElementInfo) -> Result<String, AssistError>;
}

/// An assist service that is never available. Used when the feature is
/// disabled and in tests of the fallback paths.
pub struct NoAssist;

#[async_trait]
impl Assist for NoAssist {
    async fn summarize(&self, _body_text: &str) -> Result<String, AssistError> {
        Err(AssistError::Unavailable(
            "assist service is not configured".into(),
        ))
    }

    async fn format_title(&self, _info: &ElementInfo) -> Result<String, AssistError> {
        Err(AssistError::Unavailable(
            "assist service is not configured".into(),
        ))
    }
}
