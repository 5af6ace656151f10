//! Settings for mailkeys: the snapshot type, its defaults, the asynchronous
//! key-value store the browser side exposes, and the process-wide cache.
//!
//! There is exactly one authoritative in-memory [`Settings`] per execution
//! context, held by a [`SettingsCache`] and shared as an `Arc`. It is
//! replaced wholesale (never patched field-by-field) when the store reports
//! changes.

mod cache;
mod error;
mod settings;
mod store;

pub use cache::SettingsCache;
pub use error::{Error, Result};
pub use settings::{keys, CustomShortcut, Settings};
pub use store::{Area, ChangeBatch, MemoryStore, SettingsStore, ValueMap};
