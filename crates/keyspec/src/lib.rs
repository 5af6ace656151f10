//! keyspec: key chords and keydown events for mailkeys.
//!
//! - [`Shortcut`]: a normalized modifier+key descriptor, as persisted in the
//!   settings store. A shortcut with an empty key is "unset" and never
//!   matches anything.
//! - [`KeyInput`]: a single observed keydown, including the trust flag and a
//!   coarse classification of the event target.
//!
//! Matching is case-insensitive on the key and exact on all four modifiers.

mod input;
pub use input::{KeyInput, KeyTarget};

mod shortcut;
pub use shortcut::Shortcut;
