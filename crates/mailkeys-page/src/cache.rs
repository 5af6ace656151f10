use std::{num::NonZeroUsize, sync::Arc};

use lru::LruCache;
use parking_lot::Mutex;

use crate::selector::{self, SelectorList};

/// Default maximum number of cached parsed selectors.
const DEFAULT_CAPACITY: usize = 256;

/// Thread-safe, size-bounded cache of parsed selectors.
///
/// The same handful of selectors is resolved on every keystroke, so parsing
/// once and caching the AST keeps lookups cheap. Unparseable selectors are
/// not cached; they surface as lookup misses each time.
pub struct SelectorCache {
    map: Mutex<LruCache<String, Arc<SelectorList>>>,
}

impl Default for SelectorCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl SelectorCache {
    /// Create a cache with default capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache with a specific capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            map: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Get a parsed selector, parsing and caching on miss. `None` when the
    /// selector does not parse.
    pub fn get_or_parse(&self, selector: &str) -> Option<Arc<SelectorList>> {
        if let Some(found) = self.map.lock().get(selector).cloned() {
            return Some(found);
        }
        let parsed = Arc::new(selector::parse(selector).ok()?);
        self.map
            .lock()
            .put(selector.to_string(), parsed.clone());
        Some(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caches_parsed_selectors() {
        let cache = SelectorCache::with_capacity(2);
        let first = cache.get_or_parse("button").expect("parse");
        let second = cache.get_or_parse("button").expect("parse");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn bad_selectors_are_not_cached() {
        let cache = SelectorCache::new();
        assert!(cache.get_or_parse("[broken").is_none());
        assert!(cache.get_or_parse("[broken").is_none());
    }
}
