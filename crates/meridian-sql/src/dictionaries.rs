//! Dictionary loader contract.
//!
//! `dictGet*` calls in GROUP BY may be unwrapped only when the dictionary
//! attribute they read is injective. That fact comes from dictionary
//! metadata, which lives outside this crate; the [`DictionarySource`] trait
//! is the seam. Lookups for the same `(dictionary, attribute)` pair are
//! memoized per analysis call through [`InjectivityCache`], since a large
//! GROUP BY can repeat the same pair many times.

use std::cell::RefCell;
use std::collections::HashMap;

/// External source of dictionary metadata. Implementations may block briefly
/// while a dictionary is loaded on demand; they must be safe for concurrent
/// readers.
pub trait DictionarySource {
    /// Whether `attribute` of `dictionary` is an injective mapping.
    /// Unknown dictionaries or attributes must return `false`.
    fn is_injective(&self, dictionary: &str, attribute: &str) -> bool;
}

/// Per-analysis memoization wrapper around a [`DictionarySource`].
pub struct InjectivityCache<'a> {
    source: &'a dyn DictionarySource,
    memo: RefCell<HashMap<(String, String), bool>>,
}

impl<'a> InjectivityCache<'a> {
    pub fn new(source: &'a dyn DictionarySource) -> Self {
        Self {
            source,
            memo: RefCell::new(HashMap::new()),
        }
    }

    pub fn is_injective(&self, dictionary: &str, attribute: &str) -> bool {
        let key = (dictionary.to_string(), attribute.to_string());
        if let Some(known) = self.memo.borrow().get(&key) {
            return *known;
        }
        let result = self.source.is_injective(dictionary, attribute);
        self.memo.borrow_mut().insert(key, result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingSource {
        calls: Cell<usize>,
    }

    impl DictionarySource for CountingSource {
        fn is_injective(&self, dictionary: &str, _attribute: &str) -> bool {
            self.calls.set(self.calls.get() + 1);
            dictionary == "regions"
        }
    }

    #[test]
    fn test_memoization_hits_source_once() {
        let source = CountingSource {
            calls: Cell::new(0),
        };
        let cache = InjectivityCache::new(&source);
        assert!(cache.is_injective("regions", "name"));
        assert!(cache.is_injective("regions", "name"));
        assert!(cache.is_injective("regions", "name"));
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn test_distinct_pairs_are_cached_separately() {
        let source = CountingSource {
            calls: Cell::new(0),
        };
        let cache = InjectivityCache::new(&source);
        assert!(cache.is_injective("regions", "name"));
        assert!(!cache.is_injective("users", "name"));
        assert_eq!(source.calls.get(), 2);
    }
}
