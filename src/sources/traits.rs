use crate::error::{ExtractError, SourceError};
use crate::models::Record;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// A lazily-loaded, scrollable or paginated list of items to extract from.
///
/// Calls are blocking and the source is owned by exactly one collection run;
/// a live rendered view is not safely readable concurrently.
pub trait ElementSource {
    /// Opaque handle to one rendered element.
    type Element;

    /// The ordered, cumulative list of currently materialized elements.
    fn current_elements(&mut self) -> Result<Vec<Self::Element>, SourceError>;

    /// Trigger loading of more elements (scroll, next page, ...).
    fn advance(&mut self) -> Result<(), SourceError>;
}

/// Maps one source element to a partial structured record.
///
/// An absent field is a normal outcome. `ExtractError::Stale` means the
/// element itself was unreadable; the caller skips it and moves on.
pub trait Extract<E> {
    fn extract(&self, element: &E) -> Result<Record, ExtractError>;
}

/// Atomic check-and-set over identity keys.
///
/// `claim` returns true when the key was not seen before. The check and the
/// insert happen in one step so that two workers can never both accept items
/// with the same key.
pub trait SeenSet {
    fn claim(&mut self, key: &str) -> bool;
}

impl SeenSet for HashSet<String> {
    fn claim(&mut self, key: &str) -> bool {
        self.insert(key.to_string())
    }
}

/// Deduplication set shared by all workers of a partitioned run.
///
/// Each claim takes the lock once, covering both the membership check and the
/// insert.
#[derive(Debug, Clone, Default)]
pub struct SharedSeen {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl SharedSeen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SeenSet for SharedSeen {
    fn claim(&mut self, key: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_set_claims_each_key_once() {
        let mut seen: HashSet<String> = HashSet::new();
        assert!(seen.claim("a"));
        assert!(!seen.claim("a"));
        assert!(seen.claim("b"));
    }

    #[test]
    fn shared_seen_is_shared_across_clones() {
        let mut first = SharedSeen::new();
        let mut second = first.clone();
        assert!(first.claim("a"));
        assert!(!second.claim("a"));
        assert_eq!(second.len(), 1);
    }
}
