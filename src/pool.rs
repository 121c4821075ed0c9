//! Interning pool for string values.
//!
//! Configuration files repeat the same short strings over and over (file extensions,
//! admin ids, message lines). Parsed strings go through a [`StringPool`] so that equal
//! values share one allocation.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

static SHARED: Lazy<StringPool> =
    Lazy::new(|| StringPool::with_capacity(StringPool::DEFAULT_CAPACITY));

/// A bounded set of interned strings.
///
/// Once `capacity` distinct strings are held, new strings are still returned but no
/// longer retained.
#[derive(Debug)]
pub struct StringPool {
    strings: Mutex<HashSet<Arc<str>>>,
    capacity: usize,
}

impl StringPool {
    pub const DEFAULT_CAPACITY: usize = 4096;

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        StringPool {
            strings: Mutex::new(HashSet::new()),
            capacity,
        }
    }

    /// The process-wide pool used by the deserializer.
    pub fn shared() -> &'static StringPool {
        &SHARED
    }

    /// Returns the pooled copy of `s`, adding it if there is room.
    pub fn intern(&self, s: &str) -> Arc<str> {
        let mut strings = self.strings.lock();
        if let Some(existing) = strings.get(s) {
            return Arc::clone(existing);
        }
        let interned: Arc<str> = Arc::from(s);
        if strings.len() < self.capacity {
            strings.insert(Arc::clone(&interned));
        }
        interned
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.strings.lock().clear();
    }
}

impl Default for StringPool {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_strings_share_allocation() {
        let pool = StringPool::default();
        let a = pool.intern("pbo");
        let b = pool.intern("pbo");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_capacity_bound() {
        let pool = StringPool::with_capacity(1);
        let a = pool.intern("one");
        let b = pool.intern("two");
        let c = pool.intern("two");
        assert_eq!(&*a, "one");
        assert_eq!(b, c);
        assert!(!Arc::ptr_eq(&b, &c));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_clear() {
        let pool = StringPool::default();
        pool.intern("x");
        pool.clear();
        assert!(pool.is_empty());
    }
}
