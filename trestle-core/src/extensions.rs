//! Typed per-request extensions.
//!
//! Filters and handlers attach request-scoped values here (a resolved
//! subject record, a parsed locale, a database handle) without the context
//! knowing their types. Values are keyed by `TypeId`, so each type has at
//! most one slot.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Type-keyed value map carried by a `RequestContext`.
#[derive(Clone, Default)]
pub struct Extensions {
    map: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Extensions {
    #[inline]
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Insert a typed value, replacing any previous value of the same type.
    ///
    /// ```rust
    /// use trestle_core::Extensions;
    ///
    /// let mut ext = Extensions::new();
    /// ext.insert(42i32);
    /// ext.insert(7i32);
    /// assert_eq!(ext.get::<i32>(), Some(&7));
    /// ```
    #[inline]
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        self.map.insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Insert an Arc-wrapped value without re-allocating.
    #[inline]
    pub fn insert_arc<T: Send + Sync + 'static>(&mut self, value: Arc<T>) {
        self.map.insert(TypeId::of::<T>(), value);
    }

    #[inline]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|arc| arc.downcast_ref::<T>())
    }

    /// Get a shared handle, for values that must outlive the borrow.
    #[inline]
    pub fn get_arc<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|arc| arc.clone().downcast::<T>().ok())
    }

    #[inline]
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    #[inline]
    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<Arc<T>> {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|arc| arc.downcast::<T>().ok())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

impl std::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.map.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Theme(&'static str);

    #[test]
    fn test_insert_get_remove() {
        let mut ext = Extensions::new();
        assert!(ext.is_empty());

        ext.insert(Theme("default"));
        assert!(ext.contains::<Theme>());
        assert_eq!(ext.get::<Theme>(), Some(&Theme("default")));
        assert_eq!(ext.get::<String>(), None);

        let removed = ext.remove::<Theme>().unwrap();
        assert_eq!(*removed, Theme("default"));
        assert!(ext.is_empty());
    }

    #[test]
    fn test_get_arc_shares_value() {
        let mut ext = Extensions::new();
        let shared = Arc::new(Theme("dark"));
        ext.insert_arc(shared.clone());
        let fetched = ext.get_arc::<Theme>().unwrap();
        assert!(Arc::ptr_eq(&shared, &fetched));
    }
}
