//! Process-wide cache of externally resolved classes.
//!
//! A [`TypeCache`] is created by the embedder and handed to every compiler
//! that shares a classpath. It is read-mostly: lookups take the read lock,
//! and a miss loads the class outside any lock before inserting. When two
//! compilers race on the same name the first insert wins and the loser
//! adopts the cached entry, so every reader sees one `Arc` per name.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::common::classpath::{BootstrapClassPath, ClassLookup};
use crate::common::model::BinaryClass;
use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct TypeCache {
    entries: Arc<RwLock<HashMap<String, Arc<BinaryClass>>>>,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, internal_name: &str) -> Option<Arc<BinaryClass>> {
        let guard = self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.get(internal_name).cloned()
    }

    /// Inserts `class` unless an entry exists; returns the entry that is
    /// now in the cache.
    pub fn insert(&self, class: BinaryClass) -> Arc<BinaryClass> {
        let mut guard = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard
            .entry(class.name.clone())
            .or_insert_with(|| Arc::new(class))
            .clone()
    }

    pub fn contains(&self, internal_name: &str) -> bool {
        self.get(internal_name).is_some()
    }

    pub fn len(&self) -> usize {
        let guard = self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether two handles share the same underlying map
    pub fn same_cache(&self, other: &TypeCache) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

/// The external side of the type model: a provider consulted through a cache.
#[derive(Clone)]
pub struct ExternalTypes {
    cache: TypeCache,
    provider: Arc<dyn ClassLookup>,
}

impl ExternalTypes {
    pub fn new(cache: TypeCache, provider: Arc<dyn ClassLookup>) -> Self {
        Self { cache, provider }
    }

    /// Core JDK signatures only, with a private cache
    pub fn bootstrap() -> Self {
        Self::new(TypeCache::new(), Arc::new(BootstrapClassPath))
    }

    pub fn cache(&self) -> &TypeCache {
        &self.cache
    }

    /// Resolve an internal class name, consulting the cache first.
    pub fn load(&self, internal_name: &str) -> Result<Option<Arc<BinaryClass>>> {
        if let Some(hit) = self.cache.get(internal_name) {
            log::trace!("type cache hit: {}", internal_name);
            return Ok(Some(hit));
        }
        match self.provider.lookup(internal_name)? {
            Some(class) => {
                log::trace!("loaded external class {}", internal_name);
                Ok(Some(self.cache.insert(class)))
            }
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for ExternalTypes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalTypes")
            .field("cached", &self.cache.len())
            .field("provider", &self.provider.describe())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str, access: u16) -> BinaryClass {
        BinaryClass {
            name: name.to_string(),
            access,
            super_name: Some("java/lang/Object".to_string()),
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            inner_classes: vec![],
        }
    }

    #[test]
    fn first_insert_wins() {
        let cache = TypeCache::new();
        let first = cache.insert(class("a/B", 1));
        let second = cache.insert(class("a/B", 2));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.access, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clones_share_entries() {
        let cache = TypeCache::new();
        let other = cache.clone();
        cache.insert(class("a/B", 1));
        assert!(other.contains("a/B"));
        assert!(cache.same_cache(&other));
        assert!(!cache.same_cache(&TypeCache::new()));
    }

    #[test]
    fn repeated_loads_return_the_same_entry() {
        let external = ExternalTypes::bootstrap();
        let a = external.load("java/lang/String").unwrap().unwrap();
        let b = external.load("java/lang/String").unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(external.load("no/such/Type").unwrap().is_none());
    }

    #[test]
    fn concurrent_population_is_idempotent() {
        let cache = TypeCache::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.insert(class("x/Y", i)))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for r in &results {
            assert!(Arc::ptr_eq(r, &results[0]));
        }
        assert_eq!(cache.len(), 1);
    }
}
