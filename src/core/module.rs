//! Loaded module values and the first-writer-wins module cache

use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A loaded module object.
///
/// Cloning shares the same underlying value; [`Module::ptr_eq`] compares identity.
#[derive(Clone)]
pub struct Module {
    inner: Arc<dyn Any + Send + Sync>,
}

impl Module {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }

    pub fn from_arc(inner: Arc<dyn Any + Send + Sync>) -> Self {
        Self { inner }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn ptr_eq(&self, other: &Module) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("ptr", &Arc::as_ptr(&self.inner))
            .finish()
    }
}

/// Specifier -> module mapping. An entry, once written, is never replaced.
#[derive(Default)]
pub struct ModuleCache {
    entries: RwLock<HashMap<String, Module>>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, specifier: &str) -> Option<Module> {
        self.entries.read().get(specifier).cloned()
    }

    pub fn contains(&self, specifier: &str) -> bool {
        self.entries.read().contains_key(specifier)
    }

    /// Inserts `module` unless `specifier` is already cached. Returns the entry
    /// that is cached afterwards, which is the earlier one on a collision.
    pub fn insert_if_absent(&self, specifier: impl Into<String>, module: Module) -> Module {
        let mut entries = self.entries.write();
        entries.entry(specifier.into()).or_insert(module).clone()
    }

    pub fn specifiers(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_identity() {
        let a = Module::new("engine".to_string());
        let b = a.clone();
        let c = Module::new("engine".to_string());

        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert_eq!(a.downcast_ref::<String>().map(String::as_str), Some("engine"));
        assert!(a.downcast_ref::<u32>().is_none());
    }

    #[test]
    fn test_first_writer_wins() {
        let cache = ModuleCache::new();
        let first = Module::new(1u32);
        let second = Module::new(2u32);

        let kept = cache.insert_if_absent("vue", first.clone());
        assert!(kept.ptr_eq(&first));

        let kept = cache.insert_if_absent("vue", second);
        assert!(kept.ptr_eq(&first));
        assert!(cache.get("vue").unwrap().ptr_eq(&first));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_specifiers_sorted() {
        let cache = ModuleCache::new();
        cache.insert_if_absent("vue", Module::new(()));
        cache.insert_if_absent("less", Module::new(()));
        assert_eq!(cache.specifiers(), vec!["less".to_string(), "vue".to_string()]);
        assert!(cache.contains("less"));
        assert!(!cache.contains("pug"));
    }
}
