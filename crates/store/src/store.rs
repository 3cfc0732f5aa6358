use crate::error::Result;
use crate::key::ResourceKey;
use crate::normalizer::{normalize, Normalized};
use crate::registry::{Resource, ResourceRegistry};
use forum_protocol::Document;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};

/// Shared handle to the registry.
///
/// Cloning the handle shares the same identity map; callers keep
/// [`ResourceKey`]s and resolve them here, so a merge is observed by every
/// holder. Locks are held only for the duration of a closure and never across
/// an `.await`.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<RwLock<ResourceRegistry>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read<R>(&self, f: impl FnOnce(&ResourceRegistry) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut ResourceRegistry) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn push_document(&self, document: &Document) -> Normalized {
        self.write(|registry| normalize(registry, document))
    }

    /// Parses and ingests a raw JSON:API value (e.g. a preloaded payload).
    pub fn push_json(&self, value: &Value) -> Result<Normalized> {
        let document: Document = serde_json::from_value(value.clone())?;
        Ok(self.push_document(&document))
    }

    /// Snapshot of the entry for `key`.
    pub fn get(&self, key: &ResourceKey) -> Option<Resource> {
        self.read(|registry| registry.get(key).cloned())
    }

    pub fn get_by_id(&self, kind: &str, id: &str) -> Option<Resource> {
        self.read(|registry| registry.get_by_id(kind, id).cloned())
    }

    pub fn set_attribute(&self, key: &ResourceKey, name: &str, value: Value) -> bool {
        self.write(|registry| registry.set_attribute(key, name, value))
    }

    pub fn len(&self) -> usize {
        self.read(ResourceRegistry::len)
    }

    pub fn is_empty(&self) -> bool {
        self.read(ResourceRegistry::is_empty)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;
    use serde_json::json;

    #[test]
    fn clones_share_one_identity_map() {
        let store = Store::new();
        let view = store.clone();
        store
            .push_json(&json!({"data": {"type": "discussions", "id": "1", "attributes": {"title": "Hi"}}}))
            .expect("push");
        let key = ResourceKey::new("discussions", "1");
        assert!(view.set_attribute(&key, "title", json!("Edited")));
        assert_eq!(
            store.get(&key).and_then(|r| r.attribute("title").cloned()),
            Some(json!("Edited"))
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn push_json_rejects_non_documents() {
        let store = Store::new();
        let err = store
            .push_json(&json!({"data": {"type": "posts"}}))
            .expect_err("missing id");
        assert!(matches!(err, StoreError::InvalidDocument(_)));
        assert!(store.is_empty());
    }
}
