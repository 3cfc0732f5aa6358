use crate::key::ResourceKey;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

pub type Attributes = Map<String, Value>;

/// Linkage stored on a registry entry. Targets are keys, dereferenced on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Relation {
    One(Option<ResourceKey>),
    Many(Vec<ResourceKey>),
}

impl Relation {
    pub fn keys(&self) -> Vec<&ResourceKey> {
        match self {
            Self::One(Some(key)) => vec![key],
            Self::One(None) => Vec::new(),
            Self::Many(keys) => keys.iter().collect(),
        }
    }
}

/// One identity-mapped entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    key: ResourceKey,
    attributes: Attributes,
    relations: BTreeMap<String, Relation>,
    revision: u64,
}

impl Resource {
    fn new(key: ResourceKey) -> Self {
        Self {
            key,
            attributes: Map::new(),
            relations: BTreeMap::new(),
            revision: 0,
        }
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn kind(&self) -> &str {
        &self.key.kind
    }

    pub fn id(&self) -> &str {
        &self.key.id
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn relations(&self) -> &BTreeMap<String, Relation> {
        &self.relations
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    /// Number of merges applied since the entry was created.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn merge(&mut self, attributes: Attributes, relations: BTreeMap<String, Relation>) {
        for (name, value) in attributes {
            self.attributes.insert(name, value);
        }
        // A relation named in the update replaces its previous linkage wholesale.
        for (name, relation) in relations {
            self.relations.insert(name, relation);
        }
        self.revision += 1;
    }
}

/// Identity map from `(type, id)` to the single live entry for that key.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    entries: HashMap<ResourceKey, Resource>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &ResourceKey) -> Option<&Resource> {
        self.entries.get(key)
    }

    pub fn get_by_id(&self, kind: &str, id: &str) -> Option<&Resource> {
        self.entries.get(&ResourceKey::new(kind, id))
    }

    /// First entry of `kind` whose attribute `name` equals `value`, in key order.
    pub fn get_by(&self, kind: &str, name: &str, value: &Value) -> Option<&Resource> {
        self.all(kind)
            .into_iter()
            .find(|resource| resource.attribute(name) == Some(value))
    }

    pub fn all(&self, kind: &str) -> Vec<&Resource> {
        let mut out: Vec<&Resource> = self
            .entries
            .values()
            .filter(|resource| resource.kind() == kind)
            .collect();
        out.sort_by(|a, b| compare_ids(a.id(), b.id()));
        out
    }

    /// Creates the entry for `key` or merges into the existing one.
    pub fn upsert(
        &mut self,
        key: ResourceKey,
        attributes: Attributes,
        relations: BTreeMap<String, Relation>,
    ) -> &Resource {
        let entry = self
            .entries
            .entry(key)
            .or_insert_with_key(|key| Resource::new(key.clone()));
        entry.merge(attributes, relations);
        entry
    }

    /// Overwrites a single attribute locally. Returns `false` if the key is unknown.
    pub fn set_attribute(&mut self, key: &ResourceKey, name: &str, value: Value) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        entry.attributes.insert(name.to_string(), value);
        entry.revision += 1;
        true
    }

    /// Dereferences a to-one relation. `None` when the relation is absent, null, or
    /// points at a key that has not been normalized yet.
    pub fn related(&self, key: &ResourceKey, relation: &str) -> Option<&Resource> {
        match self.get(key)?.relation(relation)? {
            Relation::One(Some(target)) => self.get(target),
            Relation::One(None) => None,
            Relation::Many(targets) => targets.first().and_then(|target| self.get(target)),
        }
    }

    /// Dereferences a to-many relation, keeping positions of unresolved targets.
    pub fn related_many(&self, key: &ResourceKey, relation: &str) -> Vec<Option<&Resource>> {
        let Some(relation) = self.get(key).and_then(|r| r.relation(relation)) else {
            return Vec::new();
        };
        relation
            .keys()
            .into_iter()
            .map(|target| self.get(target))
            .collect()
    }
}

// Numeric ids sort numerically; anything else falls back to string order.
fn compare_ids(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}
