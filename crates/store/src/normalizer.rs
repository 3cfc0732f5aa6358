use crate::key::ResourceKey;
use crate::registry::{Relation, ResourceRegistry};
use forum_protocol::{Document, PrimaryData, RelationshipData, ResourceObject};
use std::collections::BTreeMap;

/// Shape of the primary `data` section, expressed as registry handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Primary {
    One(ResourceKey),
    Many(Vec<ResourceKey>),
    Empty,
}

impl Primary {
    pub fn keys(&self) -> Vec<&ResourceKey> {
        match self {
            Self::One(key) => vec![key],
            Self::Many(keys) => keys.iter().collect(),
            Self::Empty => Vec::new(),
        }
    }

    pub fn single(&self) -> Option<&ResourceKey> {
        match self {
            Self::One(key) => Some(key),
            Self::Many(keys) => keys.first(),
            Self::Empty => None,
        }
    }
}

/// Result of normalizing a document: handles into the registry, never raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub primary: Primary,
    pub included: Vec<ResourceKey>,
}

impl Normalized {
    /// Primary and included keys, primary first.
    pub fn all_keys(&self) -> Vec<&ResourceKey> {
        let mut out = self.primary.keys();
        out.extend(self.included.iter());
        out
    }
}

/// Upserts every resource of `document` into `registry`.
///
/// Relations are stored by key, so the order in which `included` and primary
/// resources are applied does not change the resulting graph. References to
/// resources missing from the payload are kept as keys and resolve against the
/// registry on read.
pub fn normalize(registry: &mut ResourceRegistry, document: &Document) -> Normalized {
    let included: Vec<ResourceKey> = document
        .included
        .iter()
        .map(|resource| ingest(registry, resource))
        .collect();

    let primary = match &document.data {
        PrimaryData::One(Some(resource)) => Primary::One(ingest(registry, resource)),
        PrimaryData::One(None) => Primary::Empty,
        PrimaryData::Many(list) => {
            Primary::Many(list.iter().map(|resource| ingest(registry, resource)).collect())
        }
    };

    log::debug!(
        "normalized {} primary and {} included resources ({} live entries)",
        primary.keys().len(),
        included.len(),
        registry.len()
    );

    Normalized { primary, included }
}

fn ingest(registry: &mut ResourceRegistry, resource: &ResourceObject) -> ResourceKey {
    let key = ResourceKey::new(resource.kind.clone(), resource.id.clone());
    let relations = relations_of(resource);
    registry.upsert(key.clone(), resource.attributes.clone(), relations);
    key
}

fn relations_of(resource: &ResourceObject) -> BTreeMap<String, Relation> {
    let mut out = BTreeMap::new();
    for (name, relationship) in &resource.relationships {
        // Link-only relationships carry no linkage and leave the stored edge untouched.
        let Some(data) = &relationship.data else {
            continue;
        };
        let relation = match data {
            RelationshipData::One(target) => Relation::One(target.as_ref().map(ResourceKey::from)),
            RelationshipData::Many(targets) => {
                Relation::Many(targets.iter().map(ResourceKey::from).collect())
            }
        };
        out.insert(name.clone(), relation);
    }
    out
}
