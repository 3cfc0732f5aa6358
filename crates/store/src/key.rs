use forum_protocol::ResourceIdentifier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a resource: `(type, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

impl ResourceKey {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn is(&self, kind: &str, id: &str) -> bool {
        self.kind == kind && self.id == id
    }
}

impl From<ResourceIdentifier> for ResourceKey {
    fn from(value: ResourceIdentifier) -> Self {
        Self {
            kind: value.kind,
            id: value.id,
        }
    }
}

impl From<&ResourceIdentifier> for ResourceKey {
    fn from(value: &ResourceIdentifier) -> Self {
        Self::new(value.kind.clone(), value.id.clone())
    }
}

impl From<&ResourceKey> for ResourceIdentifier {
    fn from(value: &ResourceKey) -> Self {
        ResourceIdentifier::new(value.kind.clone(), value.id.clone())
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}
