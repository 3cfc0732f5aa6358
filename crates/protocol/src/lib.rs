//! # Forum Protocol
//!
//! JSON:API wire types exchanged between the forum client runtime and the server.
//!
//! ```text
//! { data: Resource | Resource[] | null, included?: Resource[] }
//!
//! Resource = { type, id, attributes?, relationships?: { name: { data: Ref | null | Ref[] } } }
//! Ref      = { type, id }
//! ```
//!
//! Failed requests carry an [`ErrorDocument`] instead.

mod document;
mod errors;

use anyhow::Result;
use serde::Serialize;

pub use document::{
    Document, PrimaryData, Relationship, RelationshipData, ResourceIdentifier, ResourceObject,
};
pub use errors::{ErrorDocument, ErrorObject, ErrorSource};

pub const JSON_API_MEDIA_TYPE: &str = "application/vnd.api+json";

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}
