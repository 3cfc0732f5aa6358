//! # Forum Store
//!
//! Identity-mapped registry of server resources and the JSON:API normalizer
//! that feeds it.
//!
//! ```text
//! Document (JSON:API)
//!     │
//!     ├──> normalize()
//!     │      ├─ upsert every included + primary resource
//!     │      └─ store relationships as keys
//!     │
//!     └──> ResourceRegistry  ((type, id) -> single live entry)
//!            └─ related()/related_many() dereference keys on read
//! ```
//!
//! Callers hold [`ResourceKey`]s and resolve them through a shared [`Store`];
//! re-normalizing a key merges into the existing entry, so every holder sees
//! the update.

mod error;
mod key;
pub mod model;
mod normalizer;
mod registry;
mod store;

pub use error::{Result, StoreError};
pub use key::ResourceKey;
pub use model::{Discussion, Post, User};
pub use normalizer::{normalize, Normalized, Primary};
pub use registry::{Attributes, Relation, Resource, ResourceRegistry};
pub use store::Store;
