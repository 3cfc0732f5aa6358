//! Typed read-only views over registry entries.

use crate::key::ResourceKey;
use crate::registry::{Relation, Resource};
use serde_json::Value;

pub const DISCUSSIONS: &str = "discussions";
pub const POSTS: &str = "posts";
pub const USERS: &str = "users";

fn as_number(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str)
}

fn to_one<'a>(resource: &'a Resource, name: &str) -> Option<&'a ResourceKey> {
    match resource.relation(name)? {
        Relation::One(target) => target.as_ref(),
        Relation::Many(targets) => targets.first(),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Discussion<'a> {
    resource: &'a Resource,
}

impl<'a> Discussion<'a> {
    pub fn from_resource(resource: &'a Resource) -> Option<Self> {
        (resource.kind() == DISCUSSIONS).then_some(Self { resource })
    }

    pub fn key(&self) -> &'a ResourceKey {
        self.resource.key()
    }

    pub fn title(&self) -> Option<&'a str> {
        as_str(self.resource.attribute("title"))
    }

    pub fn slug(&self) -> Option<&'a str> {
        as_str(self.resource.attribute("slug"))
    }

    pub fn comment_count(&self) -> Option<u64> {
        as_number(self.resource.attribute("commentCount"))
    }

    pub fn participant_count(&self) -> Option<u64> {
        as_number(self.resource.attribute("participantCount"))
    }

    pub fn last_post_number(&self) -> Option<u64> {
        as_number(self.resource.attribute("lastPostNumber"))
    }

    /// Missing or null means nothing has been read yet.
    pub fn last_read_post_number(&self) -> u64 {
        as_number(self.resource.attribute("lastReadPostNumber")).unwrap_or(0)
    }

    pub fn post_keys(&self) -> Vec<&'a ResourceKey> {
        self.resource
            .relation("posts")
            .map(Relation::keys)
            .unwrap_or_default()
    }

    pub fn author(&self) -> Option<&'a ResourceKey> {
        to_one(self.resource, "user")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Post<'a> {
    resource: &'a Resource,
}

impl<'a> Post<'a> {
    pub fn from_resource(resource: &'a Resource) -> Option<Self> {
        (resource.kind() == POSTS).then_some(Self { resource })
    }

    pub fn key(&self) -> &'a ResourceKey {
        self.resource.key()
    }

    pub fn number(&self) -> Option<u64> {
        as_number(self.resource.attribute("number"))
    }

    pub fn content_type(&self) -> Option<&'a str> {
        as_str(self.resource.attribute("contentType"))
    }

    pub fn content_html(&self) -> Option<&'a str> {
        as_str(self.resource.attribute("contentHtml"))
    }

    pub fn created_at(&self) -> Option<&'a str> {
        as_str(self.resource.attribute("createdAt"))
    }

    pub fn discussion(&self) -> Option<&'a ResourceKey> {
        to_one(self.resource, "discussion")
    }

    pub fn author(&self) -> Option<&'a ResourceKey> {
        to_one(self.resource, "user")
    }

    pub fn belongs_to(&self, discussion: &ResourceKey) -> bool {
        self.discussion() == Some(discussion)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct User<'a> {
    resource: &'a Resource,
}

impl<'a> User<'a> {
    pub fn from_resource(resource: &'a Resource) -> Option<Self> {
        (resource.kind() == USERS).then_some(Self { resource })
    }

    pub fn username(&self) -> Option<&'a str> {
        as_str(self.resource.attribute("username"))
    }

    pub fn display_name(&self) -> Option<&'a str> {
        as_str(self.resource.attribute("displayName")).or_else(|| self.username())
    }
}
