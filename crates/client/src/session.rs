use forum_store::{model::USERS, ResourceKey};
use serde::{Deserialize, Deserializer};
use std::sync::{PoisonError, RwLock};

/// Session bootstrap data as the server preloads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    #[serde(default, deserialize_with = "optional_id")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub csrf_token: String,
}

fn optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Text(text)) => Some(text),
        Some(RawId::Number(number)) => Some(number.to_string()),
        None => None,
    })
}

/// Authenticated user (fixed for the session) plus the rotating CSRF token.
#[derive(Debug, Default)]
pub struct Session {
    user: Option<ResourceKey>,
    csrf_token: RwLock<String>,
}

impl Session {
    pub fn new(user: Option<ResourceKey>, csrf_token: impl Into<String>) -> Self {
        Self {
            user,
            csrf_token: RwLock::new(csrf_token.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn from_payload(payload: &SessionPayload) -> Self {
        let user = payload
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty() && *id != "0")
            .map(|id| ResourceKey::new(USERS, id));
        Self::new(user, payload.csrf_token.clone())
    }

    pub fn user(&self) -> Option<&ResourceKey> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn csrf_token(&self) -> String {
        self.csrf_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Last writer wins; the server reissues tokens monotonically.
    pub fn rotate_csrf_token(&self, token: &str) {
        let mut guard = self
            .csrf_token
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if *guard != token {
            log::debug!("rotating CSRF token");
            *guard = token.to_string();
        }
    }
}
