use async_trait::async_trait;
use forum_client::{ForumApi, RequestError};
use forum_store::{Attributes, Normalized, ResourceKey, Store};

/// Where the stream and the page controller get their data from.
///
/// Every call normalizes its response into [`Backend::store`] before it
/// returns; the returned [`Normalized`] only carries keys into that store.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn find(
        &self,
        kind: &str,
        id: &str,
        params: &[(String, String)],
    ) -> Result<Normalized, RequestError>;

    async fn find_all(
        &self,
        kind: &str,
        params: &[(String, String)],
    ) -> Result<Normalized, RequestError>;

    async fn save(
        &self,
        key: &ResourceKey,
        attributes: Attributes,
    ) -> Result<Normalized, RequestError>;

    fn store(&self) -> &Store;
}

#[async_trait]
impl Backend for ForumApi {
    async fn find(
        &self,
        kind: &str,
        id: &str,
        params: &[(String, String)],
    ) -> Result<Normalized, RequestError> {
        ForumApi::find(self, kind, id, params).await
    }

    async fn find_all(
        &self,
        kind: &str,
        params: &[(String, String)],
    ) -> Result<Normalized, RequestError> {
        ForumApi::find_all(self, kind, params).await
    }

    async fn save(
        &self,
        key: &ResourceKey,
        attributes: Attributes,
    ) -> Result<Normalized, RequestError> {
        ForumApi::save(self, key, attributes).await
    }

    fn store(&self) -> &Store {
        ForumApi::store(self)
    }
}
