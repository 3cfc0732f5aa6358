use crate::error::RequestError;
use crate::pipeline::{Deserializer, RequestPipeline, RequestSpec};
use forum_protocol::{Document, ResourceIdentifier, ResourceObject};
use forum_store::{Attributes, Normalized, ResourceKey, Store};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Opaque query parameters passed through to the backend (`bySlug`,
/// `page[near]`, `filter[discussion]`, ...).
pub type Params = Vec<(String, String)>;

/// Backing store: fetches and saves resources through the pipeline and
/// normalizes every response into the shared [`Store`].
#[derive(Clone)]
pub struct ForumApi {
    pipeline: Arc<RequestPipeline>,
    store: Store,
    api_root: Url,
}

impl ForumApi {
    /// `api_root` must be a base URL (see [`crate::ClientConfig::api_url`]).
    pub fn new(pipeline: Arc<RequestPipeline>, store: Store, api_root: Url) -> Self {
        Self {
            pipeline,
            store,
            api_root,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn pipeline(&self) -> &Arc<RequestPipeline> {
        &self.pipeline
    }

    /// `{api_root}/{kind}[/{id}][?params]`
    pub fn endpoint(&self, kind: &str, id: Option<&str>, params: &[(String, String)]) -> String {
        let mut url = self.api_root.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(kind);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        url.into()
    }

    pub async fn find(
        &self,
        kind: &str,
        id: &str,
        params: &[(String, String)],
    ) -> Result<Normalized, RequestError> {
        let url = self.endpoint(kind, Some(id), params);
        self.fetch(RequestSpec::get(url)).await
    }

    pub async fn find_all(
        &self,
        kind: &str,
        params: &[(String, String)],
    ) -> Result<Normalized, RequestError> {
        let url = self.endpoint(kind, None, params);
        self.fetch(RequestSpec::get(url)).await
    }

    /// `PATCH {kind}/{id}` with the given attributes; the response is normalized
    /// over the local entry.
    pub async fn save(
        &self,
        key: &ResourceKey,
        attributes: Attributes,
    ) -> Result<Normalized, RequestError> {
        let mut resource = ResourceObject::new(key.kind.clone(), key.id.clone());
        resource.attributes = attributes;
        let url = self.endpoint(&key.kind, Some(&key.id), &[]);
        self.fetch(RequestSpec::patch(url, json!({ "data": resource })))
            .await
    }

    pub async fn create(
        &self,
        kind: &str,
        attributes: Attributes,
        relationships: Vec<(String, ResourceIdentifier)>,
    ) -> Result<Normalized, RequestError> {
        let mut data = json!({ "type": kind, "attributes": attributes });
        if !relationships.is_empty() {
            let linkage: serde_json::Map<String, Value> = relationships
                .into_iter()
                .map(|(name, target)| (name, json!({ "data": target })))
                .collect();
            data["relationships"] = Value::Object(linkage);
        }
        let url = self.endpoint(kind, None, &[]);
        self.fetch(RequestSpec::post(url, json!({ "data": data })))
            .await
    }

    pub async fn delete(&self, key: &ResourceKey) -> Result<(), RequestError> {
        let url = self.endpoint(&key.kind, Some(&key.id), &[]);
        self.pipeline.execute(RequestSpec::delete(url)).await?;
        Ok(())
    }

    async fn fetch(&self, spec: RequestSpec) -> Result<Normalized, RequestError> {
        let value = self
            .pipeline
            .execute(spec.with_deserializer(document_deserializer()))
            .await?;
        // The deserializer has already rejected anything but a document or an
        // empty body.
        let document = Document::deserialize(value).unwrap_or_default();
        Ok(self.store.push_document(&document))
    }
}

impl std::fmt::Debug for ForumApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForumApi")
            .field("api_root", &self.api_root.as_str())
            .field("store", &self.store)
            .finish()
    }
}

/// Accepts only bodies that are JSON:API documents (or empty), so a 2xx with
/// an unexpected shape is reported as a malformed response, never as an empty
/// result.
fn document_deserializer() -> Deserializer {
    Arc::new(|bytes: &[u8]| -> Result<Value, String> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        let value: Value = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        if !value.is_object() {
            return Err("response is not a JSON:API document".to_string());
        }
        Document::deserialize(&value).map_err(|e| e.to_string())?;
        Ok(value)
    })
}
