use crate::backend::Backend;
use crate::error::{Result, StreamError};
use crate::state::PostStream;
use forum_client::Session;
use forum_store::model::{Discussion, DISCUSSIONS};
use forum_store::{Attributes, ResourceKey};
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};

pub const DEFAULT_PAGE_SIZE: usize = 20;

const LAST_READ_POST_NUMBER: &str = "lastReadPostNumber";

/// What the view layer receives. The view reads `stream` and reports scroll
/// changes back through [`DiscussionPage::on_position_change`].
#[derive(Debug, Clone)]
pub struct DiscussionView {
    pub discussion: ResourceKey,
    pub stream: Arc<PostStream>,
    pub near: Option<u64>,
}

/// Controller for one open discussion: owns its post stream, tracks the URL
/// position and persists the read position.
pub struct DiscussionPage {
    backend: Arc<dyn Backend>,
    session: Arc<Session>,
    discussion: ResourceKey,
    stream: Arc<PostStream>,
    near: Mutex<Option<u64>>,
}

impl DiscussionPage {
    pub async fn open(
        backend: Arc<dyn Backend>,
        session: Arc<Session>,
        id_or_slug: &str,
        near: Option<u64>,
    ) -> Result<Self> {
        Self::open_with_page_size(backend, session, id_or_slug, near, DEFAULT_PAGE_SIZE).await
    }

    /// Loads the discussion (by slug when `id_or_slug` is not numeric), seeds the
    /// stream with the posts that came with it and jumps to `near`.
    pub async fn open_with_page_size(
        backend: Arc<dyn Backend>,
        session: Arc<Session>,
        id_or_slug: &str,
        near: Option<u64>,
        page_size: usize,
    ) -> Result<Self> {
        let params = if id_or_slug.parse::<u64>().is_ok() {
            Vec::new()
        } else {
            vec![("bySlug".to_string(), "true".to_string())]
        };
        let normalized = backend.find(DISCUSSIONS, id_or_slug, &params).await?;
        let discussion = normalized
            .primary
            .single()
            .filter(|key| key.kind == DISCUSSIONS)
            .cloned()
            .ok_or_else(|| StreamError::MissingDiscussion(id_or_slug.to_string()))?;

        let known: Vec<ResourceKey> = backend.store().read(|registry| {
            let mut keys: Vec<ResourceKey> = registry
                .get(&discussion)
                .and_then(Discussion::from_resource)
                .map(|d| d.post_keys().into_iter().cloned().collect())
                .unwrap_or_default();
            keys.extend(normalized.included.iter().cloned());
            keys
        });

        let stream = Arc::new(PostStream::new(
            discussion.clone(),
            backend.clone(),
            page_size,
            &known,
        ));
        stream.go_to_number(near, true).await?;
        log::info!(
            "opened {discussion} with {} posts loaded",
            stream.loaded_numbers().len()
        );

        Ok(Self {
            backend,
            session,
            discussion,
            stream,
            near: Mutex::new(near),
        })
    }

    /// Called by the view when the rendered range changes. Updates the stream,
    /// remembers the start for the URL and advances the read position.
    ///
    /// Returns whether a read-position update was sent.
    pub async fn on_position_change(&self, start: u64, end: u64) -> Result<bool> {
        let (start, end) = (start.min(end), start.max(end));
        self.stream.on_position_change(start, end);
        *self.near.lock().unwrap_or_else(PoisonError::into_inner) = Some(start);
        self.mark_read(end).await
    }

    pub fn discussion(&self) -> &ResourceKey {
        &self.discussion
    }

    pub fn stream(&self) -> &Arc<PostStream> {
        &self.stream
    }

    pub fn near(&self) -> Option<u64> {
        *self.near.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn view(&self) -> DiscussionView {
        DiscussionView {
            discussion: self.discussion.clone(),
            stream: self.stream.clone(),
            near: self.near(),
        }
    }

    async fn mark_read(&self, end: u64) -> Result<bool> {
        if !self.session.is_authenticated() {
            return Ok(false);
        }
        // Compare and raise in one write so concurrent calls cannot lower it.
        let raised = self.backend.store().write(|registry| {
            let last_read = registry
                .get(&self.discussion)
                .and_then(Discussion::from_resource)
                .map(|d| d.last_read_post_number());
            match last_read {
                Some(last_read) if end > last_read => {
                    registry.set_attribute(&self.discussion, LAST_READ_POST_NUMBER, json!(end))
                }
                _ => false,
            }
        });
        if !raised {
            return Ok(false);
        }

        let mut attributes = Attributes::new();
        attributes.insert(LAST_READ_POST_NUMBER.to_string(), json!(end));
        self.backend.save(&self.discussion, attributes).await?;
        log::debug!("{}: read up to post {end}", self.discussion);
        Ok(true)
    }
}

impl std::fmt::Debug for DiscussionPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscussionPage")
            .field("discussion", &self.discussion)
            .field("near", &self.near())
            .field("stream", &self.stream)
            .finish()
    }
}
