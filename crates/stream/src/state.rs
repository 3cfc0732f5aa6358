use crate::backend::Backend;
use crate::error::Result;
use forum_client::RequestError;
use forum_store::model::{Discussion, Post, POSTS};
use forum_store::{Normalized, ResourceKey, ResourceRegistry};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Loading status of a post stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Idle,
    Loading,
    Ready,
}

/// Which page of posts to request, relative to the loaded window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    Near(u64),
    After(u64),
    Before(u64),
}

impl Page {
    fn params(self, discussion_id: &str, limit: usize) -> Vec<(String, String)> {
        let anchor = match self {
            Self::Near(number) => ("page[near]", number),
            Self::After(number) => ("page[after]", number),
            Self::Before(number) => ("page[before]", number),
        };
        vec![
            ("filter[discussion]".to_string(), discussion_id.to_string()),
            (anchor.0.to_string(), anchor.1.to_string()),
            ("page[limit]".to_string(), limit.to_string()),
        ]
    }
}

/// How a fetched page relates to the posts already loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Join {
    /// Anchored on an end of the span (`page[after]` / `page[before]`).
    Adjacent,
    /// Anywhere (`page[near]`); replaces the window unless it touches the span.
    Detached,
}

/// Loaded posts plus the number range they were fetched for.
///
/// `span` never contains numbers that were skipped rather than fetched: a
/// detached page that does not overlap or touch it starts a new window.
/// Numbers missing inside the span are posts the server did not return.
#[derive(Debug, Default)]
struct Window {
    loaded: BTreeMap<u64, ResourceKey>,
    span: Option<(u64, u64)>,
    visible: Option<(u64, u64)>,
    target: Option<u64>,
    animate: bool,
}

impl Window {
    fn covers(&self, number: u64) -> bool {
        self.span
            .is_some_and(|(first, last)| first <= number && number <= last)
    }

    /// Adds `page` and returns how many numbers were new.
    fn absorb(&mut self, page: Vec<(u64, ResourceKey)>, join: Join) -> usize {
        let low = page.iter().map(|(n, _)| *n).min();
        let high = page.iter().map(|(n, _)| *n).max();
        let (Some(low), Some(high)) = (low, high) else {
            return 0;
        };

        let touches = self.span.is_some_and(|(first, last)| {
            low <= last.saturating_add(1) && high.saturating_add(1) >= first
        });
        if join == Join::Detached && !touches {
            self.loaded.clear();
            self.span = None;
            self.visible = None;
        }

        let before = self.loaded.len();
        self.loaded.extend(page);
        self.span = Some(match self.span {
            Some((first, last)) => (first.min(low), last.max(high)),
            None => (low, high),
        });
        self.loaded.len() - before
    }

    /// Closest loaded number; ties go to the lower one.
    fn nearest(&self, number: u64) -> Option<u64> {
        let below = self.loaded.range(..=number).next_back().map(|(n, _)| *n);
        let above = self.loaded.range(number..).next().map(|(n, _)| *n);
        match (below, above) {
            (Some(below), Some(above)) => {
                Some(if number - below <= above - number {
                    below
                } else {
                    above
                })
            }
            (below, above) => below.or(above),
        }
    }

    fn settle(&mut self, target: u64) {
        if let Some(number) = self.nearest(target) {
            self.visible = Some((number, number));
        }
    }
}

/// Posts of `keys` that are members of `discussion`, by number.
///
/// A post is a member when its `discussion` relation points at the discussion
/// or the discussion lists it under `posts`. Entries without a number are
/// skipped.
fn admit<'a>(
    registry: &ResourceRegistry,
    discussion: &ResourceKey,
    keys: impl IntoIterator<Item = &'a ResourceKey>,
) -> Vec<(u64, ResourceKey)> {
    let listed = registry
        .get(discussion)
        .and_then(Discussion::from_resource)
        .map(|d| d.post_keys())
        .unwrap_or_default();

    keys.into_iter()
        .filter_map(|key| {
            let post = registry.get(key).and_then(Post::from_resource)?;
            let member = post.belongs_to(discussion) || listed.iter().any(|k| *k == key);
            let number = post.number()?;
            member.then(|| (number, key.clone()))
        })
        .collect()
}

/// Windowed view over one discussion's posts.
///
/// Navigation calls are tagged with a generation number; a response that
/// arrives after a newer navigation started is dropped without touching the
/// window, the visible range, the target or the status.
pub struct PostStream {
    discussion: ResourceKey,
    backend: Arc<dyn Backend>,
    page_size: usize,
    window: Mutex<Window>,
    generation: AtomicU64,
    status: watch::Sender<StreamStatus>,
}

impl PostStream {
    /// `known` may contain anything; only posts of `discussion` are admitted.
    pub fn new(
        discussion: ResourceKey,
        backend: Arc<dyn Backend>,
        page_size: usize,
        known: &[ResourceKey],
    ) -> Self {
        let seeded = backend
            .store()
            .read(|registry| admit(registry, &discussion, known));
        let mut window = Window::default();
        window.absorb(seeded, Join::Detached);
        let initial = if window.loaded.is_empty() {
            StreamStatus::Idle
        } else {
            StreamStatus::Ready
        };
        let (status, _) = watch::channel(initial);

        Self {
            discussion,
            backend,
            page_size: page_size.max(1),
            window: Mutex::new(window),
            generation: AtomicU64::new(0),
            status,
        }
    }

    /// Navigates to post `number` (the first loaded post, or 1, when `None`
    /// or 0).
    ///
    /// Resolves without a request when the number is inside the span already
    /// fetched. A page that lands away from that span replaces the window.
    pub async fn go_to_number(&self, number: Option<u64>, no_animation: bool) -> Result<()> {
        let (generation, target) = {
            let mut window = self.lock();
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let target = number
                .filter(|n| *n > 0)
                .or_else(|| window.loaded.keys().next().copied())
                .unwrap_or(1);
            window.target = Some(target);
            window.animate = !no_animation;

            if window.covers(target) {
                window.settle(target);
                self.set_status(StreamStatus::Ready);
                log::debug!("{}: post {target} already loaded", self.discussion);
                return Ok(());
            }

            self.set_status(StreamStatus::Loading);
            (generation, target)
        };

        log::debug!(
            "{}: loading posts near {target} (generation {generation})",
            self.discussion
        );
        let result = self.fetch(Page::Near(target)).await;

        let mut window = self.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            log::debug!(
                "{}: dropping page near {target}, generation {generation} superseded",
                self.discussion
            );
            return Ok(());
        }

        match result {
            Ok(normalized) => {
                self.extend(&mut window, &normalized, Join::Detached);
                window.settle(target);
                self.set_status(StreamStatus::Ready);
                Ok(())
            }
            Err(err) => {
                window.target = None;
                self.set_status(if window.loaded.is_empty() {
                    StreamStatus::Idle
                } else {
                    StreamStatus::Ready
                });
                Err(err.into())
            }
        }
    }

    /// Loads the page after the last loaded post. Returns whether anything new
    /// was added.
    pub async fn load_next(&self) -> Result<bool> {
        let (generation, last) = {
            let window = self.lock();
            let Some((_, last)) = window.span else {
                return Ok(false);
            };
            let last_post_number = self.backend.store().read(|registry| {
                registry
                    .get(&self.discussion)
                    .and_then(Discussion::from_resource)
                    .and_then(|d| d.last_post_number())
            });
            if last_post_number.is_some_and(|end| last >= end) {
                return Ok(false);
            }
            (self.generation.load(Ordering::SeqCst), last)
        };
        self.load_page(generation, Page::After(last)).await
    }

    /// Loads the page before the first loaded post. Returns whether anything
    /// new was added.
    pub async fn load_previous(&self) -> Result<bool> {
        let (generation, first) = {
            let window = self.lock();
            match window.span {
                Some((first, _)) if first > 1 => (self.generation.load(Ordering::SeqCst), first),
                _ => return Ok(false),
            }
        };
        self.load_page(generation, Page::Before(first)).await
    }

    /// Records the range the view currently shows. Reversed bounds are
    /// swapped. Returns `false` when the range did not change.
    pub fn on_position_change(&self, start: u64, end: u64) -> bool {
        let range = (start.min(end), start.max(end));
        let mut window = self.lock();
        if window.visible == Some(range) {
            return false;
        }
        window.visible = Some(range);
        true
    }

    pub fn discussion(&self) -> &ResourceKey {
        &self.discussion
    }

    pub fn loaded_numbers(&self) -> Vec<u64> {
        self.lock().loaded.keys().copied().collect()
    }

    /// Keys of the loaded posts in number order.
    pub fn posts(&self) -> Vec<ResourceKey> {
        self.lock().loaded.values().cloned().collect()
    }

    pub fn visible_range(&self) -> Option<(u64, u64)> {
        self.lock().visible
    }

    pub fn target(&self) -> Option<u64> {
        self.lock().target
    }

    /// Whether the view should animate scrolling to the target.
    pub fn animate(&self) -> bool {
        self.lock().animate
    }

    pub fn status(&self) -> StreamStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<StreamStatus> {
        self.status.subscribe()
    }

    async fn load_page(&self, generation: u64, page: Page) -> Result<bool> {
        let result = self.fetch(page).await;

        let mut window = self.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            log::debug!("{}: dropping {page:?}, navigation moved on", self.discussion);
            return Ok(false);
        }
        let added = self.extend(&mut window, &result?, Join::Adjacent);
        Ok(added > 0)
    }

    async fn fetch(&self, page: Page) -> std::result::Result<Normalized, RequestError> {
        let params = page.params(&self.discussion.id, self.page_size);
        self.backend.find_all(POSTS, &params).await
    }

    /// Adds the posts of `normalized` that belong here. Returns how many
    /// numbers were new.
    fn extend(&self, window: &mut Window, normalized: &Normalized, join: Join) -> usize {
        let admitted = self.backend.store().read(|registry| {
            admit(
                registry,
                &self.discussion,
                normalized.all_keys().into_iter(),
            )
        });
        let added = window.absorb(admitted, join);
        log::debug!(
            "{}: {added} new posts, span {:?}",
            self.discussion,
            window.span
        );
        added
    }

    fn set_status(&self, status: StreamStatus) {
        self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
    }

    fn lock(&self) -> MutexGuard<'_, Window> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for PostStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostStream")
            .field("discussion", &self.discussion)
            .field("page_size", &self.page_size)
            .field("window", &*self.lock())
            .field("status", &self.status())
            .finish()
    }
}
