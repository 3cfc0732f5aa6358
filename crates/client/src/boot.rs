use crate::api::ForumApi;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::pipeline::RequestPipeline;
use crate::session::{Session, SessionPayload};
use crate::transport::{HttpTransport, ReqwestTransport};
use forum_protocol::Document;
use forum_store::Store;
use serde::Deserialize;
use std::sync::Arc;

/// Data the server embeds in the initial page: the session and any documents
/// that should be in the store before the first route runs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preload {
    #[serde(default)]
    pub session: Option<SessionPayload>,
    #[serde(default)]
    pub documents: Vec<Document>,
}

/// Application context: the single owner of config, session, store and the
/// request stack. Built in boot order: session, then store, then the caller
/// starts routing.
#[derive(Debug)]
pub struct Forum {
    config: ClientConfig,
    session: Arc<Session>,
    store: Store,
    api: ForumApi,
}

impl Forum {
    pub fn boot(config: ClientConfig, preload: Preload) -> Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        Self::boot_with_transport(config, preload, Arc::new(transport))
    }

    pub fn boot_with_transport(
        config: ClientConfig,
        preload: Preload,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        config.validate()?;
        let api_root = config.api_url()?;

        let session = Arc::new(
            preload
                .session
                .as_ref()
                .map(Session::from_payload)
                .unwrap_or_default(),
        );
        log::info!(
            "session loaded ({})",
            session
                .user()
                .map_or_else(|| "anonymous".to_string(), |user| user.to_string())
        );

        let store = Store::new();
        for document in &preload.documents {
            store.push_document(document);
        }
        log::debug!("store preloaded with {} resources", store.len());

        let pipeline = Arc::new(
            RequestPipeline::new(transport, session.clone())
                .with_api_token(config.api_token.clone()),
        );
        let api = ForumApi::new(pipeline, store.clone(), api_root);

        Ok(Self {
            config,
            session,
            store,
            api,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn api(&self) -> &ForumApi {
        &self.api
    }

    pub fn pipeline(&self) -> &Arc<RequestPipeline> {
        self.api.pipeline()
    }
}
