//! In-memory transport for tests and offline runs.

use crate::transport::{HttpTransport, TransportError, WireRequest, WireResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

type Responder = Box<dyn Fn(&WireRequest) -> Option<WireResponse> + Send + Sync>;

/// Records every request and answers from a FIFO queue, falling back to an
/// optional responder. With neither available it fails like a dropped connection.
#[derive(Default)]
pub struct MockTransport {
    queued: Mutex<VecDeque<WireResponse>>,
    requests: Mutex<Vec<WireRequest>>,
    responder: Option<Responder>,
}

impl MockTransport {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_responder(
        responder: impl Fn(&WireRequest) -> Option<WireResponse> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Some(Box::new(responder)),
            ..Self::default()
        })
    }

    pub fn push(&self, response: WireResponse) {
        self.queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<WireRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        let queued = self
            .queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        queued
            .or_else(|| self.responder.as_ref().and_then(|r| r(&request)))
            .ok_or_else(|| {
                TransportError::InvalidRequest(format!(
                    "no response for {} {}",
                    request.method, request.url
                ))
            })
    }
}
