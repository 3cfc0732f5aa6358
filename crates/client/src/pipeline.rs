use crate::error::{
    Method, RequestError, RequestSummary, MALFORMED_BODY_STATUS, NO_RESPONSE_STATUS,
};
use crate::session::Session;
use crate::transport::{HttpTransport, WireRequest};
use forum_protocol::JSON_API_MEDIA_TYPE;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

pub const CSRF_HEADER: &str = "X-CSRF-Token";
pub const METHOD_OVERRIDE_HEADER: &str = "X-HTTP-Method-Override";
const ACCEPT: &str = "application/vnd.api+json, application/json";

/// Custom body parser for 2xx responses. An `Err` is surfaced as a status-500
/// [`RequestError`].
pub type Deserializer = Arc<dyn Fn(&[u8]) -> Result<Value, String> + Send + Sync>;

/// Replaces the default "re-raise" reaction to a classified failure. Returning
/// `Ok` recovers with that value.
pub type ErrorHandler = Arc<dyn Fn(RequestError) -> Result<Value, RequestError> + Send + Sync>;

#[derive(Clone)]
pub struct RequestOptions {
    /// Completion does not block redraws. Defaults to `true`.
    pub background: bool,
    pub deserialize: Option<Deserializer>,
    pub error_handler: Option<ErrorHandler>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            background: true,
            deserialize: None,
            error_handler: None,
        }
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("background", &self.background)
            .field("deserialize", &self.deserialize.is_some())
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
    pub options: RequestOptions,
}

impl RequestSpec {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            options: RequestOptions::default(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, url).with_body(body)
    }

    pub fn patch(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Patch, url).with_body(body)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn foreground(mut self) -> Self {
        self.options.background = false;
        self
    }

    #[must_use]
    pub fn with_deserializer(mut self, deserialize: Deserializer) -> Self {
        self.options.deserialize = Some(deserialize);
        self
    }

    #[must_use]
    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.options.error_handler = Some(handler);
        self
    }
}

/// The most recently surfaced request failure, kept so the UI can dismiss it
/// once a later request succeeds.
#[derive(Clone, Default)]
pub struct LastError {
    inner: Arc<Mutex<Option<RequestError>>>,
}

impl LastError {
    fn record(&self, error: &RequestError) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(error.clone());
    }

    pub fn get(&self) -> Option<RequestError> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn dismiss(&self) -> Option<RequestError> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl fmt::Debug for LastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LastError").field(&self.get()).finish()
    }
}

/// Issues requests, attaches session headers, rewrites verbs and turns every
/// response into either a parsed body or a classified [`RequestError`].
pub struct RequestPipeline {
    transport: Arc<dyn HttpTransport>,
    session: Arc<Session>,
    api_token: Option<String>,
    last_error: LastError,
}

impl RequestPipeline {
    pub fn new(transport: Arc<dyn HttpTransport>, session: Arc<Session>) -> Self {
        Self {
            transport,
            session,
            api_token: None,
            last_error: LastError::default(),
        }
    }

    #[must_use]
    pub fn with_api_token(mut self, token: Option<String>) -> Self {
        self.api_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn last_error(&self) -> &LastError {
        &self.last_error
    }

    pub async fn execute(&self, spec: RequestSpec) -> Result<Value, RequestError> {
        let RequestSpec {
            method,
            url,
            body,
            options,
        } = spec;
        let summary = RequestSummary {
            method,
            url: url.clone(),
            background: options.background,
        };

        let wire = self.wire_request(method, url, body.as_ref());
        log::debug!(
            "{} {} (sent as {}, background={})",
            method,
            wire.url,
            wire.method,
            options.background
        );

        let response = match self.transport.send(wire).await {
            Ok(response) => response,
            Err(err) => {
                log::warn!("{method} {} failed without a response: {err}", summary.url);
                return self.reject(
                    RequestError::new(NO_RESPONSE_STATUS, err.to_string(), summary),
                    &options,
                );
            }
        };

        if let Some(token) = response.header(CSRF_HEADER).filter(|t| !t.is_empty()) {
            self.session.rotate_csrf_token(token);
        }

        let raw_body = String::from_utf8_lossy(&response.body).into_owned();
        if !(200..=299).contains(&response.status) {
            return self.reject(
                RequestError::new(response.status, raw_body, summary),
                &options,
            );
        }

        let parsed = match &options.deserialize {
            Some(deserialize) => deserialize(&response.body),
            None => parse_json(&response.body),
        };
        match parsed {
            Ok(value) => Ok(value),
            Err(reason) => {
                log::warn!(
                    "{method} {} returned {} with an unparseable body: {reason}",
                    summary.url,
                    response.status
                );
                self.reject(
                    RequestError::new(MALFORMED_BODY_STATUS, raw_body, summary),
                    &options,
                )
            }
        }
    }

    fn wire_request(&self, method: Method, url: String, body: Option<&Value>) -> WireRequest {
        let mut headers = vec![
            ("Accept".to_string(), ACCEPT.to_string()),
            (CSRF_HEADER.to_string(), self.session.csrf_token()),
        ];
        if let Some(token) = &self.api_token {
            headers.push(("Authorization".to_string(), format!("Token {token}")));
        }

        let wire_method = if method.is_tunnel_safe() {
            method
        } else {
            headers.push((METHOD_OVERRIDE_HEADER.to_string(), method.as_str().to_string()));
            Method::Post
        };

        let body = body.map(|value| {
            headers.push(("Content-Type".to_string(), JSON_API_MEDIA_TYPE.to_string()));
            value.to_string().into_bytes()
        });

        WireRequest {
            method: wire_method.as_str().to_string(),
            url,
            headers,
            body,
        }
    }

    fn reject(&self, error: RequestError, options: &RequestOptions) -> Result<Value, RequestError> {
        log::debug!(
            "classified {} {} as {:?}",
            error.request.method,
            error.request.url,
            error.failure
        );
        self.last_error.record(&error);
        match &options.error_handler {
            Some(handler) => handler(error),
            None => Err(error),
        }
    }
}

fn parse_json(body: &[u8]) -> Result<Value, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::Failure;
    use crate::testing::MockTransport;
    use crate::transport::WireResponse;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn pipeline(transport: &Arc<MockTransport>) -> RequestPipeline {
        let transport: Arc<dyn HttpTransport> = transport.clone();
        RequestPipeline::new(transport, Arc::new(Session::new(None, "token-1")))
    }

    #[tokio::test]
    async fn success_yields_parsed_body() {
        let transport = MockTransport::shared();
        transport.push(WireResponse::new(200, r#"{"data":null}"#));
        let value = pipeline(&transport)
            .execute(RequestSpec::get("http://forum.test/api/discussions/1"))
            .await
            .expect("ok");
        assert_eq!(value, json!({"data": null}));
    }

    #[tokio::test]
    async fn empty_success_body_is_null() {
        let transport = MockTransport::shared();
        transport.push(WireResponse::new(204, ""));
        let value = pipeline(&transport)
            .execute(RequestSpec::delete("http://forum.test/api/posts/1"))
            .await
            .expect("ok");
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn unparseable_success_body_is_a_synthetic_500() {
        let transport = MockTransport::shared();
        transport.push(WireResponse::new(200, "<html>oops</html>"));
        let pipeline = pipeline(&transport);
        let err = pipeline
            .execute(RequestSpec::get("http://forum.test/api/discussions"))
            .await
            .expect_err("malformed");
        assert_eq!(err.status, 500);
        assert_eq!(err.body, "<html>oops</html>");
        assert_eq!(err.failure, Failure::Generic);
        assert_eq!(pipeline.last_error().get().map(|e| e.status), Some(500));
    }

    #[tokio::test]
    async fn status_classification_covers_every_family() {
        let cases = [
            (422, true),
            (401, false),
            (403, false),
            (404, false),
            (410, false),
            (429, false),
            (500, false),
            (418, false),
        ];
        for (status, validation) in cases {
            let transport = MockTransport::shared();
            transport.push(WireResponse::new(
                status,
                r#"{"errors":[{"detail":"Bad title.","source":{"pointer":"/data/attributes/title"}}]}"#,
            ));
            let err = pipeline(&transport)
                .execute(RequestSpec::get("http://forum.test/api/x"))
                .await
                .expect_err("failure");
            assert_eq!(err.status, status);
            assert_eq!(err.failure.is_validation(), validation, "{status}");
            assert_eq!(
                err.failure,
                Failure::classify(status, &err.body),
                "{status}"
            );
            assert_eq!(err.request.url, "http://forum.test/api/x");
        }
    }

    #[tokio::test]
    async fn patch_is_tunneled_through_post() {
        let transport = MockTransport::shared();
        transport.push(WireResponse::new(200, "{}"));
        pipeline(&transport)
            .execute(RequestSpec::patch(
                "http://forum.test/api/discussions/1",
                json!({"data": {"type": "discussions", "id": "1"}}),
            ))
            .await
            .expect("ok");
        let sent = transport.requests();
        assert_eq!(sent[0].method, "POST");
        assert_eq!(sent[0].header(METHOD_OVERRIDE_HEADER), Some("PATCH"));
        assert_eq!(sent[0].header("content-type"), Some(JSON_API_MEDIA_TYPE));
    }

    #[tokio::test]
    async fn get_and_post_are_sent_unmodified() {
        let transport = MockTransport::shared();
        transport.push(WireResponse::new(200, "{}"));
        transport.push(WireResponse::new(200, "{}"));
        let pipeline = pipeline(&transport);
        pipeline
            .execute(RequestSpec::get("http://forum.test/api/posts"))
            .await
            .expect("get");
        pipeline
            .execute(RequestSpec::post("http://forum.test/api/posts", json!({})))
            .await
            .expect("post");
        let sent = transport.requests();
        assert_eq!(sent[0].method, "GET");
        assert_eq!(sent[1].method, "POST");
        assert!(sent.iter().all(|r| r.header(METHOD_OVERRIDE_HEADER).is_none()));
    }

    #[tokio::test]
    async fn fresh_csrf_token_is_used_on_the_next_request() {
        let transport = MockTransport::shared();
        transport.push(WireResponse::new(200, "{}").with_header("x-csrf-token", "token-2"));
        transport.push(WireResponse::new(200, "{}"));
        let pipeline = pipeline(&transport);
        pipeline
            .execute(RequestSpec::get("http://forum.test/api"))
            .await
            .expect("first");
        pipeline
            .execute(RequestSpec::post("http://forum.test/api/posts", json!({})))
            .await
            .expect("second");
        let sent = transport.requests();
        assert_eq!(sent[0].header(CSRF_HEADER), Some("token-1"));
        assert_eq!(sent[1].header(CSRF_HEADER), Some("token-2"));
    }

    #[tokio::test]
    async fn error_responses_still_rotate_the_token() {
        let transport = MockTransport::shared();
        transport.push(WireResponse::new(403, "").with_header(CSRF_HEADER, "token-3"));
        let pipeline = pipeline(&transport);
        let _ = pipeline
            .execute(RequestSpec::get("http://forum.test/api"))
            .await;
        assert_eq!(pipeline.session().csrf_token(), "token-3");
    }

    #[tokio::test]
    async fn background_defaults_to_true() {
        assert!(RequestSpec::get("x").options.background);
        assert!(!RequestSpec::get("x").foreground().options.background);

        let transport = MockTransport::shared();
        transport.push(WireResponse::new(404, ""));
        let err = pipeline(&transport)
            .execute(RequestSpec::get("http://forum.test/api/x"))
            .await
            .expect_err("404");
        assert!(err.request.background);
    }

    #[tokio::test]
    async fn error_handler_can_recover_and_last_error_is_retained() {
        let transport = MockTransport::shared();
        transport.push(WireResponse::new(429, ""));
        let pipeline = pipeline(&transport);
        let handler: ErrorHandler = Arc::new(|err: RequestError| -> Result<Value, RequestError> {
            assert_eq!(err.failure, Failure::RateLimited);
            Ok(json!({"recovered": true}))
        });
        let value = pipeline
            .execute(RequestSpec::get("http://forum.test/api/x").with_error_handler(handler))
            .await
            .expect("recovered");
        assert_eq!(value, json!({"recovered": true}));
        assert_eq!(
            pipeline.last_error().dismiss().map(|e| e.failure),
            Some(Failure::RateLimited)
        );
        assert!(pipeline.last_error().get().is_none());
    }

    #[tokio::test]
    async fn custom_deserializer_failure_is_a_500() {
        let transport = MockTransport::shared();
        transport.push(WireResponse::new(200, "{}"));
        let strict: Deserializer =
            Arc::new(|_bytes: &[u8]| -> Result<Value, String> { Err("expected a list".to_string()) });
        let err = pipeline(&transport)
            .execute(RequestSpec::get("http://forum.test/api/x").with_deserializer(strict))
            .await
            .expect_err("rejected");
        assert_eq!(err.status, 500);
    }

    #[tokio::test]
    async fn missing_response_is_status_zero_generic() {
        let transport = MockTransport::shared();
        let err = pipeline(&transport)
            .execute(RequestSpec::get("http://forum.test/api/x"))
            .await
            .expect_err("no response queued");
        assert_eq!(err.status, 0);
        assert_eq!(err.failure, Failure::Generic);
    }

    #[tokio::test]
    async fn api_token_is_attached_as_authorization() {
        let transport = MockTransport::shared();
        transport.push(WireResponse::new(200, "{}"));
        let pipeline = pipeline(&transport).with_api_token(Some("secret".to_string()));
        pipeline
            .execute(RequestSpec::get("http://forum.test/api"))
            .await
            .expect("ok");
        assert_eq!(
            transport.requests()[0].header("authorization"),
            Some("Token secret")
        );
    }
}
