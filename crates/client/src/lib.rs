//! # Forum Client
//!
//! Request pipeline and backing-store API of the forum client runtime.
//!
//! ## Architecture
//!
//! ```text
//! ForumApi::find / save
//!     │
//!     ├──> RequestPipeline::execute
//!     │      ├─ attach X-CSRF-Token (+ Authorization)
//!     │      ├─ tunnel PATCH/PUT/DELETE through POST + X-HTTP-Method-Override
//!     │      ├─ HttpTransport::send  (reqwest by default)
//!     │      ├─ rotate CSRF token from the response
//!     │      └─ 2xx -> parsed body | otherwise -> RequestError { status, body, Failure }
//!     │
//!     └──> Store::push_document  (normalize into the identity map)
//! ```
//!
//! [`Forum`] is the application context that owns all of the above.

mod api;
mod boot;
mod config;
mod error;
mod failure;
mod pipeline;
mod session;
pub mod testing;
mod transport;

pub use api::{ForumApi, Params};
pub use boot::{Forum, Preload};
pub use config::{ClientConfig, MAX_PAGE_SIZE};
pub use error::{
    ClientError, ConfigError, Method, RequestError, RequestSummary, Result, MALFORMED_BODY_STATUS,
    NO_RESPONSE_STATUS,
};
pub use failure::{FieldError, Failure};
pub use pipeline::{
    Deserializer, ErrorHandler, LastError, RequestOptions, RequestPipeline, RequestSpec,
    CSRF_HEADER, METHOD_OVERRIDE_HEADER,
};
pub use session::{Session, SessionPayload};
pub use transport::{HttpTransport, ReqwestTransport, TransportError, WireRequest, WireResponse};
