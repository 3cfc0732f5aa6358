use crate::failure::Failure;
use crate::transport::TransportError;
use forum_store::StoreError;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Synthetic status for a 2xx response whose body could not be parsed.
pub const MALFORMED_BODY_STATUS: u16 = 500;
/// Status recorded when no response was received at all.
pub const NO_RESPONSE_STATUS: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Verbs every intermediary forwards; anything else is tunneled through POST.
    pub fn is_tunnel_safe(self) -> bool {
        matches!(self, Self::Get | Self::Post)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The originating request, as the caller issued it (before any verb rewrite).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSummary {
    pub method: Method,
    pub url: String,
    pub background: bool,
}

/// A request that produced no usable result: non-2xx status, unparseable 2xx
/// body (status 500), or no response at all (status 0).
#[derive(Error, Debug, Clone)]
#[error("{} {} failed with status {status}: {failure}", .request.method, .request.url)]
pub struct RequestError {
    pub status: u16,
    pub body: String,
    pub request: RequestSummary,
    pub failure: Failure,
}

impl RequestError {
    pub fn new(status: u16, body: impl Into<String>, request: RequestSummary) -> Self {
        let body = body.into();
        let failure = Failure::classify(status, &body);
        Self {
            status,
            body,
            request,
            failure,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid value for {key}: {value:?}")]
    Env { key: String, value: String },

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
