use forum_client::RequestError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StreamError>;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("Discussion not found: {0}")]
    MissingDiscussion(String),
}

impl StreamError {
    /// HTTP status of the underlying request failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request(err) => Some(err.status),
            Self::MissingDiscussion(_) => None,
        }
    }
}
