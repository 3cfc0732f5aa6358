use forum_protocol::{ErrorDocument, ErrorObject};
use std::fmt;

pub const PERMISSION_DENIED_MESSAGE: &str = "You do not have permission to do that.";
pub const NOT_FOUND_MESSAGE: &str = "The requested resource was not found.";
pub const RATE_LIMITED_MESSAGE: &str =
    "You're going a little too quickly. Please try again in a few seconds.";
pub const GENERIC_MESSAGE: &str = "Oops! Something went wrong. Please try again.";

/// One field-level validation message from a 422 response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Option<String>,
    pub message: String,
}

/// User-facing category of a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// 422: one message per invalid field.
    Validation(Vec<FieldError>),
    /// 401 / 403.
    PermissionDenied,
    /// 404 / 410.
    NotFound,
    /// 429.
    RateLimited,
    Generic,
}

impl Failure {
    /// Pure mapping from status (and, for 422, the error document) to a category.
    pub fn classify(status: u16, body: &str) -> Self {
        match status {
            422 => Self::Validation(validation_errors(body)),
            401 | 403 => Self::PermissionDenied,
            404 | 410 => Self::NotFound,
            429 => Self::RateLimited,
            _ => Self::Generic,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Presentable messages; validation failures yield one entry per field.
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Validation(errors) if !errors.is_empty() => {
                errors.iter().map(|e| e.message.clone()).collect()
            }
            Self::Validation(_) | Self::Generic => vec![GENERIC_MESSAGE.to_string()],
            Self::PermissionDenied => vec![PERMISSION_DENIED_MESSAGE.to_string()],
            Self::NotFound => vec![NOT_FOUND_MESSAGE.to_string()],
            Self::RateLimited => vec![RATE_LIMITED_MESSAGE.to_string()],
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages().join("\n"))
    }
}

fn validation_errors(body: &str) -> Vec<FieldError> {
    let Some(document) = ErrorDocument::parse_best_effort(body) else {
        return Vec::new();
    };
    document
        .errors
        .iter()
        .filter_map(|error: &ErrorObject| {
            let message = error.detail.clone()?;
            Some(FieldError {
                field: error.field().map(str::to_string),
                message,
            })
        })
        .collect()
}
