//! Unified error type.

use http::StatusCode;

use crate::config::ConfigError;
use crate::decode::DecodeError;
use crate::method::Method;
use crate::response::{IntoResponse, Response};

/// The error type returned by sendi's fallible operations.
///
/// Handlers return it through `Result<_, Error>`; the router turns it into
/// an HTTP response with the status from [`Error::status_code`] and the
/// `Display` text as a plain-text body.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid route `{pattern}`: {reason}")]
    InvalidRoute { pattern: String, reason: String },

    #[error("route already registered: {method} {pattern}")]
    DuplicateRoute { method: Method, pattern: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("no route for {method} {path}")]
    NotFound { method: String, path: String },

    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed {
        method: String,
        path: String,
        allowed: Vec<Method>,
    },

    /// A handler-chosen status and message.
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    #[error("{0}")]
    Handler(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    /// Fails the request with `status`, sending `message` as the body.
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http { status, message: message.into() }
    }

    /// Wraps any handler-level failure. It is answered with `500`.
    pub fn other(err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self::Handler(err.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Decode(e) if e.is_unsupported_media() => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Http { status, .. } => *status,
            Self::Io(_)
            | Self::Config(_)
            | Self::InvalidRoute { .. }
            | Self::DuplicateRoute { .. }
            | Self::Encode(_)
            | Self::Handler(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut builder = Response::builder().status(status);
        if let Self::MethodNotAllowed { allowed, .. } = &self {
            let allow = allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
            builder = builder.header("allow", &allow);
        }
        builder.text(self.to_string())
    }
}
