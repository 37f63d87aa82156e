use thiserror::Error;

/// Errors that can occur while acquiring an access token.
///
/// Cloneable because one in-flight credential exchange may be awaited by many
/// callers at once and every waiter receives the same settlement.
#[derive(Debug, Clone, Error)]
pub enum AuthorizationError {
    /// The token endpoint answered with a non-success status.
    #[error("failed to authorize: token endpoint returned status {0}")]
    Rejected(u16),

    /// The exchange request could not be sent or its response not read.
    #[error("failed to authorize: {0}")]
    Network(String),

    /// The token endpoint answered with a body that is not a token grant.
    #[error("failed to authorize: malformed token response: {0}")]
    MalformedResponse(String),
}

impl AuthorizationError {
    /// Create a new Network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Create a new MalformedResponse error
    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }
}

/// Error type for API request operations
#[derive(Debug, Error)]
pub enum HttpError {
    /// The request completed with a non-success status outside the single
    /// handled 401 retry.
    #[error("failed to send request: {status} {status_text}")]
    Status { status: u16, status_text: String },

    /// Token acquisition failed before the request could be sent.
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    /// Connection-level failure, surfaced unchanged.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body could not be decoded as JSON.
    #[error("JSON decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The request path could not be joined onto the base address.
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// A caller-supplied header name or value is not valid HTTP.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

impl HttpError {
    /// Create a new Status error
    pub fn status(status: u16, status_text: impl Into<String>) -> Self {
        Self::Status {
            status,
            status_text: status_text.into(),
        }
    }

    /// Create a new InvalidHeader error
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader(message.into())
    }

    /// The HTTP status of a classified non-success response, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Convenience result type for request operations
pub type Result<T> = std::result::Result<T, HttpError>;
