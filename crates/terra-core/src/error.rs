use thiserror::Error;

/// Result type for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;

/// Errors raised while validating core values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid country code: {0}")]
    InvalidCountryCode(String),
    #[error("unknown region: {0}")]
    InvalidRegion(String),
}

/// Failure talking to the upstream API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// The API answered with a non-2xx status.
    #[error("HTTP error! status: {status}")]
    Status { status: u16 },
    /// The request never produced a response.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Errors produced by a fetch, captured per request and exposed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] NetworkError),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// A programming error: an empty key or a key reused for another payload type.
    #[error("invalid fetch key: {0}")]
    InvalidKey(String),
}

impl FetchError {
    /// Returns the HTTP status if the upstream rejected the request.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Network(NetworkError::Status { status }) => Some(*status),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, FetchError::Network(_))
    }
}

impl From<CoreError> for FetchError {
    fn from(value: CoreError) -> Self {
        Self::InvalidKey(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_exposed_for_http_failures() {
        let err = FetchError::from(NetworkError::Status { status: 404 });
        assert_eq!(err.status(), Some(404));
        assert!(err.is_network());
        assert_eq!(err.to_string(), "network error: HTTP error! status: 404");
    }

    #[test]
    fn transport_failures_have_no_status() {
        let err = FetchError::from(NetworkError::Transport("connection reset".into()));
        assert_eq!(err.status(), None);
        assert!(err.is_network());
    }
}
