//! Client error taxonomy.
//!
//! Transport failures, classified HTTP errors, backend-reported validation
//! failures and local decode problems all end up in `ClientError`. Messages
//! coming from the backend are carried verbatim so the UI can show them.

use reqwest::StatusCode;

/// Non-2xx response from the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HttpError {
    pub status: u16,
    pub message: String,
}

impl HttpError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Fallback when the error body carries no envelope message.
    pub fn from_status(status: StatusCode) -> Self {
        let reason = status.canonical_reason().unwrap_or("Unknown status");
        Self::new(status.as_u16(), format!("HTTP {}: {}", status.as_u16(), reason))
    }

    pub fn is_authentication_error(&self) -> bool {
        self.status == 401
    }

    pub fn is_authorization_error(&self) -> bool {
        self.status == 403
    }

    pub fn is_not_found_error(&self) -> bool {
        self.status == 404
    }

    pub fn is_rate_limit_error(&self) -> bool {
        self.status == 429
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error(transparent)]
    Http(#[from] HttpError),
    /// 2xx envelope with `success: false`.
    #[error("{0}")]
    Api(String),
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("response envelope carried no data")]
    MissingData,
    #[error("invalid API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("{0}")]
    Validation(String),
    #[error("session expired, please log in again")]
    SessionExpired,
}

impl ClientError {
    pub fn http(&self) -> Option<&HttpError> {
        match self {
            ClientError::Http(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_authentication_error(&self) -> bool {
        self.http().is_some_and(HttpError::is_authentication_error)
    }

    pub fn is_authorization_error(&self) -> bool {
        self.http().is_some_and(HttpError::is_authorization_error)
    }

    pub fn is_not_found_error(&self) -> bool {
        self.http().is_some_and(HttpError::is_not_found_error)
    }

    pub fn is_rate_limit_error(&self) -> bool {
        self.http().is_some_and(HttpError::is_rate_limit_error)
    }

    pub fn is_server_error(&self) -> bool {
        self.http().is_some_and(HttpError::is_server_error)
    }
}
