//! OAuth 2.0 error responses shared by the introspection and revocation
//! endpoints.
//!
//! Both endpoints answer failures with the RFC 6749 Section 5.2 body shape:
//!
//! ```json
//! {"error": "invalid_client", "error_description": "Client authentication failed"}
//! ```
//!
//! [`OAuthErrorResponse`] is the only place where an error code is paired
//! with an HTTP status, so the two handlers cannot drift apart.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::AuthError;

/// OAuth 2.0 error codes used by the token endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthErrorCode {
    /// The request is missing a required parameter or is otherwise malformed.
    InvalidRequest,

    /// Client authentication failed.
    InvalidClient,

    /// The server hit an unexpected condition.
    ServerError,
}

impl OAuthErrorCode {
    /// Returns the error code as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::ServerError => "server_error",
        }
    }

    /// Default HTTP status for this error code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::InvalidClient => StatusCode::UNAUTHORIZED,
            Self::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for OAuthErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An OAuth 2.0 error response.
#[derive(Debug, Clone, Serialize)]
pub struct OAuthErrorResponse {
    #[serde(skip)]
    status: StatusCode,

    /// The error code.
    pub error: OAuthErrorCode,

    /// Optional human-readable error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl OAuthErrorResponse {
    /// Creates a new error response with the code's default status.
    #[must_use]
    pub fn new(error: OAuthErrorCode) -> Self {
        Self {
            status: error.status(),
            error,
            error_description: None,
        }
    }

    /// Creates a new error response with a description.
    #[must_use]
    pub fn with_description(error: OAuthErrorCode, description: impl Into<String>) -> Self {
        Self::new(error).description(description)
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.error_description = Some(description.into());
        self
    }

    /// Overrides the HTTP status.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Creates an `invalid_request` error.
    #[must_use]
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::with_description(OAuthErrorCode::InvalidRequest, description)
    }

    /// Creates an `invalid_client` error.
    #[must_use]
    pub fn invalid_client(description: impl Into<String>) -> Self {
        Self::with_description(OAuthErrorCode::InvalidClient, description)
    }

    /// Creates a `server_error` with a generic description.
    #[must_use]
    pub fn server_error() -> Self {
        Self::with_description(
            OAuthErrorCode::ServerError,
            "The server encountered an unexpected condition",
        )
    }

    /// A request whose body is not `application/x-www-form-urlencoded`.
    #[must_use]
    pub fn unsupported_media_type() -> Self {
        Self::invalid_request("Content-Type must be application/x-www-form-urlencoded")
            .with_status(StatusCode::UNSUPPORTED_MEDIA_TYPE)
    }

    /// The HTTP status this response is sent with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl std::fmt::Display for OAuthErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error.as_str())?;
        if let Some(ref desc) = self.error_description {
            write!(f, ": {}", desc)?;
        }
        Ok(())
    }
}

impl std::error::Error for OAuthErrorResponse {}

impl From<AuthError> for OAuthErrorResponse {
    fn from(err: AuthError) -> Self {
        if err.is_server_error() {
            tracing::error!(
                error = %err,
                category = %err.category(),
                "Token endpoint failed on infrastructure error"
            );
            return Self::server_error();
        }

        let description = match &err {
            AuthError::InvalidClient { message } | AuthError::InvalidRequest { message } => {
                message.clone()
            }
            _ => err.to_string(),
        };

        Self::with_description(err.oauth_error_code(), description)
    }
}

impl IntoResponse for OAuthErrorResponse {
    fn into_response(self) -> Response {
        let status = self.status;
        let mut response = (status, Json(self)).into_response();

        // RFC 6749 Section 5.2
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"oauth\""),
            );
        }
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

        response
    }
}
