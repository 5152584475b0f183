//! Token introspection endpoint handler (RFC 7662).
//!
//! # Request Format
//!
//! ```text
//! POST /oauth/introspect
//! Content-Type: application/x-www-form-urlencoded
//! Authorization: Basic <client_credentials>
//!
//! token=<token_to_introspect>&token_type_hint=access_token
//! ```
//!
//! # Response
//!
//! Returns JSON with `active: true/false` and metadata if active.

use axum::{
    Form, Json,
    extract::{State, rejection::FormRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use super::{OAuthState, TokenForm, form_rejection};
use crate::oauth::client_auth::authenticate_client;
use crate::oauth::error::OAuthErrorResponse;
use crate::token::introspection::IntrospectionRequest;

/// Token introspection endpoint handler.
///
/// # Order of Checks
///
/// 1. Body must be a form (`415` otherwise)
/// 2. `token` must be present (`400 invalid_request`)
/// 3. Client must authenticate (`401 invalid_client`, or `400` for a public
///    client that sent a secret)
/// 4. Introspection; every token-state outcome is `200`
///
/// # Response
///
/// - 200 OK with JSON body: `{"active": true, ...}` or `{"active": false}`
/// - 400 Bad Request: Missing token parameter
/// - 401 Unauthorized: Invalid client credentials
/// - 415 Unsupported Media Type: Body is not form-encoded
/// - 500 Internal Server Error: Token store unreachable
pub async fn introspect_handler(
    State(state): State<OAuthState>,
    headers: HeaderMap,
    form: Result<Form<TokenForm>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => return form_rejection(rejection).into_response(),
    };

    let token = match form.token() {
        Ok(token) => token,
        Err(error) => return error.into_response(),
    };

    let authenticated =
        match authenticate_client(&form.credentials(&headers), state.client_storage.as_ref()).await
        {
            Ok(authenticated) => authenticated,
            Err(e) => {
                tracing::debug!(error = %e, "Introspection: client authentication failed");
                return OAuthErrorResponse::from(e).into_response();
            }
        };

    let request = IntrospectionRequest {
        token: token.to_string(),
        token_type_hint: form.hint(),
    };

    match state.introspection.introspect(&request).await {
        Ok(response) => {
            tracing::debug!(
                client_id = %authenticated.client.client_id,
                active = response.active,
                "Token introspection completed"
            );
            let mut http = (StatusCode::OK, Json(response)).into_response();
            http.headers_mut()
                .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
            http
        }
        Err(e) => OAuthErrorResponse::from(e).into_response(),
    }
}
