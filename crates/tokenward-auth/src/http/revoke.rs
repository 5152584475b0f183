//! Token revocation endpoint handler (RFC 7009).
//!
//! # Request Format
//!
//! ```text
//! POST /oauth/revoke
//! Content-Type: application/x-www-form-urlencoded
//! Authorization: Basic <client_credentials>
//!
//! token=<token_to_revoke>&token_type_hint=refresh_token
//! ```
//!
//! # Response
//!
//! Once the client has authenticated, the endpoint returns 200 OK with an
//! empty body whether or not anything was revoked. Only a store failure
//! breaks that rule, as a 500.

use axum::{
    Form,
    extract::{State, rejection::FormRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use super::{OAuthState, TokenForm, extract_audit_source, form_rejection};
use crate::oauth::client_auth::authenticate_client;
use crate::oauth::error::OAuthErrorResponse;
use crate::token::revocation::RevocationRequest;

/// Token revocation endpoint handler.
///
/// # Order of Checks
///
/// 1. Body must be a form (`415` otherwise)
/// 2. Client must authenticate (`401 invalid_client`, or `400` for a public
///    client that sent a secret)
/// 3. `token` must be present (`400 invalid_request`)
/// 4. Revocation; unknown, foreign and already revoked tokens are `200`
///
/// # Response
///
/// - 200 OK: empty body
/// - 400 Bad Request: Missing token parameter
/// - 401 Unauthorized: Invalid client credentials
/// - 415 Unsupported Media Type: Body is not form-encoded
/// - 500 Internal Server Error: Revocation could not be committed
pub async fn revoke_handler(
    State(state): State<OAuthState>,
    headers: HeaderMap,
    form: Result<Form<TokenForm>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => return form_rejection(rejection).into_response(),
    };

    let client =
        match authenticate_client(&form.credentials(&headers), state.client_storage.as_ref()).await
        {
            Ok(authenticated) => authenticated.client,
            Err(e) => {
                tracing::debug!(error = %e, "Revocation: client authentication failed");
                return OAuthErrorResponse::from(e).into_response();
            }
        };

    let token = match form.token() {
        Ok(token) => token,
        Err(error) => return error.into_response(),
    };

    let request = RevocationRequest {
        token: token.to_string(),
        token_type_hint: form.hint(),
    };
    let source = extract_audit_source(&headers);

    match state.revocation.revoke(&request, &client, &source).await {
        Ok(_) => {
            let mut response = StatusCode::OK.into_response();
            response
                .headers_mut()
                .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
            response
        }
        Err(e) => OAuthErrorResponse::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use time::Duration;
    use tower::ServiceExt;

    use super::*;
    use crate::http::{REVOKE_PATH, router};
    use crate::storage::RevokedTokenStorage;
    use crate::token::fixtures::Fixture;
    use crate::types::Client;

    fn app(fx: &Fixture) -> axum::Router {
        fx.store.insert_client(Client::public("c1")).unwrap();
        router(OAuthState::new(
            Arc::new(fx.introspection()),
            Arc::new(fx.revocation()),
            fx.store.clone(),
        ))
    }

    fn form_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(REVOKE_PATH)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_revoke_returns_empty_200() {
        let fx = Fixture::new();
        let (raw, _) = fx.access_token(Some("abc"), "c1", Some("u1"), Duration::hours(1));

        let response = app(&fx)
            .oneshot(form_request(&format!("token={raw}&client_id=c1")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_bytes(response).await.is_empty());
        assert!(fx.store.is_revoked("abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_client_checked_before_token() {
        let fx = Fixture::new();

        let response = app(&fx)
            .oneshot(form_request("client_id=nobody"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_token_after_auth() {
        let fx = Fixture::new();

        let response = app(&fx).oneshot(form_request("client_id=c1")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_store_failure_is_500() {
        let fx = Fixture::new();
        let app = app(&fx);
        fx.store.set_unavailable(true);

        let response = app
            .oneshot(form_request("token=abc&client_id=c1"))
            .await
            .unwrap();

        // client lookup itself hits the store
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
