use axum::{
    BoxError,
    body::Body,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokenward_auth::OAuthErrorResponse;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Propagates `x-request-id`, generating one when the caller sent none.
///
/// The value is also stored in the request extensions for the trace span.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static(REQUEST_ID_HEADER);

    let req_id_value = req
        .headers()
        .get(&header_name)
        .cloned()
        .unwrap_or_else(new_request_id);

    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;
    res.headers_mut().insert(header_name, req_id_value);
    res
}

fn new_request_id() -> HeaderValue {
    HeaderValue::try_from(Uuid::new_v4().to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}

/// Converts errors from the `tower` timeout layer into OAuth error bodies.
pub async fn handle_timeout_error(err: BoxError) -> Response {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::error!("request deadline exceeded");
        OAuthErrorResponse::server_error()
            .description("The request did not complete in time")
            .with_status(StatusCode::SERVICE_UNAVAILABLE)
            .into_response()
    } else {
        tracing::error!(error = %err, "unhandled middleware error");
        OAuthErrorResponse::server_error().into_response()
    }
}
