//! OAuth 2.0 client authentication and error responses.

pub mod client_auth;
pub mod client_secret;
pub mod error;

pub use client_auth::{
    AuthenticatedClient, ClientAuthMethod, ClientCredentials, authenticate_client,
    parse_basic_auth,
};
pub use error::{OAuthErrorCode, OAuthErrorResponse};
