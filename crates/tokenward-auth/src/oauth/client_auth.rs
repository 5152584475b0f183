//! Client authentication for the introspection and revocation endpoints.
//!
//! # Authentication Methods
//!
//! - `client_secret_basic` - HTTP Basic Auth with client_id:client_secret
//! - `client_secret_post` - client_id and client_secret in request body
//! - `none` - public clients identify themselves with client_id alone
//!
//! # Precedence
//!
//! Basic credentials override `client_id`/`client_secret` in the body. A
//! non-Basic `Authorization` header is ignored; a Basic header that cannot
//! be decoded is an authentication failure.
//!
//! # Client Types
//!
//! Confidential clients must present a secret, verified against the stored
//! Argon2 hash in constant time. A public client that presents any secret is
//! rejected with `invalid_request` rather than silently accepted.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::client_secret::verify_client_secret;
use crate::storage::ClientStorage;
use crate::types::Client;

/// The one description every rejected client sees, whatever the reason.
pub const CLIENT_AUTH_FAILED: &str = "Client authentication failed";

/// Logs why `client_id` was rejected and returns the uniform error.
fn reject(client_id: &str, reason: &'static str) -> AuthError {
    tracing::info!(client_id = %client_id, reason, "Client authentication failed");
    AuthError::invalid_client(CLIENT_AUTH_FAILED)
}

/// Result of successful client authentication.
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    /// The authenticated client.
    pub client: Client,

    /// The authentication method used.
    pub auth_method: ClientAuthMethod,
}

/// Client authentication methods accepted by the token endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
    /// No client authentication (public clients).
    None,

    /// Client secret via HTTP Basic Auth.
    ClientSecretBasic,

    /// Client secret in request body.
    ClientSecretPost,
}

impl ClientAuthMethod {
    /// Returns the string representation of the auth method.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
        }
    }
}

impl fmt::Display for ClientAuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw credentials as they arrived on the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientCredentials<'a> {
    /// Value of the `Authorization` header.
    pub authorization: Option<&'a str>,

    /// `client_id` form field.
    pub client_id: Option<&'a str>,

    /// `client_secret` form field.
    pub client_secret: Option<&'a str>,
}

/// Authenticates the calling client.
///
/// # Errors
///
/// Returns `InvalidClient` if:
/// - No client credentials are provided
/// - The Basic header is malformed
/// - The client is unknown or inactive
/// - A confidential client omits its secret or presents a wrong one
///
/// Returns `InvalidRequest` if a public client presents a secret.
///
/// Returns `Storage`/`Internal` on infrastructure failures.
///
/// # Example
///
/// ```ignore
/// let credentials = ClientCredentials {
///     authorization: headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
///     client_id: form.client_id.as_deref(),
///     client_secret: form.client_secret.as_deref(),
/// };
/// let authenticated = authenticate_client(&credentials, client_storage.as_ref()).await?;
/// ```
pub async fn authenticate_client(
    credentials: &ClientCredentials<'_>,
    client_storage: &dyn ClientStorage,
) -> AuthResult<AuthenticatedClient> {
    let basic = match credentials.authorization {
        Some(header) if is_basic_scheme(header) => Some(
            parse_basic_auth(header)
                .ok_or_else(|| AuthError::invalid_client("Malformed Basic credentials"))?,
        ),
        _ => None,
    };

    let (client_id, client_secret, method) = match &basic {
        Some((client_id, client_secret)) => {
            if let Some(body_id) = credentials.client_id
                && body_id != client_id
            {
                tracing::debug!(
                    basic_client_id = %client_id,
                    body_client_id = %body_id,
                    "Basic credentials override body client_id"
                );
            }
            (
                client_id.as_str(),
                non_empty(Some(client_secret.as_str())),
                ClientAuthMethod::ClientSecretBasic,
            )
        }
        None => (
            credentials.client_id.unwrap_or_default(),
            non_empty(credentials.client_secret),
            ClientAuthMethod::ClientSecretPost,
        ),
    };

    if client_id.is_empty() {
        return Err(AuthError::invalid_client("No client credentials provided"));
    }

    let client = client_storage
        .find_by_client_id(client_id)
        .await?
        .ok_or_else(|| reject(client_id, "unknown client"))?;

    if !client.is_active {
        return Err(reject(client_id, "client is inactive"));
    }

    if !client.is_confidential() {
        if client_secret.is_some() {
            return Err(AuthError::invalid_request(
                "Public clients must not send a client_secret",
            ));
        }
        return Ok(AuthenticatedClient {
            client,
            auth_method: ClientAuthMethod::None,
        });
    }

    let secret =
        client_secret.ok_or_else(|| reject(client_id, "confidential client sent no secret"))?;

    verify_secret(&client, secret).await?;

    Ok(AuthenticatedClient {
        client,
        auth_method: method,
    })
}

/// Checks `secret` against the client's stored hash off the async runtime.
async fn verify_secret(client: &Client, secret: &str) -> AuthResult<()> {
    let Some(hash) = client.secret_hash.clone() else {
        tracing::warn!(
            client_id = %client.client_id,
            "Confidential client has no secret hash configured"
        );
        return Err(AuthError::invalid_client(CLIENT_AUTH_FAILED));
    };

    let secret = secret.to_string();
    let verified = tokio::task::spawn_blocking(move || verify_client_secret(&secret, &hash))
        .await
        .map_err(|e| AuthError::internal(format!("Secret verification task failed: {}", e)))?;

    match verified {
        Ok(true) => Ok(()),
        Ok(false) => Err(reject(&client.client_id, "client secret mismatch")),
        Err(e) => {
            tracing::warn!(
                client_id = %client.client_id,
                error = %e,
                "Stored client secret hash is not a valid PHC string"
            );
            Err(AuthError::invalid_client(CLIENT_AUTH_FAILED))
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn is_basic_scheme(header_value: &str) -> bool {
    header_value
        .trim_start()
        .split_once(' ')
        .is_some_and(|(scheme, _)| scheme.eq_ignore_ascii_case("basic"))
}

/// Parses HTTP Basic Auth header value.
///
/// Returns `(client_id, client_secret)` if the header is valid Basic auth.
/// The secret may contain colons; only the first colon separates the pair.
#[must_use]
pub fn parse_basic_auth(header_value: &str) -> Option<(String, String)> {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    let (scheme, encoded) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    let (client_id, client_secret) = credentials.split_once(':')?;

    Some((client_id.to_string(), client_secret.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::client_secret::hash_client_secret;
    use crate::storage::MemoryStore;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    const SECRET: &str = "confidential-secret";

    fn basic(id: &str, secret: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{id}:{secret}")))
    }

    fn storage() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_client(Client::confidential(
                "svc",
                hash_client_secret(SECRET).unwrap(),
            ))
            .unwrap();
        store.insert_client(Client::public("spa")).unwrap();

        let mut inactive = Client::public("retired");
        inactive.is_active = false;
        store.insert_client(inactive).unwrap();
        store
    }

    #[tokio::test]
    async fn test_confidential_basic() {
        let store = storage();
        let header = basic("svc", SECRET);
        let credentials = ClientCredentials {
            authorization: Some(&header),
            ..Default::default()
        };

        let result = authenticate_client(&credentials, &store).await.unwrap();
        assert_eq!(result.client.client_id, "svc");
        assert_eq!(result.auth_method, ClientAuthMethod::ClientSecretBasic);
    }

    #[tokio::test]
    async fn test_confidential_post() {
        let store = storage();
        let credentials = ClientCredentials {
            client_id: Some("svc"),
            client_secret: Some(SECRET),
            ..Default::default()
        };

        let result = authenticate_client(&credentials, &store).await.unwrap();
        assert_eq!(result.auth_method, ClientAuthMethod::ClientSecretPost);
    }

    #[tokio::test]
    async fn test_basic_overrides_body() {
        let store = storage();
        let header = basic("svc", SECRET);
        let credentials = ClientCredentials {
            authorization: Some(&header),
            client_id: Some("spa"),
            client_secret: Some("ignored"),
        };

        let result = authenticate_client(&credentials, &store).await.unwrap();
        assert_eq!(result.client.client_id, "svc");
    }

    #[tokio::test]
    async fn test_wrong_secret() {
        let store = storage();
        let header = basic("svc", "wrong");
        let credentials = ClientCredentials {
            authorization: Some(&header),
            ..Default::default()
        };

        let result = authenticate_client(&credentials, &store).await;
        assert!(matches!(result, Err(AuthError::InvalidClient { .. })));
    }

    #[tokio::test]
    async fn test_confidential_without_secret() {
        let store = storage();
        let credentials = ClientCredentials {
            client_id: Some("svc"),
            ..Default::default()
        };

        let result = authenticate_client(&credentials, &store).await;
        assert!(matches!(result, Err(AuthError::InvalidClient { .. })));
    }

    #[tokio::test]
    async fn test_public_client_id_only() {
        let store = storage();
        let credentials = ClientCredentials {
            client_id: Some("spa"),
            ..Default::default()
        };

        let result = authenticate_client(&credentials, &store).await.unwrap();
        assert_eq!(result.client.client_id, "spa");
        assert_eq!(result.auth_method, ClientAuthMethod::None);
    }

    #[tokio::test]
    async fn test_public_client_with_body_secret_is_invalid_request() {
        let store = storage();
        let credentials = ClientCredentials {
            client_id: Some("spa"),
            client_secret: Some("anything"),
            ..Default::default()
        };

        let result = authenticate_client(&credentials, &store).await;
        assert!(matches!(result, Err(AuthError::InvalidRequest { .. })));
    }

    #[tokio::test]
    async fn test_public_client_with_basic_secret_is_invalid_request() {
        let store = storage();
        let header = basic("spa", "anything");
        let credentials = ClientCredentials {
            authorization: Some(&header),
            ..Default::default()
        };

        let result = authenticate_client(&credentials, &store).await;
        assert!(matches!(result, Err(AuthError::InvalidRequest { .. })));
    }

    #[tokio::test]
    async fn test_public_client_basic_empty_secret() {
        let store = storage();
        let header = basic("spa", "");
        let credentials = ClientCredentials {
            authorization: Some(&header),
            ..Default::default()
        };

        let result = authenticate_client(&credentials, &store).await.unwrap();
        assert_eq!(result.auth_method, ClientAuthMethod::None);
    }

    #[tokio::test]
    async fn test_unknown_and_inactive_clients() {
        let store = storage();
        for id in ["nobody", "retired"] {
            let credentials = ClientCredentials {
                client_id: Some(id),
                ..Default::default()
            };
            let result = authenticate_client(&credentials, &store).await;
            assert!(matches!(result, Err(AuthError::InvalidClient { .. })));
        }
    }

    #[tokio::test]
    async fn test_rejections_share_one_description() {
        let store = storage();
        let wrong_secret = basic("svc", "wrong");
        let cases = [
            ClientCredentials {
                client_id: Some("nobody"),
                ..Default::default()
            },
            ClientCredentials {
                client_id: Some("retired"),
                ..Default::default()
            },
            ClientCredentials {
                client_id: Some("svc"),
                ..Default::default()
            },
            ClientCredentials {
                authorization: Some(&wrong_secret),
                ..Default::default()
            },
        ];

        for credentials in cases {
            match authenticate_client(&credentials, &store).await {
                Err(AuthError::InvalidClient { message }) => {
                    assert_eq!(message, CLIENT_AUTH_FAILED, "{credentials:?}");
                }
                other => panic!("expected InvalidClient, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_no_credentials() {
        let store = storage();
        let result = authenticate_client(&ClientCredentials::default(), &store).await;
        assert!(matches!(result, Err(AuthError::InvalidClient { .. })));
    }

    #[tokio::test]
    async fn test_malformed_basic_header() {
        let store = storage();
        let credentials = ClientCredentials {
            authorization: Some("Basic !!!not-base64!!!"),
            client_id: Some("spa"),
            ..Default::default()
        };

        let result = authenticate_client(&credentials, &store).await;
        assert!(matches!(result, Err(AuthError::InvalidClient { .. })));
    }

    #[tokio::test]
    async fn test_bearer_header_ignored() {
        let store = storage();
        let credentials = ClientCredentials {
            authorization: Some("Bearer some-token"),
            client_id: Some("spa"),
            ..Default::default()
        };

        let result = authenticate_client(&credentials, &store).await.unwrap();
        assert_eq!(result.client.client_id, "spa");
    }

    #[tokio::test]
    async fn test_storage_failure_propagates() {
        let store = storage();
        store.set_unavailable(true);
        let credentials = ClientCredentials {
            client_id: Some("spa"),
            ..Default::default()
        };

        let result = authenticate_client(&credentials, &store).await;
        assert!(matches!(result, Err(AuthError::Storage { .. })));
    }

    #[test]
    fn test_parse_basic_auth() {
        let header = basic("my_client", "my_secret");
        let (id, secret) = parse_basic_auth(&header).unwrap();
        assert_eq!(id, "my_client");
        assert_eq!(secret, "my_secret");
    }

    #[test]
    fn test_parse_basic_auth_with_colon_in_password() {
        let header = basic("client", "pass:word:with:colons");
        let (id, secret) = parse_basic_auth(&header).unwrap();
        assert_eq!(id, "client");
        assert_eq!(secret, "pass:word:with:colons");
    }

    #[test]
    fn test_parse_basic_auth_scheme_case_insensitive() {
        let header = basic("client", "secret").replacen("Basic", "basic", 1);
        assert!(parse_basic_auth(&header).is_some());
    }

    #[test]
    fn test_parse_basic_auth_invalid() {
        assert!(parse_basic_auth("Bearer token").is_none());
        assert!(parse_basic_auth("Basic !!!invalid!!!").is_none());
        // no colon
        let header = format!("Basic {}", STANDARD.encode("nocolon"));
        assert!(parse_basic_auth(&header).is_none());
    }
}
