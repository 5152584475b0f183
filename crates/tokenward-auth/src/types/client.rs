//! OAuth client domain type.

use serde::{Deserialize, Serialize};

/// How far a client can be trusted with a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    /// Can protect a secret; must authenticate with it.
    Confidential,
    /// Cannot protect a secret; identifies itself by `client_id` alone.
    Public,
}

impl ClientType {
    /// Returns the client type as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confidential => "confidential",
            Self::Public => "public",
        }
    }

    /// Parses a stored client type.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "confidential" => Some(Self::Confidential),
            "public" => Some(Self::Public),
            _ => None,
        }
    }
}

impl std::fmt::Display for ClientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered OAuth client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// Unique client identifier used in OAuth flows.
    pub client_id: String,

    /// Argon2 PHC hash of the client secret (confidential clients only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_hash: Option<String>,

    /// Trust model of the client.
    pub client_type: ClientType,

    /// Whether the client may currently authenticate.
    pub is_active: bool,
}

impl Client {
    /// Builds an active confidential client.
    #[must_use]
    pub fn confidential(client_id: impl Into<String>, secret_hash: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            secret_hash: Some(secret_hash.into()),
            client_type: ClientType::Confidential,
            is_active: true,
        }
    }

    /// Builds an active public client.
    #[must_use]
    pub fn public(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            secret_hash: None,
            client_type: ClientType::Public,
            is_active: true,
        }
    }

    /// Returns `true` for confidential clients.
    #[must_use]
    pub fn is_confidential(&self) -> bool {
        self.client_type == ClientType::Confidential
    }
}
