//! Shared setup for token service tests.

use std::sync::Arc;

use time::Duration;
use uuid::Uuid;

use super::introspection::IntrospectionService;
use super::jwt::{JwtService, SigningAlgorithm, SigningKey, TokenClaims};
use super::revocation::RevocationService;
use super::verifier::{TokenVerifier, hash_token};
use crate::audit::MemoryAuditSink;
use crate::clock::{Clock, FixedClock};
use crate::storage::MemoryStore;
use crate::types::{AccessTokenRecord, Client, RefreshTokenRecord};

pub(crate) const ISSUER: &str = "https://auth.example.com";

pub(crate) struct Fixture {
    pub clock: Arc<FixedClock>,
    pub store: Arc<MemoryStore>,
    pub verifier: Arc<TokenVerifier>,
    pub audit: Arc<MemoryAuditSink>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        let clock = Arc::new(FixedClock::at_now());
        let access =
            SigningKey::from_secret(SigningAlgorithm::HS256, b"access-secret-access-secret-0000")
                .unwrap();
        let refresh =
            SigningKey::from_secret(SigningAlgorithm::HS256, b"refresh-secret-refresh-secret-00")
                .unwrap();
        let verifier = TokenVerifier::new(
            JwtService::new(access, ISSUER),
            JwtService::new(refresh, ISSUER),
            clock.clone(),
        );

        Self {
            clock,
            store: Arc::new(store),
            verifier: Arc::new(verifier),
            audit: Arc::new(MemoryAuditSink::new()),
        }
    }

    pub fn client(&self, client_id: &str) -> Client {
        Client::public(client_id)
    }

    pub fn introspection(&self) -> IntrospectionService {
        IntrospectionService::new(
            self.verifier.clone(),
            self.store.clone(),
            self.store.clone(),
            self.clock.clone(),
        )
    }

    pub fn revocation(&self) -> RevocationService {
        RevocationService::new(
            self.store.clone(),
            self.store.clone(),
            self.audit.clone(),
            self.clock.clone(),
        )
    }

    fn claims(
        &self,
        jti: Option<&str>,
        client_id: Option<&str>,
        user_id: Option<&str>,
        lifetime: Duration,
    ) -> TokenClaims {
        let mut builder = TokenClaims::builder(user_id.or(client_id).unwrap_or("anonymous"))
            .issuer(ISSUER)
            .scope("read write")
            .username("alice")
            .permissions(vec!["tokens:read".to_string()])
            .issued_at(self.clock.now(), lifetime);
        if let Some(jti) = jti {
            builder = builder.jti(jti);
        }
        if let Some(client_id) = client_id {
            builder = builder.client_id(client_id);
        }
        builder.build()
    }

    /// Signs an access token without storing a row.
    pub fn sign_access(
        &self,
        jti: Option<&str>,
        client_id: &str,
        user_id: Option<&str>,
        lifetime: Duration,
    ) -> String {
        let claims = self.claims(jti, Some(client_id), user_id, lifetime);
        self.verifier.access().encode(&claims).unwrap()
    }

    pub fn access_token(
        &self,
        jti: Option<&str>,
        client_id: &str,
        user_id: Option<&str>,
        lifetime: Duration,
    ) -> (String, AccessTokenRecord) {
        self.access_token_with(jti, Some(client_id), client_id, user_id, lifetime)
    }

    /// Issues an access token whose `client_id` claim and row may disagree.
    pub fn access_token_with(
        &self,
        jti: Option<&str>,
        claim_client_id: Option<&str>,
        row_client_id: &str,
        user_id: Option<&str>,
        lifetime: Duration,
    ) -> (String, AccessTokenRecord) {
        let claims = self.claims(jti, claim_client_id, user_id, lifetime);
        let raw = self.verifier.access().encode(&claims).unwrap();
        let now = self.clock.now();

        let record = AccessTokenRecord {
            id: Uuid::new_v4(),
            token_hash: hash_token(&raw),
            jti: jti.map(str::to_string),
            client_id: row_client_id.to_string(),
            user_id: user_id.map(str::to_string),
            scope: "read write".to_string(),
            expires_at: now + lifetime,
            created_at: now,
        };
        self.store.insert_access_token(record.clone()).unwrap();
        (raw, record)
    }

    pub fn refresh_token(
        &self,
        jti: Option<&str>,
        client_id: &str,
        user_id: Option<&str>,
        lifetime: Duration,
    ) -> (String, RefreshTokenRecord) {
        let claims = self.claims(jti, Some(client_id), user_id, lifetime);
        let raw = self.verifier.refresh().encode(&claims).unwrap();
        let now = self.clock.now();

        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            token_hash: hash_token(&raw),
            jti: jti.map(str::to_string),
            client_id: client_id.to_string(),
            user_id: user_id.map(str::to_string),
            scope: "read write".to_string(),
            expires_at: now + lifetime,
            is_revoked: false,
            revoked_at: None,
            created_at: now,
        };
        self.store.insert_refresh_token(record.clone()).unwrap();
        (raw, record)
    }
}
