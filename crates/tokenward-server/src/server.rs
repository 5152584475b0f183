use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, error_handling::HandleErrorLayer, extract::DefaultBodyLimit, middleware, routing::get};
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use tokenward_auth::audit::{AuditSink, NoopAuditSink, TracingAuditSink};
use tokenward_auth::config::AuditConfig;
use tokenward_auth::http::{OAuthState, router as oauth_router};
use tokenward_auth::{
    AuthResult, Clock, ClientStorage, IntrospectionService, MemoryStore, RevocationService,
    RevokedTokenStorage, StorageHealth, SystemClock, TokenStorage, TokenVerifier,
};
use tokenward_auth_postgres::{
    ArcClientStorage, ArcRevokedTokenStorage, ArcTokenStorage, PostgresAuditSink,
    PostgresAuthStorage, PostgresOptions,
};

use crate::config::{AppConfig, StorageBackend};
use crate::handlers::{self, HealthState};
use crate::maintenance::spawn_blacklist_purge;
use crate::middleware as app_middleware;

/// Storage and audit collaborators shared by every request.
#[derive(Clone)]
pub struct Backends {
    pub clients: Arc<dyn ClientStorage>,
    pub tokens: Arc<dyn TokenStorage>,
    pub blacklist: Arc<dyn RevokedTokenStorage>,
    pub health: Arc<dyn StorageHealth>,
    pub audit: Arc<dyn AuditSink>,
}

impl Backends {
    /// In-process tables; audit events go to the `audit` tracing target.
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            clients: store.clone(),
            tokens: store.clone(),
            blacklist: store.clone(),
            health: store,
            audit: Arc::new(TracingAuditSink),
        }
    }

    /// PostgreSQL tables; audit events go to `audit_log`.
    pub fn postgres(storage: PostgresAuthStorage) -> Self {
        let pool = storage.pool_arc();
        Self {
            clients: Arc::new(ArcClientStorage::new(pool.clone())),
            tokens: Arc::new(ArcTokenStorage::new(pool.clone())),
            blacklist: Arc::new(ArcRevokedTokenStorage::new(pool.clone())),
            audit: Arc::new(PostgresAuditSink::new(pool)),
            health: Arc::new(storage),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Replaces the audit sink with a no-op when revocations are not audited.
    pub fn apply_audit_config(self, audit: &AuditConfig) -> Self {
        if audit.enabled && audit.log_token_operations {
            self
        } else {
            tracing::info!("token operation auditing disabled");
            self.with_audit(Arc::new(NoopAuditSink))
        }
    }
}

pub fn build_app(cfg: &AppConfig, backends: &Backends, clock: Arc<dyn Clock>) -> AuthResult<Router> {
    let verifier = Arc::new(TokenVerifier::from_config(&cfg.auth, clock.clone())?);
    let introspection = Arc::new(IntrospectionService::new(
        verifier,
        backends.tokens.clone(),
        backends.blacklist.clone(),
        clock.clone(),
    ));
    let revocation = Arc::new(RevocationService::new(
        backends.tokens.clone(),
        backends.blacklist.clone(),
        backends.audit.clone(),
        clock,
    ));
    let oauth = OAuthState::new(introspection, revocation, backends.clients.clone());

    let health = Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .with_state(HealthState {
            storage: backends.health.clone(),
        });

    // Innermost first: deadline -> body limit -> trace -> request id
    Ok(oauth_router(oauth)
        .merge(health)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(app_middleware::handle_timeout_error))
                .timeout(cfg.server.request_timeout),
        )
        .layer(DefaultBodyLimit::max(cfg.server.body_limit_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri().path(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: std::time::Duration, span: &tracing::Span| {
                        span.record("http.status_code", tracing::field::display(res.status().as_u16()));
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(app_middleware::request_id)))
}

pub struct TokenwardServer {
    addr: SocketAddr,
    app: Router,
    purge: JoinHandle<()>,
}

pub struct ServerBuilder {
    config: AppConfig,
    clock: Arc<dyn Clock>,
    backends: Option<Backends>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            clock: Arc::new(SystemClock),
            backends: None,
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Skips backend construction from `storage` config.
    pub fn with_backends(mut self, backends: Backends) -> Self {
        self.backends = Some(backends);
        self
    }

    pub async fn build(self) -> anyhow::Result<TokenwardServer> {
        let backends = match self.backends {
            Some(b) => b,
            None => connect_backends(&self.config).await?,
        }
        .apply_audit_config(&self.config.auth.audit);

        let app = build_app(&self.config, &backends, self.clock.clone())?;
        let purge = spawn_blacklist_purge(
            backends.blacklist.clone(),
            self.clock,
            self.config.auth.blacklist_purge_interval,
        );

        Ok(TokenwardServer {
            addr: self.config.addr(),
            app,
            purge,
        })
    }
}

async fn connect_backends(cfg: &AppConfig) -> anyhow::Result<Backends> {
    match cfg.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage; revocations are lost on restart");
            Ok(Backends::memory(Arc::new(MemoryStore::new())))
        }
        StorageBackend::Postgres => {
            let pg = &cfg.storage.postgres;
            let options = PostgresOptions {
                pool_size: pg.pool_size,
                connect_timeout: pg.connect_timeout,
            };
            let storage = PostgresAuthStorage::connect_with(&pg.connection_url(), &options).await?;
            storage.migrate().await?;
            tracing::info!(pool_size = pg.pool_size, "connected to PostgreSQL");
            Ok(Backends::postgres(storage))
        }
    }
}

impl TokenwardServer {
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        let served = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;
        self.purge.abort();
        served?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
