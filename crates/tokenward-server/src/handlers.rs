use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use tokenward_auth::StorageHealth;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

/// State for the probe endpoints.
#[derive(Clone)]
pub struct HealthState {
    pub storage: Arc<dyn StorageHealth>,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Ready once the storage backend answers a ping.
pub async fn readyz(State(state): State<HealthState>) -> impl IntoResponse {
    match state.storage.ping().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse { status: "ready" })),
        Err(e) => {
            tracing::warn!(error = %e, category = %e.category(), "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokenward_auth::MemoryStore;
    use tokio_test::block_on;

    #[test]
    fn test_readyz_follows_storage() {
        let store = Arc::new(MemoryStore::new());
        let state = HealthState {
            storage: store.clone(),
        };

        let res = block_on(readyz(State(state.clone()))).into_response();
        assert_eq!(res.status(), StatusCode::OK);

        store.set_unavailable(true);
        let res = block_on(readyz(State(state))).into_response();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
