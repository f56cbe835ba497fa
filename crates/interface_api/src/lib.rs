//! HTTP API Layer
//!
//! Serves the liveness and readiness routes of the pageshare service and owns
//! the process-wide database [`Connection`](infra_db::Connection).
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let app = create_router(Arc::new(connection), config);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{routing::get, Router};
use infra_db::{Connection, RelationalPool};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::health;

/// Application state shared across handlers
pub struct AppState<P: RelationalPool> {
    pub connection: Arc<Connection<P>>,
    pub config: ApiConfig,
}

impl<P: RelationalPool> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            connection: Arc::clone(&self.connection),
            config: self.config.clone(),
        }
    }
}

/// Creates the main API router
pub fn create_router<P: RelationalPool>(connection: Arc<Connection<P>>, config: ApiConfig) -> Router {
    let state = AppState { connection, config };

    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check::<P>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use infra_db::mock::MockPool;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn app() -> (Router, MockPool) {
        let write = MockPool::new("write");
        let read = write.replica("read");
        let connection = Connection::from_pools(read, write.clone()).await.unwrap();
        (create_router(Arc::new(connection), ApiConfig::default()), write)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _) = app().await;

        let (status, body) = get(app, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_readiness_pings_read_pool() {
        let (app, pool) = app().await;

        let (status, body) = get(app, "/health/ready").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
        assert_eq!(pool.count("read: SELECT 1"), 2);
    }

    #[tokio::test]
    async fn test_readiness_fails_when_database_is_down() {
        let (app, pool) = app().await;
        pool.fail_statement("read: SELECT 1");

        let (status, body) = get(app, "/health/ready").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "unavailable");
    }
}
