//! Health check handlers

use axum::{extract::State, Json};
use core_kernel::Context;
use infra_db::RelationalPool;
use serde::Serialize;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl HealthResponse {
    fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::new("healthy"))
}

/// Readiness check (includes database)
///
/// Checks out a connection through the read client and pings the read pool.
pub async fn readiness_check<P: RelationalPool>(
    State(state): State<AppState<P>>,
) -> Result<Json<HealthResponse>, ApiError> {
    let ctx = Context::background();
    drop(state.connection.read_client(&ctx).acquire().await?);
    state.connection.ping().await?;

    Ok(Json(HealthResponse::new("ready")))
}
