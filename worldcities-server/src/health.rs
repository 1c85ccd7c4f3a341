//! Health check handlers

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service name
    pub service: String,

    /// Version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Readiness check response with dependency status
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Overall readiness status
    pub ready: bool,

    /// Service name
    pub service: String,

    /// Dependency statuses
    pub dependencies: HashMap<String, DependencyStatus>,
}

/// Individual dependency status
#[derive(Debug, Serialize, Deserialize)]
pub struct DependencyStatus {
    /// Dependency is healthy
    pub healthy: bool,

    /// Optional message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Liveness probe; 200 whenever the process serves requests
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        service: state.config().service.name.clone(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    };

    (StatusCode::OK, Json(response))
}

/// Readiness probe
///
/// 200 when the record store can serve queries, 503 otherwise.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let mut dependencies = HashMap::new();
    #[cfg_attr(not(feature = "database"), allow(unused_mut))]
    let mut all_ready = true;

    #[cfg(feature = "database")]
    let store = match state.db() {
        Some(pool) => match sqlx::query("SELECT 1").fetch_one(pool).await {
            Ok(_) => DependencyStatus {
                healthy: true,
                message: Some("Connected".to_string()),
            },
            Err(e) => {
                tracing::error!("Database health check failed: {}", e);
                all_ready = false;
                DependencyStatus {
                    healthy: false,
                    message: Some(format!("Connection failed: {}", e)),
                }
            }
        },
        None => in_memory(),
    };

    #[cfg(not(feature = "database"))]
    let store = in_memory();

    dependencies.insert("store".to_string(), store);

    let response = ReadinessResponse {
        ready: all_ready,
        service: state.config().service.name.clone(),
        dependencies,
    };

    let status = if all_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

fn in_memory() -> DependencyStatus {
    DependencyStatus {
        healthy: true,
        message: Some("In memory".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_readiness_with_memory_store() {
        let state = AppState::builder().build().await.unwrap();

        let response = readiness(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let readiness: ReadinessResponse = serde_json::from_slice(&body).unwrap();
        assert!(readiness.ready);
        assert_eq!(
            readiness.dependencies["store"].message.as_deref(),
            Some("In memory")
        );
    }

    #[tokio::test]
    async fn test_health_reports_service_name() {
        let state = AppState::builder().build().await.unwrap();

        let response = health(State(state)).await.into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.service, "worldcities");
    }
}
