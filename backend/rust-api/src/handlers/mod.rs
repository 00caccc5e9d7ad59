use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use mongodb::Database;
use redis::aio::ConnectionManager;

use crate::metrics;
use crate::services::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut dependencies = serde_json::Map::new();

    let mongo_health = match &state.mongo {
        Some(mongo) => check_mongodb(mongo).await,
        None => in_memory(),
    };
    let redis_health = match &state.redis {
        Some(redis) => check_redis(redis).await,
        None => not_configured(),
    };

    let all_healthy = [&mongo_health, &redis_health]
        .iter()
        .all(|health| health.get("status").and_then(|v| v.as_str()) != Some("unhealthy"));
    dependencies.insert("mongodb".to_string(), json!(mongo_health));
    dependencies.insert("redis".to_string(), json!(redis_health));

    let (status_code, status) = if all_healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status_code,
        Json(json!({
            "status": status,
            "service": "quizladder-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": dependencies
        })),
    )
}

type Health = serde_json::Map<String, serde_json::Value>;

fn health_entry(status: &str, key: &str, detail: impl Into<serde_json::Value>) -> Health {
    let mut entry = Health::new();
    entry.insert("status".to_string(), json!(status));
    entry.insert(key.to_string(), detail.into());
    entry
}

fn in_memory() -> Health {
    health_entry("healthy", "message", "In-memory backend")
}

fn not_configured() -> Health {
    health_entry("disabled", "message", "Not configured")
}

/// Runs one ping with a deadline and reports it as a dependency entry.
async fn probe<T, E, F>(name: &str, timeout: Duration, ping: F) -> Health
where
    E: std::fmt::Display,
    F: std::future::Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(timeout, ping).await {
        Ok(Ok(_)) => health_entry(
            "healthy",
            "message",
            format!("{} connection successful", name),
        ),
        Ok(Err(e)) => health_entry("unhealthy", "error", format!("{} error: {}", name, e)),
        Err(_) => health_entry(
            "unhealthy",
            "error",
            format!("{} timeout after {}ms", name, timeout.as_millis()),
        ),
    }
}

async fn check_mongodb(mongo: &Database) -> Health {
    probe(
        "MongoDB",
        Duration::from_secs(1),
        mongo.run_command(mongodb::bson::doc! { "ping": 1 }).into_future(),
    )
    .await
}

async fn check_redis(redis: &ConnectionManager) -> Health {
    let mut conn = redis.clone();
    probe(
        "Redis",
        Duration::from_millis(500),
        redis::cmd("PING").query_async::<String>(&mut conn),
    )
    .await
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// Metrics authentication middleware - protects /metrics endpoint with HTTP Basic Auth
pub async fn metrics_auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let encoded = auth_header
        .strip_prefix("Basic ")
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    // METRICS_AUTH is "username:password"
    let expected = std::env::var("METRICS_AUTH").unwrap_or_else(|_| "admin:changeme".to_string());

    if credentials != expected {
        tracing::warn!("Rejected metrics scrape with invalid credentials");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

pub mod error;
pub mod games;
pub mod users;
