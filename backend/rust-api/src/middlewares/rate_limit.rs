use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use redis::aio::ConnectionManager;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::handlers::error::ApiError;
use crate::services::AppState;

use super::auth::JwtClaims;

const RATE_LIMIT_PER_USER: u32 = 100; // requests per minute
const RATE_LIMIT_PER_IP: u32 = 200; // requests per minute
const RATE_WINDOW_SECONDS: u64 = 60;

// Fixed window: the first hit creates the counter with a TTL, later hits
// increment it until the limit.
const FIXED_WINDOW_SCRIPT: &str = r#"
    local key = KEYS[1]
    local limit = tonumber(ARGV[1])
    local window = tonumber(ARGV[2])

    local current = redis.call('GET', key)

    if current == false then
        redis.call('SET', key, 1, 'EX', window)
        return 1
    end

    current = tonumber(current)

    if current >= limit then
        return 0
    end

    redis.call('INCR', key)
    return 1
"#;

fn extract_client_ip_from(headers: &HeaderMap, extensions: &axum::http::Extensions) -> String {
    // Preferred order: X-Forwarded-For, Forwarded, X-Real-IP, ConnectInfo
    if let Some(v) = headers.get("x-forwarded-for") {
        if let Ok(s) = v.to_str() {
            return s.split(',').next().unwrap_or(s).trim().to_string();
        }
    }

    if let Some(v) = headers.get("forwarded") {
        if let Ok(s) = v.to_str() {
            for part in s.split(';') {
                if let Some(val) = part.trim().strip_prefix("for=") {
                    return val.trim().trim_matches('"').to_string();
                }
            }
        }
    }

    if let Some(v) = headers.get("x-real-ip") {
        if let Ok(s) = v.to_str() {
            return s.trim().to_string();
        }
    }

    if let Some(ci) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return ci.0.ip().to_string();
    }

    "unknown".to_string()
}

fn limit_from_env(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(default)
}

fn rate_limit_disabled() -> bool {
    std::env::var("RATE_LIMIT_DISABLED").unwrap_or_default() == "1"
}

/// Per-user and per-IP limits for game routes. Requires Redis; without it the
/// check is skipped.
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(redis) = state.redis.as_ref() else {
        return Ok(next.run(request).await);
    };

    if rate_limit_disabled() {
        tracing::debug!("Rate limiting disabled via RATE_LIMIT_DISABLED=1");
        return Ok(next.run(request).await);
    }

    let client_ip = extract_client_ip_from(request.headers(), request.extensions());
    let user_id = request
        .extensions()
        .get::<JwtClaims>()
        .map(|claims| claims.sub.clone());

    if let Some(uid) = &user_id {
        let limit = limit_from_env("RATE_LIMIT_PER_USER", RATE_LIMIT_PER_USER);
        if !enforce(redis, &format!("ratelimit:user:{}", uid), limit).await? {
            tracing::warn!("Rate limit exceeded for user: {}", uid);
            return Err(ApiError::too_many_requests());
        }
    }

    let limit = limit_from_env("RATE_LIMIT_PER_IP", RATE_LIMIT_PER_IP);
    if !enforce(redis, &format!("ratelimit:ip:{}", client_ip), limit).await? {
        tracing::warn!("Rate limit exceeded for IP: {}", client_ip);
        return Err(ApiError::too_many_requests());
    }

    Ok(next.run(request).await)
}

async fn enforce(redis: &ConnectionManager, key: &str, limit: u32) -> Result<bool, ApiError> {
    check_rate_limit_with_window(redis, key, limit, RATE_WINDOW_SECONDS)
        .await
        .map_err(|e| {
            tracing::error!("Rate limit check failed: {}", e);
            ApiError::internal("Rate limit check failed")
        })
}

/// Check rate limit using Redis with Lua script for atomicity
pub async fn check_rate_limit_with_window(
    redis: &ConnectionManager,
    key: &str,
    limit: u32,
    window_seconds: u64,
) -> anyhow::Result<bool> {
    let mut conn = redis.clone();

    let allowed: u32 = redis::Script::new(FIXED_WINDOW_SCRIPT)
        .key(key)
        .arg(limit)
        .arg(window_seconds)
        .invoke_async(&mut conn)
        .await?;

    Ok(allowed == 1)
}
