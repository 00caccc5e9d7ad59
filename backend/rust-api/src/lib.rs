use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod telemetry;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .merge(games_routes(app_state.clone()))
        .merge(users_routes(app_state.clone()))
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
}

/// Game routes act on the caller's own games and require a bearer token.
fn games_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/games", post(handlers::games::create_game))
        .route("/api/v1/games/{id}", get(handlers::games::get_game))
        .route("/api/v1/games/{id}/status", get(handlers::games::get_status))
        .route(
            "/api/v1/games/{id}/question",
            get(handlers::games::get_current_question),
        )
        .route(
            "/api/v1/games/{id}/answers",
            post(handlers::games::submit_answer),
        )
        .route(
            "/api/v1/games/{id}/take-money",
            post(handlers::games::take_money),
        )
        .route("/api/v1/games/{id}/help", post(handlers::games::use_help))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ))
}

fn users_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/users/{id}", get(handlers::users::get_profile))
        .route("/api/v1/users/{id}/games", get(handlers::users::list_games))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::optional_auth_middleware,
        ))
}
