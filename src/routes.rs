// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::{
    handlers::{auth, comments, profile, quiz, statistics, submission},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, tests, submit, statistics, profile).
/// * Protected routes go through `auth_middleware`.
/// * Applies global middleware (Trace, CORS) and serves uploaded avatars.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_layer = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let test_routes = Router::new()
        .route("/", get(quiz::list_tests))
        .route("/{id}", get(quiz::get_test))
        .route("/{id}/leaderboard", get(quiz::get_leaderboard))
        .route("/{id}/comments", get(comments::list_comments))
        // Protected test routes
        .merge(
            Router::new()
                .route("/", post(quiz::create_test))
                .route("/{id}/comments", post(comments::create_comment))
                .layer(auth_layer.clone()),
        );

    let statistics_routes = Router::new()
        .route("/me", get(statistics::list_my_statistics))
        .route("/{id}", get(statistics::get_statistic))
        .layer(auth_layer.clone());

    let profile_routes = Router::new()
        .route("/me", get(profile::get_me))
        .route("/", put(profile::update_profile))
        .route(
            "/avatar",
            post(profile::upload_avatar)
                .layer(DefaultBodyLimit::max(profile::MAX_AVATAR_BYTES + 64 * 1024)),
        )
        .layer(auth_layer);

    Router::new()
        .route("/api/submit", post(submission::submit))
        .nest("/api/auth", auth_routes)
        .nest("/api/tests", test_routes)
        .nest("/api/statistics", statistics_routes)
        .nest("/api/profile", profile_routes)
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
