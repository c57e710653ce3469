use crate::{
    AppState,
    handlers::{self, blogs, users},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token. Every blog read here goes through a
/// repository query that filters on `is_published = true`; drafts are never
/// visible from this router.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Load balancer probe, answered without touching the store.
        .route("/health", get(|| async { "ok" }))
        .route("/api/", get(handlers::hello))
        // POST /api/user/login
        // Exchanges credentials for a token.
        .route("/api/user/login", post(users::login))
        // --- Published content ---
        .route("/api/blog/getAll", get(blogs::list_published))
        .route("/api/blog/getPopular", get(blogs::list_popular))
        .route("/api/blog/category/{category}", get(blogs::list_by_category))
        .route("/api/blog/getAllCategory", get(blogs::list_categories))
        // GET /api/blog/slug?query=
        // Also records a view.
        .route("/api/blog/slug", get(blogs::get_by_slug))
}
