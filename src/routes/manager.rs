use crate::{
    AppState,
    handlers::{blogs, users},
};
use axum::{
    Router,
    routing::{delete, post},
};

/// Manager Router Module
///
/// Moderation and administration endpoints. `create_router` wraps this router in
/// the elevated-role layer, and each handler repeats the role check so it stays
/// safe if mounted elsewhere.
pub fn manager_routes() -> Router<AppState> {
    Router::new()
        // POST /api/user/create
        // Accounts are provisioned by staff; there is no self sign-up.
        .route("/api/user/create", post(users::create_user))
        // POST /api/blog/publish/{slug}
        // The only transition from draft to published.
        .route("/api/blog/publish/{slug}", post(blogs::publish_post))
        // DELETE /api/blog/all?category=
        .route("/api/blog/all", delete(blogs::delete_all))
}
