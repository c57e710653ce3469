use crate::{
    AppState,
    handlers::{blogs, users},
};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Authenticated Router Module
///
/// Self-service account management and authoring. The authentication layer in
/// `create_router` rejects the request before any handler here runs; handlers
/// then scope writes to the caller through `AuthUser::require_owner_or_role`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Account ---
        .route("/api/user/", get(users::get_me))
        .route("/api/user", get(users::get_me))
        .route("/api/user/getUser/{id}", get(users::get_user_profile))
        .route("/api/user/getRole", get(users::get_role))
        // POST /api/user/changePassword
        // Revokes every token issued before the change.
        .route("/api/user/changePassword", post(users::change_password))
        .route("/api/user/changeImage", post(users::change_image))
        .route("/api/user/addSocial", post(users::add_social))
        // POST /api/user/delete
        // Removes the account and its posts.
        .route("/api/user/delete", post(users::delete_account))
        // --- Authoring ---
        .route("/api/blog/create", post(blogs::create_post))
        // POST /api/blog/update/{slug}
        // Owner, or manager/admin. The post returns to draft.
        .route("/api/blog/update/{slug}", post(blogs::update_post))
        // DELETE /api/blog/delete?slug=
        // Owner-scoped for normal users.
        .route("/api/blog/delete", delete(blogs::delete_post))
        .route("/api/blog/drafts", get(blogs::list_drafts))
        .route("/api/blog/drafts/{slug}", get(blogs::get_draft))
}
