use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, ErrorBody},
    models::{
        BulkDeleteResponse, CategoriesResponse, CreatePostRequest, DeletedPostResponse, Page,
        PostListResponse, PostResponse, Role, UpdatePostRequest,
    },
    validation::{ValidatedJson, ValidatedQuery},
};

// --- Query Structs ---

/// SlugLookup
///
/// `GET /api/blog/slug?query=<slug>`.
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SlugLookup {
    pub query: Option<String>,
}

/// SlugTarget
///
/// `DELETE /api/blog/delete?slug=<slug>`.
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SlugTarget {
    pub slug: Option<String>,
}

/// CategoryTarget
///
/// `DELETE /api/blog/all?category=<category>`. Omitting the parameter removes
/// every post; a present but blank category is rejected.
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CategoryTarget {
    pub category: Option<String>,
}

fn required_slug(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .map(|slug| slug.trim().to_string())
        .filter(|slug| !slug.is_empty())
        .ok_or_else(|| AppError::validation(field, "Slug is required"))
}

// --- Public Reads ---

/// list_published
///
/// [Public Route] Published posts, newest first.
#[utoipa::path(
    get,
    path = "/api/blog/getAll",
    params(Page),
    responses(
        (status = 200, description = "Published posts", body = PostListResponse),
        (status = 400, description = "Invalid pagination", body = ErrorBody)
    )
)]
pub async fn list_published(
    State(state): State<AppState>,
    ValidatedQuery(page): ValidatedQuery<Page>,
) -> Result<Json<PostListResponse>, AppError> {
    let blogs = state.repo.list_published(page).await?;
    Ok(Json(PostListResponse { blogs }))
}

/// list_popular
///
/// [Public Route] Published posts ordered by view count.
#[utoipa::path(
    get,
    path = "/api/blog/getPopular",
    params(Page),
    responses((status = 200, description = "Most viewed posts", body = PostListResponse))
)]
pub async fn list_popular(
    State(state): State<AppState>,
    ValidatedQuery(page): ValidatedQuery<Page>,
) -> Result<Json<PostListResponse>, AppError> {
    let blogs = state.repo.list_popular(page).await?;
    Ok(Json(PostListResponse { blogs }))
}

#[utoipa::path(
    get,
    path = "/api/blog/category/{category}",
    params(("category" = String, Path, description = "Category name"), Page),
    responses((status = 200, description = "Published posts in the category", body = PostListResponse))
)]
pub async fn list_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
    ValidatedQuery(page): ValidatedQuery<Page>,
) -> Result<Json<PostListResponse>, AppError> {
    let blogs = state.repo.list_by_category(&category, page).await?;
    Ok(Json(PostListResponse { blogs }))
}

#[utoipa::path(
    get,
    path = "/api/blog/getAllCategory",
    responses((status = 200, description = "Categories with at least one published post", body = CategoriesResponse))
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<CategoriesResponse>, AppError> {
    let categories = state.repo.list_categories().await?;
    Ok(Json(CategoriesResponse { categories }))
}

/// get_by_slug
///
/// [Public Route] One published post. Every successful call counts as a view;
/// the returned `views` excludes the view being recorded.
#[utoipa::path(
    get,
    path = "/api/blog/slug",
    params(SlugLookup),
    responses(
        (status = 200, description = "The post", body = PostResponse),
        (status = 400, description = "Missing slug", body = ErrorBody),
        (status = 404, description = "No published post with this slug", body = ErrorBody)
    )
)]
pub async fn get_by_slug(
    State(state): State<AppState>,
    ValidatedQuery(lookup): ValidatedQuery<SlugLookup>,
) -> Result<Json<PostResponse>, AppError> {
    let slug = required_slug(lookup.query, "query")?;
    let blog = state
        .repo
        .get_published_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::not_found("Blog"))?;
    Ok(Json(PostResponse { blog }))
}

// --- Authenticated Writes ---

/// create_post
///
/// [Authenticated Route] Creates a draft authored by the caller.
#[utoipa::path(
    post,
    path = "/api/blog/create",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Draft created", body = PostResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 409, description = "Slug already taken", body = ErrorBody)
    )
)]
pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), AppError> {
    let blog = state.repo.create_post(auth.id, payload).await?;
    tracing::info!(post_id = %blog.id, author_id = %auth.id, "post created");
    Ok((StatusCode::CREATED, Json(PostResponse { blog })))
}

/// update_post
///
/// [Authenticated Route] Edits a post and sends it back to draft.
///
/// *Authorization*: normal users reach only their own posts; anything else
/// answers 404. Managers and admins may edit any post.
#[utoipa::path(
    post,
    path = "/api/blog/update/{slug}",
    request_body = UpdatePostRequest,
    params(("slug" = String, Path, description = "Current slug of the post")),
    responses(
        (status = 200, description = "Updated, now unpublished", body = PostResponse),
        (status = 404, description = "No such post for this caller", body = ErrorBody),
        (status = 409, description = "Slug already taken", body = ErrorBody)
    )
)]
pub async fn update_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    ValidatedJson(payload): ValidatedJson<UpdatePostRequest>,
) -> Result<Json<PostResponse>, AppError> {
    let scope = auth.require_owner_or_role(Role::ELEVATED);
    let blog = state
        .repo
        .update_post(&slug, scope.owner(), payload)
        .await?
        .ok_or_else(|| AppError::not_found("Blog"))?;
    Ok(Json(PostResponse { blog }))
}

/// delete_post
///
/// [Authenticated Route] Deletes one post, scoped to the caller's own posts
/// unless the caller is a manager or admin.
#[utoipa::path(
    delete,
    path = "/api/blog/delete",
    params(SlugTarget),
    responses(
        (status = 200, description = "Deleted", body = DeletedPostResponse),
        (status = 404, description = "No such post for this caller", body = ErrorBody)
    )
)]
pub async fn delete_post(
    auth: AuthUser,
    State(state): State<AppState>,
    ValidatedQuery(target): ValidatedQuery<SlugTarget>,
) -> Result<Json<DeletedPostResponse>, AppError> {
    let slug = required_slug(target.slug, "slug")?;
    let scope = auth.require_owner_or_role(Role::ELEVATED);
    let deleted = state
        .repo
        .delete_post(&slug, scope.owner())
        .await?
        .ok_or_else(|| AppError::not_found("Blog"))?;
    tracing::info!(post_id = %deleted.id, by = %auth.id, "post deleted");
    Ok(Json(DeletedPostResponse { deleted }))
}

/// list_drafts
///
/// [Authenticated Route] The caller's unpublished posts, most recently edited first.
#[utoipa::path(
    get,
    path = "/api/blog/drafts",
    responses((status = 200, description = "Own drafts", body = PostListResponse))
)]
pub async fn list_drafts(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PostListResponse>, AppError> {
    let blogs = state.repo.list_drafts(auth.id).await?;
    Ok(Json(PostListResponse { blogs }))
}

#[utoipa::path(
    get,
    path = "/api/blog/drafts/{slug}",
    params(("slug" = String, Path, description = "Draft slug")),
    responses(
        (status = 200, description = "Own draft", body = PostResponse),
        (status = 404, description = "No such draft for this caller", body = ErrorBody)
    )
)]
pub async fn get_draft(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PostResponse>, AppError> {
    let blog = state
        .repo
        .get_draft(auth.id, &slug)
        .await?
        .ok_or_else(|| AppError::not_found("Draft"))?;
    Ok(Json(PostResponse { blog }))
}

// --- Manager/Admin ---

/// publish_post
///
/// [Manager/Admin Route] Makes a post publicly visible. Nothing else changes.
#[utoipa::path(
    post,
    path = "/api/blog/publish/{slug}",
    params(("slug" = String, Path, description = "Slug of the post")),
    responses(
        (status = 200, description = "Published", body = PostResponse),
        (status = 401, description = "Not logged in or not elevated", body = ErrorBody),
        (status = 404, description = "No such post", body = ErrorBody)
    )
)]
pub async fn publish_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PostResponse>, AppError> {
    auth.require_role(Role::ELEVATED)?;
    let blog = state
        .repo
        .publish_post(&slug)
        .await?
        .ok_or_else(|| AppError::not_found("Blog"))?;
    tracing::info!(post_id = %blog.id, by = %auth.id, "post published");
    Ok(Json(PostResponse { blog }))
}

/// delete_all
///
/// [Manager/Admin Route] Bulk delete, optionally limited to one category.
#[utoipa::path(
    delete,
    path = "/api/blog/all",
    params(CategoryTarget),
    responses(
        (status = 200, description = "Number of deleted posts", body = BulkDeleteResponse),
        (status = 400, description = "Blank category", body = ErrorBody),
        (status = 401, description = "Not logged in or not elevated", body = ErrorBody)
    )
)]
pub async fn delete_all(
    auth: AuthUser,
    State(state): State<AppState>,
    ValidatedQuery(target): ValidatedQuery<CategoryTarget>,
) -> Result<Json<BulkDeleteResponse>, AppError> {
    auth.require_role(Role::ELEVATED)?;
    let category = target.category.as_deref();
    if category.is_some_and(|c| c.trim().is_empty()) {
        return Err(AppError::validation("category", "Category must not be empty"));
    }
    let deleted = state.repo.delete_all_in_category(category).await?;
    tracing::warn!(by = %auth.id, category = ?category, deleted, "bulk delete");
    Ok(Json(BulkDeleteResponse { deleted }))
}
