use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod password;
pub mod repository;
pub mod validation;

// Routers grouped by required access (public, authenticated, manager).
pub mod routes;
use auth::{AuthUser, TokenCodec};
use error::AppError;
use models::Role;
use routes::{authenticated, manager, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every handler, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::hello,
        handlers::users::login, handlers::users::create_user, handlers::users::get_me,
        handlers::users::get_user_profile, handlers::users::get_role,
        handlers::users::change_password, handlers::users::change_image,
        handlers::users::add_social, handlers::users::delete_account,
        handlers::blogs::list_published, handlers::blogs::list_popular,
        handlers::blogs::list_by_category, handlers::blogs::list_categories,
        handlers::blogs::get_by_slug, handlers::blogs::create_post,
        handlers::blogs::update_post, handlers::blogs::delete_post,
        handlers::blogs::list_drafts, handlers::blogs::get_draft,
        handlers::blogs::publish_post, handlers::blogs::delete_all
    ),
    components(
        schemas(
            models::Role, models::SocialMedia, models::SocialPlatform, models::UserProfile,
            models::AccountView, models::AuthorSummary, models::Post, models::LoginRequest,
            models::CreateUserRequest, models::ChangePasswordRequest, models::ChangeImageRequest,
            models::AddSocialRequest, models::CreatePostRequest, models::UpdatePostRequest,
            models::LoginResponse, models::ProfileResponse, models::RoleResponse,
            models::MessageResponse, models::PasswordChangedResponse, models::PostResponse,
            models::PostListResponse, models::CategoriesResponse, models::DeletedPostResponse,
            models::BulkDeleteResponse, error::ErrorBody,
        )
    ),
    tags(
        (name = "blog-api", description = "Blog CRUD API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Shared, immutable container for the services every request needs.
#[derive(Clone)]
pub struct AppState {
    /// Credential store and content query service.
    pub repo: RepositoryState,
    /// Signs and verifies access tokens with the configured secret.
    pub tokens: TokenCodec,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self {
            repo,
            tokens: TokenCodec::new(&config.jwt_secret),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for TokenCodec {
    fn from_ref(app_state: &AppState) -> TokenCodec {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects the request with 401 unless `AuthUser` resolves. The resolved
/// identity is cached in the request extensions, so handlers extracting
/// `AuthUser` again do not hit the store a second time.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// elevated_middleware
///
/// Authentication plus the manager/admin role check.
async fn elevated_middleware(
    auth_user: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    auth_user.require_role(Role::ELEVATED)?;
    Ok(next.run(request).await)
}

/// create_router
///
/// Assembles the routers, their access layers, the observability stack and the
/// shared state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .merge(
            manager::manager_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), elevated_middleware)),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the `http_request` span for `TraceLayer`, tagged with the request id
/// so every log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
