use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, ErrorBody},
    models::{
        AccountView, AddSocialRequest, ChangeImageRequest, ChangePasswordRequest,
        CreateUserRequest, LoginRequest, LoginResponse, MessageResponse, PasswordChangedResponse,
        ProfileResponse, Role, RoleResponse, User,
    },
    password::{hash_password, verify_password},
    validation::ValidatedJson,
};

/// Loads the caller's own record. A token whose user vanished between the
/// extractor and the handler is treated as unauthenticated.
async fn load_self(state: &AppState, auth: &AuthUser) -> Result<User, AppError> {
    state
        .repo
        .get_user(auth.id)
        .await?
        .ok_or(AppError::Unauthenticated)
}

fn login_response(state: &AppState, user: &User) -> Result<LoginResponse, AppError> {
    let token = state
        .tokens
        .issue(user.id, Some(user.role), user.credentials_version, state.config.token_ttl)?;
    Ok(LoginResponse {
        token,
        user: AccountView::from(user),
    })
}

/// login
///
/// [Public Route] Exchanges an email and password for an access token.
/// An unknown email answers 404, a wrong password 401.
#[utoipa::path(
    post,
    path = "/api/user/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 401, description = "Wrong password", body = ErrorBody),
        (status = 404, description = "Unknown email", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = state
        .repo
        .get_user_by_email(&payload.email)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    if !verify_password(payload.password, user.password_hash.clone()).await? {
        tracing::debug!(user_id = %user.id, "login rejected: wrong password");
        return Err(AppError::InvalidCredentials);
    }

    tracing::info!(user_id = %user.id, "user logged in");
    Ok(Json(login_response(&state, &user)?))
}

/// create_user
///
/// [Manager/Admin Route] Creates an account with the `normal` role. Duplicate
/// emails are detected by the store's unique index and answered with 409.
#[utoipa::path(
    post,
    path = "/api/user/create",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = LoginResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 401, description = "Not logged in or not elevated", body = ErrorBody),
        (status = 409, description = "Email already exists", body = ErrorBody)
    )
)]
pub async fn create_user(
    auth: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), AppError> {
    auth.require_role(Role::ELEVATED)?;

    let password_hash = hash_password(payload.password, state.config.bcrypt_cost).await?;
    let user = state
        .repo
        .create_user(payload.name, payload.email, password_hash)
        .await?;

    tracing::info!(user_id = %user.id, created_by = %auth.id, "user created");
    Ok((StatusCode::CREATED, Json(login_response(&state, &user)?)))
}

/// get_me
///
/// [Authenticated Route] The caller's own profile.
#[utoipa::path(
    get,
    path = "/api/user/",
    responses(
        (status = 200, description = "Own profile", body = ProfileResponse),
        (status = 401, description = "Not logged in", body = ErrorBody)
    )
)]
pub async fn get_me(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = load_self(&state, &auth).await?;
    Ok(Json(ProfileResponse {
        user: (&user).into(),
    }))
}

/// get_user_profile
///
/// [Authenticated Route] Public profile of any user.
#[utoipa::path(
    get,
    path = "/api/user/getUser/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 404, description = "No such user", body = ErrorBody)
    )
)]
pub async fn get_user_profile(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(Json(ProfileResponse {
        user: (&user).into(),
    }))
}

/// get_role
///
/// [Authenticated Route] The caller's current role, as stored.
#[utoipa::path(
    get,
    path = "/api/user/getRole",
    responses((status = 200, description = "Role", body = RoleResponse))
)]
pub async fn get_role(auth: AuthUser) -> Json<RoleResponse> {
    Json(RoleResponse { role: auth.role })
}

/// change_password
///
/// [Authenticated Route] Replaces the password after checking the old one.
/// The store bumps the credentials version, which revokes every earlier token,
/// so a replacement bound to the new version is returned.
#[utoipa::path(
    post,
    path = "/api/user/changePassword",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = PasswordChangedResponse),
        (status = 401, description = "Old password does not match", body = ErrorBody)
    )
)]
pub async fn change_password(
    auth: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<PasswordChangedResponse>, AppError> {
    let user = load_self(&state, &auth).await?;
    if !verify_password(payload.old_password, user.password_hash).await? {
        return Err(AppError::InvalidCredentials);
    }

    let password_hash = hash_password(payload.password, state.config.bcrypt_cost).await?;
    let user = state
        .repo
        .set_password_hash(auth.id, password_hash)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    tracing::info!(user_id = %user.id, version = user.credentials_version, "password changed");
    let token = state.tokens.issue(
        user.id,
        Some(user.role),
        user.credentials_version,
        state.config.token_ttl,
    )?;
    Ok(Json(PasswordChangedResponse {
        message: "Password changed".to_string(),
        token,
    }))
}

/// change_image
#[utoipa::path(
    post,
    path = "/api/user/changeImage",
    request_body = ChangeImageRequest,
    responses((status = 200, description = "Image updated", body = ProfileResponse))
)]
pub async fn change_image(
    auth: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ChangeImageRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = state
        .repo
        .set_user_image(auth.id, payload.image)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    Ok(Json(ProfileResponse {
        user: (&user).into(),
    }))
}

/// add_social
///
/// [Authenticated Route] Sets one social link, replacing any previous link for
/// the same platform.
#[utoipa::path(
    post,
    path = "/api/user/addSocial",
    request_body = AddSocialRequest,
    responses((status = 200, description = "Link saved", body = ProfileResponse))
)]
pub async fn add_social(
    auth: AuthUser,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<AddSocialRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = state
        .repo
        .set_social_link(auth.id, payload.platform, payload.value)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    Ok(Json(ProfileResponse {
        user: (&user).into(),
    }))
}

/// delete_account
///
/// [Authenticated Route] Deletes the caller's account together with every post
/// they authored.
#[utoipa::path(
    post,
    path = "/api/user/delete",
    responses(
        (status = 200, description = "Account deleted", body = MessageResponse),
        (status = 401, description = "Not logged in", body = ErrorBody)
    )
)]
pub async fn delete_account(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, AppError> {
    if !state.repo.delete_user(auth.id).await? {
        return Err(AppError::Unauthenticated);
    }
    tracing::info!(user_id = %auth.id, "account deleted");
    Ok(Json(MessageResponse::new("User deleted")))
}
