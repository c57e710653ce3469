use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// One block of free-form post content (a paragraph, an image, an embed...).
/// The shape is owned by the editor front end; the API stores it verbatim.
pub type ContentBlock = serde_json::Map<String, serde_json::Value>;

// --- Identity ---

/// Role
///
/// Coarse-grained authorization tier. A missing or unrecognised role in the store
/// is read as `Normal`, the least privileged tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    Normal,
    Manager,
    Admin,
}

impl Role {
    /// Roles allowed to publish posts, create users and run bulk deletes.
    pub const ELEVATED: &'static [Role] = &[Role::Manager, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Normal => "normal",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }

    pub fn is_elevated(&self) -> bool {
        Self::ELEVATED.contains(self)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Option<String>> for Role {
    fn from(value: Option<String>) -> Self {
        match value.as_deref() {
            Some("admin") => Role::Admin,
            Some("manager") => Role::Manager,
            _ => Role::Normal,
        }
    }
}

/// SocialMedia
///
/// Optional links shown on a user's profile. Stored as four nullable columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct SocialMedia {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,
}

/// SocialPlatform
///
/// The platforms a user may link from their profile (`POST /api/user/addSocial`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SocialPlatform {
    Twitter,
    Website,
    Instagram,
    Facebook,
}

impl SocialPlatform {
    /// Column holding this platform's link in the `users` table.
    pub fn column(&self) -> &'static str {
        match self {
            SocialPlatform::Twitter => "twitter",
            SocialPlatform::Website => "website",
            SocialPlatform::Instagram => "instagram",
            SocialPlatform::Facebook => "facebook",
        }
    }

    pub fn slot<'a>(&self, links: &'a mut SocialMedia) -> &'a mut Option<String> {
        match self {
            SocialPlatform::Twitter => &mut links.twitter,
            SocialPlatform::Website => &mut links.website,
            SocialPlatform::Instagram => &mut links.instagram,
            SocialPlatform::Facebook => &mut links.facebook,
        }
    }
}

/// User
///
/// The canonical account record from the `users` table. It is never serialized
/// directly: responses go through [`UserProfile`] or [`AccountView`] so the
/// password hash and email cannot leak by accident.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    #[sqlx(try_from = "Option<String>")]
    pub role: Role,
    pub image: Option<String>,
    #[sqlx(flatten)]
    pub social_media: SocialMedia,
    /// Incremented on every password change. Tokens carry the version they
    /// were signed for and are rejected once it moves on.
    pub credentials_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// UserProfile
///
/// Public projection of a user (`GET /api/user/`, `GET /api/user/getUser/{id}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserProfile {
    pub name: String,
    pub role: Role,
    pub image: Option<String>,
    pub social_media: SocialMedia,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            role: user.role,
            image: user.image.clone(),
            social_media: user.social_media.clone(),
        }
    }
}

/// AccountView
///
/// The owner's view of their own account, returned on login and account creation.
/// Same as [`UserProfile`] plus the email address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AccountView {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub image: Option<String>,
    pub social_media: SocialMedia,
}

impl From<&User> for AccountView {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            image: user.image.clone(),
            social_media: user.social_media.clone(),
        }
    }
}

// --- Content ---

/// AuthorSummary
///
/// Denormalized author details embedded in every post, loaded through a JOIN on
/// `users`. Read-only: posts never write through it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct AuthorSummary {
    #[sqlx(rename = "author_id")]
    pub id: Uuid,
    #[sqlx(rename = "author_name")]
    pub name: String,
    #[sqlx(rename = "author_role", try_from = "Option<String>")]
    pub role: Role,
    #[sqlx(rename = "author_image")]
    pub image: Option<String>,
}

/// Post
///
/// A blog post from the `posts` table joined with its author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    /// Unique across all posts, published or not.
    pub slug: String,
    pub category: String,
    #[sqlx(json)]
    #[ts(type = "Array<Record<string, unknown>>")]
    #[schema(value_type = Vec<Object>)]
    pub content: Vec<ContentBlock>,
    pub cover_image: Option<String>,
    pub description: Option<String>,
    pub is_published: bool,
    pub views: i64,
    #[sqlx(flatten)]
    pub author: AuthorSummary,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub last_edited_at: DateTime<Utc>,
}

// --- Request Payloads ---

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    #[validate(length(min = 8, max = 100, message = "Password must be 8 to 100 characters"))]
    pub password: String,
}

/// CreateUserRequest
///
/// Input for `POST /api/user/create`. New accounts always start with the `normal` role.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema)]
#[ts(export)]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    #[validate(length(min = 3, max = 100, message = "Name must be 3 to 100 characters"))]
    pub name: String,
    #[validate(length(min = 8, max = 100, message = "Password must be 8 to 100 characters"))]
    pub password: String,
}

/// ChangePasswordRequest
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema)]
#[ts(export)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 8, max = 100, message = "Password must be 8 to 100 characters"))]
    pub password: String,
    #[serde(rename = "oldPassword", alias = "oldpassword")]
    #[validate(length(min = 8, max = 100, message = "Password must be 8 to 100 characters"))]
    pub old_password: String,
}

/// ChangeImageRequest
///
/// The image is an opaque URL; the API never stores file contents.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema)]
#[ts(export)]
pub struct ChangeImageRequest {
    #[validate(url(message = "Image must be a valid URL"))]
    pub image: String,
}

/// AddSocialRequest
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema)]
#[ts(export)]
pub struct AddSocialRequest {
    #[serde(rename = "type")]
    pub platform: SocialPlatform,
    #[validate(url(message = "Link must be a valid URL"))]
    pub value: String,
}

/// CreatePostRequest
///
/// Input for `POST /api/blog/create`. The author is always the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 64, message = "Slug must be 1 to 64 characters"))]
    pub slug: String,
    #[validate(length(min = 1, max = 64, message = "Category must be 1 to 64 characters"))]
    pub category: String,
    #[ts(type = "Array<Record<string, unknown>>")]
    #[schema(value_type = Vec<Object>)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    #[validate(length(max = 512, message = "Description must be at most 512 characters"))]
    pub description: Option<String>,
}

/// UpdatePostRequest
///
/// Partial update for `POST /api/blog/update/{slug}`. Absent fields keep their value.
/// Any update, even an empty one, moves the post back to draft.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 64, message = "Slug must be 1 to 64 characters"))]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 64, message = "Category must be 1 to 64 characters"))]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "Array<Record<string, unknown>> | undefined")]
    #[schema(value_type = Option<Vec<Object>>)]
    pub content: Option<Vec<ContentBlock>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 512, message = "Description must be at most 512 characters"))]
    pub description: Option<String>,
}

/// Page
///
/// Offset pagination for the public listings. A missing or zero `limit` means
/// "no limit". Offsets are best effort under concurrent writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Page {
    #[validate(range(min = 0, message = "limit must not be negative"))]
    pub limit: Option<i64>,
    #[validate(range(min = 0, message = "skip must not be negative"))]
    pub skip: Option<i64>,
}

impl Page {
    pub fn new(limit: Option<i64>, skip: Option<i64>) -> Self {
        Self { limit, skip }
    }

    pub fn limit(&self) -> Option<i64> {
        self.limit.filter(|limit| *limit > 0)
    }

    pub fn skip(&self) -> i64 {
        self.skip.unwrap_or(0).max(0)
    }
}

// --- Responses ---

/// LoginResponse
///
/// Returned by login and account creation.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub user: AccountView,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ProfileResponse {
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RoleResponse {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PostResponse {
    pub blog: Post,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PostListResponse {
    pub blogs: Vec<Post>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CategoriesResponse {
    pub categories: Vec<String>,
}

/// Returned by `POST /api/user/changePassword`. Tokens issued before the change
/// stop working, so the caller receives a replacement.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PasswordChangedResponse {
    pub message: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DeletedPostResponse {
    pub deleted: Post,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct BulkDeleteResponse {
    pub deleted: u64,
}
