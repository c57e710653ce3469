use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{CreatePostRequest, Page, Post, SocialPlatform, UpdatePostRequest, User};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// Which unique constraint a write collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKey {
    Email,
    Slug,
}

/// RepoError
///
/// Failures surfaced by the store. Duplicate keys are detected from the store's
/// own uniqueness signal, never by a read-before-write.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("duplicate key: {0:?}")]
    Duplicate(DuplicateKey),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store error: {0}")]
    Store(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository Trait
///
/// The credential store and the content query service behind one seam. Every
/// read applies its publish-state filter here, and every ownership-scoped write
/// takes the owner as a parameter, so handlers never assemble raw queries.
///
/// An `owner` of `Some(id)` restricts a write to posts authored by `id`;
/// `None` is the privileged, unscoped form.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    /// Inserts a user with the default `normal` role.
    async fn create_user(&self, name: String, email: String, password_hash: String) -> RepoResult<User>;
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn set_user_image(&self, id: Uuid, image: String) -> RepoResult<Option<User>>;
    async fn set_social_link(&self, id: Uuid, platform: SocialPlatform, url: String) -> RepoResult<Option<User>>;
    /// Replaces the hash and increments the credentials version.
    async fn set_password_hash(&self, id: Uuid, password_hash: String) -> RepoResult<Option<User>>;
    /// Deletes the user and, through the foreign key, every post they wrote.
    async fn delete_user(&self, id: Uuid) -> RepoResult<bool>;

    // --- Post writes ---
    /// Always stored unpublished with zero views.
    async fn create_post(&self, author_id: Uuid, req: CreatePostRequest) -> RepoResult<Post>;
    /// Merges `changes`, then forces `is_published = false` and refreshes
    /// `last_edited_at`, whatever changed.
    async fn update_post(&self, slug: &str, owner: Option<Uuid>, changes: UpdatePostRequest) -> RepoResult<Option<Post>>;
    /// Sets `is_published = true` and nothing else. Callers must be elevated.
    async fn publish_post(&self, slug: &str) -> RepoResult<Option<Post>>;
    async fn delete_post(&self, slug: &str, owner: Option<Uuid>) -> RepoResult<Option<Post>>;
    /// Bulk delete. `None` removes every post.
    async fn delete_all_in_category(&self, category: Option<&str>) -> RepoResult<u64>;

    // --- Published reads ---
    async fn list_published(&self, page: Page) -> RepoResult<Vec<Post>>;
    async fn list_by_category(&self, category: &str, page: Page) -> RepoResult<Vec<Post>>;
    /// Ordered by views, most viewed first.
    async fn list_popular(&self, page: Page) -> RepoResult<Vec<Post>>;
    /// Returns the published post and atomically bumps its view counter.
    /// The returned `views` is the count before this call's own increment.
    async fn get_published_by_slug(&self, slug: &str) -> RepoResult<Option<Post>>;
    /// Distinct categories of published posts.
    async fn list_categories(&self) -> RepoResult<Vec<String>>;

    // --- Author drafts ---
    async fn list_drafts(&self, author_id: Uuid) -> RepoResult<Vec<Post>>;
    async fn get_draft(&self, author_id: Uuid, slug: &str) -> RepoResult<Option<Post>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
