use async_trait::async_trait;
use sqlx::{PgPool, types::Json};
use uuid::Uuid;

use super::{DuplicateKey, RepoError, RepoResult, Repository};
use crate::models::{CreatePostRequest, Page, Post, SocialPlatform, UpdatePostRequest, User};

const USER_COLUMNS: &str = r#"
    id, name, email, password_hash, role, image,
    twitter, website, instagram, facebook,
    credentials_version, created_at, updated_at
"#;

/// Columns of `Post`, read from a relation aliased `p` joined with its author `u`.
const POST_COLUMNS: &str = r#"
    p.id, p.title, p.slug, p.category, p.content, p.cover_image, p.description,
    p.is_published, p.views, p.created_at, p.last_edited_at,
    u.id AS author_id, u.name AS author_name, u.role AS author_role, u.image AS author_image
"#;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Uniqueness and view counting rely on single-statement atomicity; no
/// multi-statement transactions are used.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// map_sqlx_error
///
/// Unique violations (SQLSTATE 23505) are matched by constraint name; pool and
/// transport failures become `Unavailable`. Everything is logged here, once.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepoError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            let key = match db_err.constraint() {
                Some("posts_slug_key") => DuplicateKey::Slug,
                Some("users_email_key") => DuplicateKey::Email,
                _ if db_err.message().contains("slug") => DuplicateKey::Slug,
                _ => DuplicateKey::Email,
            };
            tracing::debug!("{} rejected: duplicate {:?}", operation, key);
            RepoError::Duplicate(key)
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
            tracing::error!("{} error: {:?}", operation, err);
            RepoError::Unavailable(err.to_string())
        }
        _ => {
            tracing::error!("{} error: {:?}", operation, err);
            RepoError::Store(err.to_string())
        }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn create_user(&self, name: String, email: String, password_hash: String) -> RepoResult<User> {
        let sql = format!(
            "INSERT INTO users (id, name, email, password_hash) VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(email)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_user", e))
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user_by_email", e))
    }

    async fn set_user_image(&self, id: Uuid, image: String) -> RepoResult<Option<User>> {
        let sql = format!(
            "UPDATE users SET image = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(image)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_user_image", e))
    }

    /// set_social_link
    ///
    /// The column name comes from the closed `SocialPlatform` enum, never from input.
    async fn set_social_link(&self, id: Uuid, platform: SocialPlatform, url: String) -> RepoResult<Option<User>> {
        let sql = format!(
            "UPDATE users SET {} = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}",
            platform.column()
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_social_link", e))
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: String) -> RepoResult<Option<User>> {
        let sql = format!(
            r#"UPDATE users
               SET password_hash = $2,
                   credentials_version = credentials_version + 1,
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {USER_COLUMNS}"#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(password_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_password_hash", e))
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|res| res.rows_affected() > 0)
            .map_err(|e| map_sqlx_error("delete_user", e))
    }

    // --- POST WRITES ---

    /// create_post
    ///
    /// Inserts and re-reads with the author JOIN in one statement (CTE).
    async fn create_post(&self, author_id: Uuid, req: CreatePostRequest) -> RepoResult<Post> {
        let sql = format!(
            r#"
            WITH p AS (
                INSERT INTO posts (id, title, slug, category, content, cover_image, description,
                                   is_published, views, author_id, created_at, last_edited_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, false, 0, $8, NOW(), NOW())
                RETURNING *
            )
            SELECT {POST_COLUMNS} FROM p JOIN users u ON u.id = p.author_id
            "#
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(Uuid::new_v4())
            .bind(req.title)
            .bind(req.slug)
            .bind(req.category)
            .bind(Json(req.content))
            .bind(req.cover_image)
            .bind(req.description)
            .bind(author_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_post", e))
    }

    /// update_post
    ///
    /// COALESCE keeps columns whose field is `None`. The publish flag and edit
    /// timestamp are reset unconditionally.
    async fn update_post(&self, slug: &str, owner: Option<Uuid>, changes: UpdatePostRequest) -> RepoResult<Option<Post>> {
        let sql = format!(
            r#"
            WITH p AS (
                UPDATE posts
                SET title = COALESCE($3, title),
                    slug = COALESCE($4, slug),
                    category = COALESCE($5, category),
                    content = COALESCE($6, content),
                    cover_image = COALESCE($7, cover_image),
                    description = COALESCE($8, description),
                    is_published = false,
                    last_edited_at = NOW()
                WHERE slug = $1 AND ($2::uuid IS NULL OR author_id = $2)
                RETURNING *
            )
            SELECT {POST_COLUMNS} FROM p JOIN users u ON u.id = p.author_id
            "#
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(slug)
            .bind(owner)
            .bind(changes.title)
            .bind(changes.slug)
            .bind(changes.category)
            .bind(changes.content.map(Json))
            .bind(changes.cover_image)
            .bind(changes.description)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_post", e))
    }

    async fn publish_post(&self, slug: &str) -> RepoResult<Option<Post>> {
        let sql = format!(
            r#"
            WITH p AS (
                UPDATE posts SET is_published = true WHERE slug = $1 RETURNING *
            )
            SELECT {POST_COLUMNS} FROM p JOIN users u ON u.id = p.author_id
            "#
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("publish_post", e))
    }

    async fn delete_post(&self, slug: &str, owner: Option<Uuid>) -> RepoResult<Option<Post>> {
        let sql = format!(
            r#"
            WITH p AS (
                DELETE FROM posts
                WHERE slug = $1 AND ($2::uuid IS NULL OR author_id = $2)
                RETURNING *
            )
            SELECT {POST_COLUMNS} FROM p JOIN users u ON u.id = p.author_id
            "#
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(slug)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_post", e))
    }

    async fn delete_all_in_category(&self, category: Option<&str>) -> RepoResult<u64> {
        sqlx::query("DELETE FROM posts WHERE ($1::text IS NULL OR category = $1)")
            .bind(category)
            .execute(&self.pool)
            .await
            .map(|res| res.rows_affected())
            .map_err(|e| map_sqlx_error("delete_all_in_category", e))
    }

    // --- PUBLISHED READS ---

    /// list_published
    ///
    /// A NULL limit is `LIMIT ALL` in Postgres, which is how "no limit" is expressed.
    async fn list_published(&self, page: Page) -> RepoResult<Vec<Post>> {
        let sql = format!(
            r#"SELECT {POST_COLUMNS} FROM posts p JOIN users u ON u.id = p.author_id
               WHERE p.is_published = true
               ORDER BY p.created_at DESC
               LIMIT $1 OFFSET $2"#
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(page.limit())
            .bind(page.skip())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_published", e))
    }

    async fn list_by_category(&self, category: &str, page: Page) -> RepoResult<Vec<Post>> {
        let sql = format!(
            r#"SELECT {POST_COLUMNS} FROM posts p JOIN users u ON u.id = p.author_id
               WHERE p.is_published = true AND p.category = $1
               ORDER BY p.created_at DESC
               LIMIT $2 OFFSET $3"#
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(category)
            .bind(page.limit())
            .bind(page.skip())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_by_category", e))
    }

    async fn list_popular(&self, page: Page) -> RepoResult<Vec<Post>> {
        let sql = format!(
            r#"SELECT {POST_COLUMNS} FROM posts p JOIN users u ON u.id = p.author_id
               WHERE p.is_published = true
               ORDER BY p.views DESC, p.created_at DESC
               LIMIT $1 OFFSET $2"#
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(page.limit())
            .bind(page.skip())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_popular", e))
    }

    /// get_published_by_slug
    ///
    /// The increment and the read are one UPDATE, so concurrent readers never
    /// lose a view. `views - 1` reports the count as it was before this call.
    async fn get_published_by_slug(&self, slug: &str) -> RepoResult<Option<Post>> {
        let sql = r#"
            WITH p AS (
                UPDATE posts SET views = views + 1
                WHERE slug = $1 AND is_published = true
                RETURNING *
            )
            SELECT p.id, p.title, p.slug, p.category, p.content, p.cover_image, p.description,
                   p.is_published, p.views - 1 AS views, p.created_at, p.last_edited_at,
                   u.id AS author_id, u.name AS author_name, u.role AS author_role, u.image AS author_image
            FROM p JOIN users u ON u.id = p.author_id
        "#;
        sqlx::query_as::<_, Post>(sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_published_by_slug", e))
    }

    async fn list_categories(&self) -> RepoResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT category FROM posts WHERE is_published = true ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_categories", e))
    }

    // --- AUTHOR DRAFTS ---

    async fn list_drafts(&self, author_id: Uuid) -> RepoResult<Vec<Post>> {
        let sql = format!(
            r#"SELECT {POST_COLUMNS} FROM posts p JOIN users u ON u.id = p.author_id
               WHERE p.author_id = $1 AND p.is_published = false
               ORDER BY p.last_edited_at DESC"#
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(author_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_drafts", e))
    }

    async fn get_draft(&self, author_id: Uuid, slug: &str) -> RepoResult<Option<Post>> {
        let sql = format!(
            r#"SELECT {POST_COLUMNS} FROM posts p JOIN users u ON u.id = p.author_id
               WHERE p.author_id = $1 AND p.slug = $2 AND p.is_published = false"#
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(author_id)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_draft", e))
    }
}
