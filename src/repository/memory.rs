use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DuplicateKey, RepoError, RepoResult, Repository};
use crate::models::{
    AuthorSummary, ContentBlock, CreatePostRequest, Page, Post, Role, SocialMedia, SocialPlatform,
    UpdatePostRequest, User,
};

/// InMemoryRepository
///
/// A `Repository` held entirely in process memory. It enforces the same unique
/// keys, publish filters and ownership scopes as the Postgres store, which makes
/// it the backing store for handler and router tests.
///
/// Each operation runs under a single lock acquisition, mirroring the
/// single-statement atomicity of the SQL implementation.
#[derive(Default)]
pub struct InMemoryRepository {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    posts: Vec<PostRecord>,
    next_seq: u64,
}

#[derive(Debug, Clone)]
struct PostRecord {
    seq: u64,
    id: Uuid,
    title: String,
    slug: String,
    category: String,
    content: Vec<ContentBlock>,
    cover_image: Option<String>,
    description: Option<String>,
    is_published: bool,
    views: i64,
    author_id: Uuid,
    created_at: DateTime<Utc>,
    last_edited_at: DateTime<Utc>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: inserts a user with an explicit role. Roles have no HTTP
    /// endpoint, so seeding managers and admins goes through here.
    pub async fn insert_user(&self, name: &str, email: &str, password_hash: &str, role: Role) -> RepoResult<User> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == email) {
            return Err(RepoError::Duplicate(DuplicateKey::Email));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role,
            image: None,
            social_media: SocialMedia::default(),
            credentials_version: 0,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    /// Test helper: the stored view count, read without incrementing it.
    pub async fn stored_views(&self, slug: &str) -> Option<i64> {
        let state = self.state.read().await;
        state.posts.iter().find(|p| p.slug == slug).map(|p| p.views)
    }
}

impl MemoryState {
    fn hydrate(&self, record: &PostRecord) -> Option<Post> {
        let author = self.users.get(&record.author_id)?;
        Some(Post {
            id: record.id,
            title: record.title.clone(),
            slug: record.slug.clone(),
            category: record.category.clone(),
            content: record.content.clone(),
            cover_image: record.cover_image.clone(),
            description: record.description.clone(),
            is_published: record.is_published,
            views: record.views,
            author: AuthorSummary {
                id: author.id,
                name: author.name.clone(),
                role: author.role,
                image: author.image.clone(),
            },
            created_at: record.created_at,
            last_edited_at: record.last_edited_at,
        })
    }

    fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> bool {
        self.posts
            .iter()
            .any(|p| p.slug == slug && Some(p.id) != except)
    }

    fn position(&self, slug: &str, owner: Option<Uuid>) -> Option<usize> {
        self.posts
            .iter()
            .position(|p| p.slug == slug && owner.is_none_or(|owner| p.author_id == owner))
    }

    /// Newest first, with insertion order breaking timestamp ties.
    fn published_where<F>(&self, filter: F) -> Vec<&PostRecord>
    where
        F: Fn(&PostRecord) -> bool,
    {
        let mut records: Vec<&PostRecord> = self
            .posts
            .iter()
            .filter(|p| p.is_published && filter(*p))
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.seq.cmp(&a.seq)));
        records
    }

    fn paginate(&self, records: Vec<&PostRecord>, page: Page) -> Vec<Post> {
        let skip = usize::try_from(page.skip()).unwrap_or(0);
        let take = page
            .limit()
            .and_then(|limit| usize::try_from(limit).ok())
            .unwrap_or(usize::MAX);
        records
            .into_iter()
            .skip(skip)
            .take(take)
            .filter_map(|record| self.hydrate(record))
            .collect()
    }

    fn update_user<F>(&mut self, id: Uuid, apply: F) -> Option<User>
    where
        F: FnOnce(&mut User),
    {
        let user = self.users.get_mut(&id)?;
        apply(user);
        user.updated_at = Utc::now();
        Some(user.clone())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_user(&self, name: String, email: String, password_hash: String) -> RepoResult<User> {
        self.insert_user(&name, &email, &password_hash, Role::Normal).await
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn set_user_image(&self, id: Uuid, image: String) -> RepoResult<Option<User>> {
        let mut state = self.state.write().await;
        Ok(state.update_user(id, |user| user.image = Some(image)))
    }

    async fn set_social_link(&self, id: Uuid, platform: SocialPlatform, url: String) -> RepoResult<Option<User>> {
        let mut state = self.state.write().await;
        Ok(state.update_user(id, |user| {
            *platform.slot(&mut user.social_media) = Some(url);
        }))
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: String) -> RepoResult<Option<User>> {
        let mut state = self.state.write().await;
        Ok(state.update_user(id, |user| {
            user.password_hash = password_hash;
            user.credentials_version += 1;
        }))
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        let mut state = self.state.write().await;
        let removed = state.users.remove(&id).is_some();
        if removed {
            state.posts.retain(|p| p.author_id != id);
        }
        Ok(removed)
    }

    async fn create_post(&self, author_id: Uuid, req: CreatePostRequest) -> RepoResult<Post> {
        let mut state = self.state.write().await;
        if state.slug_taken(&req.slug, None) {
            return Err(RepoError::Duplicate(DuplicateKey::Slug));
        }
        if !state.users.contains_key(&author_id) {
            return Err(RepoError::Store(format!("author {author_id} does not exist")));
        }
        let now = Utc::now();
        state.next_seq += 1;
        let record = PostRecord {
            seq: state.next_seq,
            id: Uuid::new_v4(),
            title: req.title,
            slug: req.slug,
            category: req.category,
            content: req.content,
            cover_image: req.cover_image,
            description: req.description,
            is_published: false,
            views: 0,
            author_id,
            created_at: now,
            last_edited_at: now,
        };
        let post = state
            .hydrate(&record)
            .ok_or_else(|| RepoError::Store("author vanished during insert".to_string()))?;
        state.posts.push(record);
        Ok(post)
    }

    async fn update_post(&self, slug: &str, owner: Option<Uuid>, changes: UpdatePostRequest) -> RepoResult<Option<Post>> {
        let mut state = self.state.write().await;
        let Some(index) = state.position(slug, owner) else {
            return Ok(None);
        };
        let id = state.posts[index].id;
        if let Some(new_slug) = changes.slug.as_deref() {
            if state.slug_taken(new_slug, Some(id)) {
                return Err(RepoError::Duplicate(DuplicateKey::Slug));
            }
        }

        let record = &mut state.posts[index];
        if let Some(title) = changes.title {
            record.title = title;
        }
        if let Some(slug) = changes.slug {
            record.slug = slug;
        }
        if let Some(category) = changes.category {
            record.category = category;
        }
        if let Some(content) = changes.content {
            record.content = content;
        }
        if let Some(cover_image) = changes.cover_image {
            record.cover_image = Some(cover_image);
        }
        if let Some(description) = changes.description {
            record.description = Some(description);
        }
        record.is_published = false;
        record.last_edited_at = Utc::now();

        let record = state.posts[index].clone();
        Ok(state.hydrate(&record))
    }

    async fn publish_post(&self, slug: &str) -> RepoResult<Option<Post>> {
        let mut state = self.state.write().await;
        let Some(index) = state.position(slug, None) else {
            return Ok(None);
        };
        state.posts[index].is_published = true;
        let record = state.posts[index].clone();
        Ok(state.hydrate(&record))
    }

    async fn delete_post(&self, slug: &str, owner: Option<Uuid>) -> RepoResult<Option<Post>> {
        let mut state = self.state.write().await;
        let Some(index) = state.position(slug, owner) else {
            return Ok(None);
        };
        let record = state.posts.remove(index);
        Ok(state.hydrate(&record))
    }

    async fn delete_all_in_category(&self, category: Option<&str>) -> RepoResult<u64> {
        let mut state = self.state.write().await;
        let before = state.posts.len();
        state
            .posts
            .retain(|p| category.is_some_and(|category| p.category != category));
        Ok((before - state.posts.len()) as u64)
    }

    async fn list_published(&self, page: Page) -> RepoResult<Vec<Post>> {
        let state = self.state.read().await;
        let records = state.published_where(|_| true);
        Ok(state.paginate(records, page))
    }

    async fn list_by_category(&self, category: &str, page: Page) -> RepoResult<Vec<Post>> {
        let state = self.state.read().await;
        let records = state.published_where(|p| p.category == category);
        Ok(state.paginate(records, page))
    }

    async fn list_popular(&self, page: Page) -> RepoResult<Vec<Post>> {
        let state = self.state.read().await;
        let mut records = state.published_where(|_| true);
        // Stable sort keeps newest-first among equal view counts.
        records.sort_by(|a, b| b.views.cmp(&a.views));
        Ok(state.paginate(records, page))
    }

    async fn get_published_by_slug(&self, slug: &str) -> RepoResult<Option<Post>> {
        let mut state = self.state.write().await;
        let Some(index) = state
            .posts
            .iter()
            .position(|p| p.slug == slug && p.is_published)
        else {
            return Ok(None);
        };
        let before = state.posts[index].clone();
        state.posts[index].views += 1;
        Ok(state.hydrate(&before))
    }

    async fn list_categories(&self) -> RepoResult<Vec<String>> {
        let state = self.state.read().await;
        let mut categories: Vec<String> = state
            .posts
            .iter()
            .filter(|p| p.is_published)
            .map(|p| p.category.clone())
            .collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    async fn list_drafts(&self, author_id: Uuid) -> RepoResult<Vec<Post>> {
        let state = self.state.read().await;
        let mut records: Vec<&PostRecord> = state
            .posts
            .iter()
            .filter(|p| p.author_id == author_id && !p.is_published)
            .collect();
        records.sort_by(|a, b| b.last_edited_at.cmp(&a.last_edited_at).then(b.seq.cmp(&a.seq)));
        Ok(records.into_iter().filter_map(|r| state.hydrate(r)).collect())
    }

    async fn get_draft(&self, author_id: Uuid, slug: &str) -> RepoResult<Option<Post>> {
        let state = self.state.read().await;
        Ok(state
            .posts
            .iter()
            .find(|p| p.author_id == author_id && p.slug == slug && !p.is_published)
            .and_then(|record| state.hydrate(record)))
    }
}
