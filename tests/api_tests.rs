use blog_api::{
    AppConfig, AppState, InMemoryRepository, create_router,
    models::{LoginResponse, PostListResponse, PostResponse, Role},
    password::hash_password,
    repository::RepositoryState,
};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;

const PASSWORD: &str = "longenough";

pub struct TestApp {
    pub address: String,
    pub repo: Arc<InMemoryRepository>,
    pub client: reqwest::Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Seeds a user directly in the store and logs in over HTTP.
    async fn login_as(&self, email: &str, role: Role) -> String {
        let hash = hash_password(PASSWORD.to_string(), 4).await.unwrap();
        self.repo
            .insert_user("Api User", email, &hash, role)
            .await
            .unwrap();

        let response = self
            .client
            .post(self.url("/api/user/login"))
            .json(&json!({ "email": email, "password": PASSWORD }))
            .send()
            .await
            .expect("login request failed");
        assert_eq!(response.status(), StatusCode::OK);
        let body: LoginResponse = response.json().await.unwrap();
        body.token
    }

    async fn create_post(&self, token: &str, slug: &str, category: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/blog/create"))
            .bearer_auth(token)
            .json(&json!({
                "title": format!("Post {slug}"),
                "slug": slug,
                "category": category,
                "content": [{ "type": "paragraph", "text": "Lorem ipsum" }],
                "description": "Short"
            }))
            .send()
            .await
            .unwrap()
    }
}

async fn spawn_app() -> TestApp {
    let repo = Arc::new(InMemoryRepository::new());
    let state = AppState::new(repo.clone() as RepositoryState, AppConfig::default());
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        repo,
        client: reqwest::Client::new(),
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;

    let response = app.client.get(app.url("/health")).send().await.expect("req fail");

    assert!(response.status().is_success());
    // Request ids are generated and echoed back.
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_hello() {
    let app = spawn_app().await;

    let body: Value = app
        .client
        .get(app.url("/api/"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["message"], "Hello World!");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/api-docs/openapi.json"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let doc: Value = response.json().await.unwrap();
    assert!(doc["paths"]["/api/blog/publish/{slug}"].is_object());
}

#[tokio::test]
async fn test_authenticated_routes_reject_missing_token() {
    let app = spawn_app().await;

    for path in ["/api/user/", "/api/blog/drafts", "/api/user/getRole"] {
        let response = app.client.get(app.url(path)).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{path}");
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["message"], "You are not logged in");
    }

    let response = app
        .client
        .post(app.url("/api/blog/create"))
        .bearer_auth("garbage")
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_manager_routes_reject_normal_users() {
    let app = spawn_app().await;
    let token = app.login_as("plain@example.com", Role::Normal).await;

    let response = app
        .client
        .post(app.url("/api/user/create"))
        .bearer_auth(&token)
        .json(&json!({ "email": "x@example.com", "name": "Xavier", "password": PASSWORD }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["message"],
        "User must be admin or manager to perform this action"
    );
}

#[tokio::test]
async fn test_login_validation_errors() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/user/login"))
        .json(&json!({ "email": "not-an-email", "password": "short" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["errors"]["email"], "Invalid email");
    assert_eq!(body["errors"]["password"], "Password must be 8 to 100 characters");
}

#[tokio::test]
async fn test_user_creation_by_manager() {
    let app = spawn_app().await;
    let token = app.login_as("hr@example.com", Role::Manager).await;
    let payload = json!({ "email": "a@x.com", "name": "Alice", "password": PASSWORD });

    let created = app
        .client
        .post(app.url("/api/user/create"))
        .bearer_auth(&token)
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let body: Value = created.json().await.unwrap();
    assert_eq!(body["user"]["role"], "normal");
    assert!(body["user"].get("password").is_none());
    assert!(body["user"].get("passwordHash").is_none());

    let duplicate = app
        .client
        .post(app.url("/api/user/create"))
        .bearer_auth(&token)
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    let body: Value = duplicate.json().await.unwrap();
    assert_eq!(body["message"], "Email already exists");
}

#[tokio::test]
async fn test_post_lifecycle() {
    let app = spawn_app().await;
    let author = app.login_as("author@example.com", Role::Normal).await;
    let manager = app.login_as("manager@example.com", Role::Manager).await;

    // Create (draft)
    let response = app.create_post(&author, "hello", "general").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: PostResponse = response.json().await.unwrap();
    assert!(!created.blog.is_published);

    // Slug collision
    let response = app.create_post(&author, "hello", "general").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Not public yet
    let list: PostListResponse = app
        .client
        .get(app.url("/api/blog/getAll"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list.blogs.is_empty());

    // Authors cannot publish their own posts
    let response = app
        .client
        .post(app.url("/api/blog/publish/hello"))
        .bearer_auth(&author)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Manager publishes
    let response = app
        .client
        .post(app.url("/api/blog/publish/hello"))
        .bearer_auth(&manager)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let list: PostListResponse = app
        .client
        .get(app.url("/api/blog/getAll"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.blogs.len(), 1);
    assert_eq!(list.blogs[0].views, 0);

    // Reading by slug records a view
    let read: PostResponse = app
        .client
        .get(app.url("/api/blog/slug?query=hello"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(read.blog.views, 0);
    assert_eq!(app.repo.stored_views("hello").await, Some(1));

    // Editing sends it back to draft
    let response = app
        .client
        .post(app.url("/api/blog/update/hello"))
        .bearer_auth(&author)
        .json(&json!({ "description": "Updated" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: PostResponse = response.json().await.unwrap();
    assert!(!updated.blog.is_published);

    let response = app
        .client
        .get(app.url("/api/blog/slug?query=hello"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let drafts: PostListResponse = app
        .client
        .get(app.url("/api/blog/drafts"))
        .bearer_auth(&author)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(drafts.blogs.len(), 1);

    // Delete
    let response = app
        .client
        .delete(app.url("/api/blog/delete?slug=hello"))
        .bearer_auth(&author)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.repo.stored_views("hello").await, None);
}

#[tokio::test]
async fn test_foreign_delete_is_not_found() {
    let app = spawn_app().await;
    let owner = app.login_as("owner@example.com", Role::Normal).await;
    let other = app.login_as("other@example.com", Role::Normal).await;
    let admin = app.login_as("admin@example.com", Role::Admin).await;
    app.create_post(&owner, "keep-out", "general").await;

    let response = app
        .client
        .delete(app.url("/api/blog/delete?slug=keep-out"))
        .bearer_auth(&other)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .client
        .delete(app.url("/api/blog/delete?slug=keep-out"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_pagination_rejects_negative_values() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/api/blog/getAll?limit=-1"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_deleted_account_token_stops_working() {
    let app = spawn_app().await;
    let token = app.login_as("leaving@example.com", Role::Normal).await;

    let response = app
        .client
        .post(app.url("/api/user/delete"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .client
        .get(app.url("/api/user/"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bulk_delete_with_blank_category_is_rejected() {
    let app = spawn_app().await;
    let author = app.login_as("writer@example.com", Role::Normal).await;
    let manager = app.login_as("boss@example.com", Role::Manager).await;
    app.create_post(&author, "survivor", "general").await;

    let response = app
        .client
        .delete(app.url("/api/blog/all?category="))
        .bearer_auth(&manager)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["errors"]["category"], "Category must not be empty");
    assert_eq!(app.repo.stored_views("survivor").await, Some(0));
}
