use axum::{
    Json,
    extract::{FromRequestParts, State},
    http::{Request, header, request::Parts},
};
use blog_api::{
    AppConfig, AppState, InMemoryRepository,
    auth::{AuthUser, Claims, OwnerScope, TokenCodec},
    error::AppError,
    handlers::users,
    models::{ChangePasswordRequest, LoginRequest, Role, User},
    password::hash_password,
    repository::{Repository, RepositoryState},
    validation::ValidatedJson,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use uuid::Uuid;

const TEST_SECRET: &str = "super-secure-test-secret-value-local";
const OLD_PASSWORD: &str = "original-password";

// --- Helpers ---

fn test_state(repo: Arc<InMemoryRepository>) -> AppState {
    AppState::new(repo as RepositoryState, AppConfig::default())
}

async fn seed_user(repo: &InMemoryRepository, email: &str, role: Role) -> User {
    repo.insert_user("Test User", email, "not-a-real-hash", role)
        .await
        .unwrap()
}

fn parts_with_auth(value: Option<String>) -> Parts {
    let mut builder = Request::builder().uri("/api/user/");
    if let Some(value) = value {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(()).unwrap().into_parts().0
}

fn bearer(token: &str) -> Option<String> {
    Some(format!("Bearer {token}"))
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

// --- Token Codec ---

#[test]
fn test_issue_then_decode_round_trips_id_and_role() {
    let codec = TokenCodec::new(TEST_SECRET);
    let id = Uuid::new_v4();

    let token = codec
        .issue(id, Some(Role::Manager), 3, Some(Duration::from_secs(60)))
        .unwrap();
    let claims = codec.decode(&token).expect("token should decode");

    assert_eq!(claims.sub, id);
    assert_eq!(claims.role, Some(Role::Manager));
    assert_eq!(claims.ver, 3);
    assert_eq!(claims.exp, Some(claims.iat + 60));
}

#[test]
fn test_issue_without_ttl_has_no_expiry() {
    let codec = TokenCodec::new(TEST_SECRET);

    let token = codec.issue(Uuid::new_v4(), None, 0, None).unwrap();
    let claims = codec.decode(&token).unwrap();

    assert_eq!(claims.exp, None);
    assert_eq!(claims.role, None);
}

#[test]
fn test_decode_rejects_tampered_token() {
    let codec = TokenCodec::new(TEST_SECRET);
    let token = codec.issue(Uuid::new_v4(), Some(Role::Normal), 0, None).unwrap();

    // Flip one character of the payload segment.
    let mut segments: Vec<String> = token.split('.').map(str::to_string).collect();
    let payload = &mut segments[1];
    let last = payload.pop().unwrap();
    payload.push(if last == 'A' { 'B' } else { 'A' });
    let tampered = segments.join(".");

    assert!(codec.decode(&tampered).is_none());
}

#[test]
fn test_decode_rejects_token_signed_with_other_secret() {
    let token = TokenCodec::new("another-secret")
        .issue(Uuid::new_v4(), None, 0, None)
        .unwrap();

    assert!(TokenCodec::new(TEST_SECRET).decode(&token).is_none());
}

#[test]
fn test_decode_rejects_expired_token() {
    let now = now_secs();
    let claims = Claims {
        sub: Uuid::new_v4(),
        role: None,
        iat: now - 120,
        ver: 0,
        exp: Some(now - 60),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap();

    assert!(TokenCodec::new(TEST_SECRET).decode(&token).is_none());
}

#[test]
fn test_decode_rejects_garbage() {
    assert!(TokenCodec::new(TEST_SECRET).decode("not.a.jwt").is_none());
    assert!(TokenCodec::new(TEST_SECRET).decode("").is_none());
}

// --- AuthUser Extractor ---

#[tokio::test]
async fn test_auth_user_resolves_valid_token() {
    let repo = Arc::new(InMemoryRepository::new());
    let user = seed_user(&repo, "valid@example.com", Role::Normal).await;
    let state = test_state(repo);
    let token = state
        .tokens
        .issue(user.id, Some(user.role), user.credentials_version, None)
        .unwrap();

    let mut parts = parts_with_auth(bearer(&token));
    let auth = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();

    assert_eq!(auth.id, user.id);
    assert_eq!(auth.role, Role::Normal);
    // Cached for later extractors in the same request.
    assert_eq!(parts.extensions.get::<AuthUser>(), Some(&auth));
}

#[tokio::test]
async fn test_auth_user_takes_live_role_over_token_claim() {
    let repo = Arc::new(InMemoryRepository::new());
    let user = seed_user(&repo, "promoted@example.com", Role::Manager).await;
    let state = test_state(repo);
    let stale = state.tokens.issue(user.id, Some(Role::Normal), 0, None).unwrap();

    let mut parts = parts_with_auth(bearer(&stale));
    let auth = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();

    assert_eq!(auth.role, Role::Manager);
}

#[tokio::test]
async fn test_auth_user_missing_header_is_unauthenticated() {
    let state = test_state(Arc::new(InMemoryRepository::new()));

    let mut parts = parts_with_auth(None);
    let result = AuthUser::from_request_parts(&mut parts, &state).await;

    assert!(matches!(result, Err(AppError::Unauthenticated)));
}

#[tokio::test]
async fn test_auth_user_rejects_non_bearer_scheme() {
    let repo = Arc::new(InMemoryRepository::new());
    let user = seed_user(&repo, "basic@example.com", Role::Normal).await;
    let state = test_state(repo);
    let token = state.tokens.issue(user.id, None, 0, None).unwrap();

    let mut parts = parts_with_auth(Some(format!("Basic {token}")));
    let result = AuthUser::from_request_parts(&mut parts, &state).await;

    assert!(matches!(result, Err(AppError::Unauthenticated)));
}

#[tokio::test]
async fn test_auth_user_rejects_deleted_user() {
    let repo = Arc::new(InMemoryRepository::new());
    let user = seed_user(&repo, "gone@example.com", Role::Admin).await;
    let state = test_state(repo.clone());
    let token = state.tokens.issue(user.id, Some(Role::Admin), 0, None).unwrap();

    assert!(repo.delete_user(user.id).await.unwrap());

    let mut parts = parts_with_auth(bearer(&token));
    let result = AuthUser::from_request_parts(&mut parts, &state).await;

    assert!(matches!(result, Err(AppError::Unauthenticated)));
}

#[tokio::test]
async fn test_auth_user_rejects_token_for_older_credentials_version() {
    let repo = Arc::new(InMemoryRepository::new());
    let user = seed_user(&repo, "rotated@example.com", Role::Normal).await;
    let state = test_state(repo.clone());
    let token = state.tokens.issue(user.id, None, user.credentials_version, None).unwrap();

    let rotated = repo
        .set_password_hash(user.id, "another-hash".to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rotated.credentials_version, user.credentials_version + 1);

    let mut parts = parts_with_auth(bearer(&token));
    let result = AuthUser::from_request_parts(&mut parts, &state).await;

    assert!(matches!(result, Err(AppError::Unauthenticated)));
}

#[tokio::test]
async fn test_change_password_revokes_tokens_from_the_same_second() {
    let repo = Arc::new(InMemoryRepository::new());
    let hash = hash_password(OLD_PASSWORD.to_string(), 4).await.unwrap();
    repo.insert_user("Rotating User", "same-second@example.com", &hash, Role::Normal)
        .await
        .unwrap();
    let state = test_state(repo);

    let Json(session) = users::login(
        State(state.clone()),
        ValidatedJson(LoginRequest {
            email: "same-second@example.com".to_string(),
            password: OLD_PASSWORD.to_string(),
        }),
    )
    .await
    .unwrap();

    let mut parts = parts_with_auth(bearer(&session.token));
    let auth = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();

    // No delay: the old token and the change share the same `iat` second.
    let Json(changed) = users::change_password(
        auth.clone(),
        State(state.clone()),
        ValidatedJson(ChangePasswordRequest {
            password: "brand-new-password".to_string(),
            old_password: OLD_PASSWORD.to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(changed.message, "Password changed");

    let mut parts = parts_with_auth(bearer(&session.token));
    let old = AuthUser::from_request_parts(&mut parts, &state).await;
    assert!(matches!(old, Err(AppError::Unauthenticated)));

    let mut parts = parts_with_auth(bearer(&changed.token));
    let new = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(new, auth);
}

#[tokio::test]
async fn test_auth_user_rejects_token_signed_elsewhere() {
    let repo = Arc::new(InMemoryRepository::new());
    let user = seed_user(&repo, "forged@example.com", Role::Admin).await;
    let state = test_state(repo);
    let forged = TokenCodec::new("attacker-secret")
        .issue(user.id, Some(Role::Admin), 0, None)
        .unwrap();

    let mut parts = parts_with_auth(bearer(&forged));
    let result = AuthUser::from_request_parts(&mut parts, &state).await;

    assert!(matches!(result, Err(AppError::Unauthenticated)));
}

// --- Authorization Gate ---

#[test]
fn test_require_role() {
    let manager = AuthUser {
        id: Uuid::new_v4(),
        role: Role::Manager,
    };
    let normal = AuthUser {
        id: Uuid::new_v4(),
        role: Role::Normal,
    };

    assert!(manager.require_role(Role::ELEVATED).is_ok());
    assert!(matches!(
        normal.require_role(Role::ELEVATED),
        Err(AppError::Forbidden(_))
    ));
    assert!(normal.require_role(&[Role::Normal]).is_ok());
}

#[test]
fn test_require_owner_or_role_scopes_normal_users() {
    let normal = AuthUser {
        id: Uuid::new_v4(),
        role: Role::Normal,
    };
    let admin = AuthUser {
        id: Uuid::new_v4(),
        role: Role::Admin,
    };

    let scope = normal.require_owner_or_role(Role::ELEVATED);
    assert_eq!(scope, OwnerScope::Owner(normal.id));
    assert_eq!(scope.owner(), Some(normal.id));

    let scope = admin.require_owner_or_role(Role::ELEVATED);
    assert_eq!(scope, OwnerScope::Any);
    assert_eq!(scope.owner(), None);
}
