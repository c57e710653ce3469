use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{AppError, ELEVATED_ONLY},
    models::Role,
    repository::RepositoryState,
};

// --- Token Codec ---

/// Claims
///
/// Payload of an access token. `role` is informational only: the live role is
/// re-read from the store on every request (see [`AuthUser`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's id.
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Issued at, seconds since the epoch.
    pub iat: u64,
    /// The user's credentials version when the token was signed. Any other
    /// stored version means the password changed since.
    pub ver: i64,
    /// Expiry, seconds since the epoch. Absent for non-expiring tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// TokenCodec
///
/// Issues and decodes HS256 access tokens with the process-wide signing secret.
/// Built once from the configured secret and shared through the application state.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` is optional, but enforced whenever it is present.
        validation.required_spec_claims.clear();
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// issue
    ///
    /// Signs a token for `id` bound to `credentials_version`. With a `ttl`, the
    /// token carries an expiry that [`TokenCodec::decode`] enforces.
    pub fn issue(
        &self,
        id: Uuid,
        role: Option<Role>,
        credentials_version: i64,
        ttl: Option<Duration>,
    ) -> Result<String, AppError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AppError::Internal(format!("system clock before epoch: {e}")))?
            .as_secs();

        let claims = Claims {
            sub: id,
            role,
            iat: now,
            ver: credentials_version,
            exp: ttl.map(|ttl| now + ttl.as_secs()),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("token encoding failed: {e}")))
    }

    /// decode
    ///
    /// `None` for a bad signature, a malformed payload or an expired token.
    /// Never consults the store.
    pub fn decode(&self, token: &str) -> Option<Claims> {
        match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!("token rejected: {:?}", e.kind());
                None
            }
        }
    }
}

// --- Identity ---

/// AuthUser
///
/// The resolved identity of an authenticated request. Its role is the one stored
/// for the user at the time of the request, not the one embedded in the token:
/// a token's authority is only as current as the last store read.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

/// Extracts the credential from an `Authorization: Bearer <token>` header.
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// AuthUser Extractor Implementation
///
/// 1. Reuses an identity already resolved earlier in the same request (the
///    authentication layer stores it in the request extensions).
/// 2. Decodes the bearer token.
/// 3. Re-reads the user: rejects deleted users and tokens signed for an older
///    credentials version, and takes the live role.
///
/// Rejection: `AppError::Unauthenticated` (401) on any failure; a store outage
/// surfaces as 503 instead.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenCodec: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let token = bearer_token(parts).ok_or(AppError::Unauthenticated)?;
        let claims = TokenCodec::from_ref(state)
            .decode(token)
            .ok_or(AppError::Unauthenticated)?;

        let repo = RepositoryState::from_ref(state);
        let user = repo.get_user(claims.sub).await?.ok_or_else(|| {
            tracing::debug!(user_id = %claims.sub, "token subject no longer exists");
            AppError::Unauthenticated
        })?;

        if claims.ver != user.credentials_version {
            tracing::debug!(
                user_id = %user.id,
                token_version = claims.ver,
                stored_version = user.credentials_version,
                "token predates credentials change"
            );
            return Err(AppError::Unauthenticated);
        }

        let auth_user = AuthUser {
            id: user.id,
            role: user.role,
        };
        parts.extensions.insert(auth_user.clone());
        Ok(auth_user)
    }
}

// --- Authorization Gate ---

/// OwnerScope
///
/// Outcome of [`AuthUser::require_owner_or_role`], passed to ownership-scoped
/// repository writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerScope {
    /// Elevated caller: act on any record.
    Any,
    /// Only records authored by this user.
    Owner(Uuid),
}

impl OwnerScope {
    pub fn owner(&self) -> Option<Uuid> {
        match self {
            OwnerScope::Any => None,
            OwnerScope::Owner(id) => Some(*id),
        }
    }
}

impl AuthUser {
    /// Passes only if the caller's role is one of `allowed`.
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AppError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.id, role = %self.role, "role check failed");
            Err(AppError::Forbidden(ELEVATED_ONLY.to_string()))
        }
    }

    /// Callers holding one of `allowed` bypass ownership; everyone else is
    /// confined to their own records. A write under `Owner` that matches
    /// nothing is reported as not found, so other users' posts are not revealed.
    pub fn require_owner_or_role(&self, allowed: &[Role]) -> OwnerScope {
        if allowed.contains(&self.role) {
            OwnerScope::Any
        } else {
            OwnerScope::Owner(self.id)
        }
    }
}
