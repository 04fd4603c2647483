use crate::error::ApiError;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use bridge24_core::models::{SessionToken, User};
use bridge24_core::store::traits::UserStore;
use bridge24_core::Error as CoreError;
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use ulid::Ulid;
use uuid::Uuid;

/// How long an issued session token stays valid.
pub const TOKEN_TTL_DAYS: i64 = 7;

/// Auth provider that validates `Authorization: Bearer ...` tokens against
/// the user store.
///
/// Token format: `b24_<uuid>.<secret>` (`:` accepted as separator). Only the
/// SHA-256 of the secret is stored.
#[derive(Clone)]
pub struct SessionAuth {
    users: Arc<dyn UserStore>,
}

impl SessionAuth {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// bcrypt with the default cost factor.
    pub fn hash_password(password: &str) -> Result<String, CoreError> {
        bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| CoreError::backend("bcrypt hash", e))
    }

    pub fn verify_password(password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }

    /// Mint and persist a fresh session token for the user; returns the
    /// bearer string handed to the client.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn issue_token(&self, user_id: Uuid) -> Result<String, CoreError> {
        let token_id = Uuid::new_v4();
        let secret = format!("{}{}", Ulid::new(), Ulid::new());
        let created_at = Utc::now();

        let record = SessionToken {
            token_id,
            user_id,
            secret_hash: sha256_hex(secret.as_bytes()),
            created_at,
            expires_at: Some(created_at + Duration::days(TOKEN_TTL_DAYS)),
            last_used_at: None,
        };
        self.users.insert_token(&record).await?;

        Ok(format_token(token_id, &secret))
    }

    /// Revoke one token (logout).
    pub async fn revoke_token(&self, token_id: Uuid) -> Result<(), CoreError> {
        self.users.delete_token(token_id).await
    }

    /// Resolve the bearer token in `headers` to a user.
    ///
    /// `Ok(None)` means no Authorization header was presented at all;
    /// anything presented but invalid is an error.
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<(User, Uuid)>, ApiError> {
        let Some(authz) = headers.get(AUTHORIZATION) else {
            return Ok(None);
        };
        let authz = authz.to_str().map_err(|_| {
            ApiError::Core(CoreError::Unauthorized(
                "invalid authorization header".into(),
            ))
        })?;

        let token = authz
            .strip_prefix("Bearer ")
            .or_else(|| authz.strip_prefix("bearer "))
            .ok_or_else(|| {
                ApiError::Core(CoreError::Unauthorized(
                    "unsupported authorization scheme".into(),
                ))
            })?
            .trim();

        let (token_id, secret) = parse_token(token)
            .ok_or_else(|| ApiError::Core(CoreError::Unauthorized("invalid token format".into())))?;

        let Some(rec) = self.users.get_token(token_id).await.map_err(ApiError::Core)? else {
            return Err(ApiError::Core(CoreError::Unauthorized(
                "invalid token".into(),
            )));
        };

        if let Some(exp) = rec.expires_at {
            if exp < Utc::now() {
                return Err(ApiError::Core(CoreError::Unauthorized(
                    "token expired".into(),
                )));
            }
        }

        if sha256_hex(secret.as_bytes()) != rec.secret_hash {
            return Err(ApiError::Core(CoreError::Unauthorized(
                "invalid token".into(),
            )));
        }

        let Some(user) = self.users.get_user(rec.user_id).await.map_err(ApiError::Core)? else {
            return Err(ApiError::Core(CoreError::Unauthorized(
                "token user no longer exists".into(),
            )));
        };

        // Best-effort usage tracking.
        let _ = self
            .users
            .touch_token_last_used(token_id, Utc::now())
            .await;

        Ok(Some((user, token_id)))
    }
}

pub fn format_token(token_id: Uuid, secret: &str) -> String {
    format!("b24_{token_id}.{secret}")
}

fn parse_token(token: &str) -> Option<(Uuid, String)> {
    let t = token.trim();
    let t = t.strip_prefix("b24_").unwrap_or(t);
    let (id_str, secret) = t.split_once('.').or_else(|| t.split_once(':'))?;
    let token_id = Uuid::parse_str(id_str.trim()).ok()?;
    let secret = secret.trim();
    if secret.is_empty() {
        return None;
    }
    Some((token_id, secret.to_string()))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    let out = h.finalize();
    let mut s = String::with_capacity(out.len() * 2);
    for b in out {
        use std::fmt::Write as _;
        let _ = write!(&mut s, "{:02x}", b);
    }
    s
}
