//! Password hashing, API keys and login tokens, plus the extractors that
//! guard the HTTP routes.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use model::entities::user;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::schemas::AppState;

pub const MISSING_AUTH_HEADER: &str = "缺少 Authorization Header";
pub const INVALID_API_KEY: &str = "无效的 API Key";
pub const INVALID_TOKEN: &str = "登录已失效，请重新登录";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Claims carried by a login token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i32,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 signing material and token lifetime.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl JwtKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn issue(&self, user_id: i32, username: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Checks signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        Ok(decode::<Claims>(token, &self.decoding, &validation)?.claims)
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

/// False for a wrong password and for a malformed hash alike.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// 32 random bytes, hex encoded.
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// The value of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The user a login token was issued to.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i32,
    pub username: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized(MISSING_AUTH_HEADER.to_string()))?;

        let claims = state.jwt.verify(token).map_err(|e| {
            debug!("Rejected token: {}", e);
            ApiError::Unauthorized(INVALID_TOKEN.to_string())
        })?;

        Ok(AuthUser {
            id: claims.sub,
            username: claims.username,
        })
    }
}

/// The owner of the API key the iOS shortcut presents to the webhook.
#[derive(Debug, Clone)]
pub struct ApiKeyUser(pub user::Model);

#[async_trait]
impl FromRequestParts<AppState> for ApiKeyUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let api_key = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized(MISSING_AUTH_HEADER.to_string()))?;

        match user::Entity::find_by_api_key(&state.db, api_key).await? {
            Some(user) => Ok(ApiKeyUser(user)),
            None => {
                warn!("Webhook called with an unknown API key");
                Err(ApiError::Unauthorized(INVALID_API_KEY.to_string()))
            }
        }
    }
}
