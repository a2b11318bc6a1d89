use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::{Role, User},
    repository::RepositoryState,
};

/// Claims
///
/// The payload of every token this service issues. The role is informational only:
/// gating always uses the role currently stored for `sub`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's id.
    pub sub: Uuid,
    pub role: Role,
    /// Expiration Time (seconds since epoch).
    pub exp: usize,
    /// Issued At (seconds since epoch).
    pub iat: usize,
}

/// issue_token
///
/// Signs an HS256 JWT for `user`, valid for `config.jwt_ttl_hours`.
pub fn issue_token(user: &User, config: &AppConfig) -> Result<String, ApiError> {
    let bad_ttl =
        || ApiError::Internal(format!("invalid token lifetime: {}h", config.jwt_ttl_hours));

    let now = Utc::now();
    let expires_at = Duration::try_hours(config.jwt_ttl_hours)
        .filter(|ttl| *ttl > Duration::zero())
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(bad_ttl)?;
    let claims = Claims {
        sub: user.id,
        role: user.role,
        iat: usize::try_from(now.timestamp()).map_err(|_| bad_ttl())?,
        exp: usize::try_from(expires_at.timestamp()).map_err(|_| bad_ttl())?,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
}

/// decode_token
///
/// Verifies signature and expiry. Any failure is reported the same way to the client.
pub fn decode_token(token: &str, config: &AppConfig) -> Result<Claims, ApiError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!("rejected token: {:?}", e.kind());
        ApiError::Forbidden("Invalid or expired token".to_string())
    })
}

// --- Password Hashing ---

/// hash_password
///
/// Argon2id with a random salt, encoded as a PHC string.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

/// verify_password
///
/// A stored hash that cannot be parsed never verifies.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("unparseable password hash: {}", e);
            false
        }
    }
}

// --- Request Identity ---

/// AuthUser
///
/// The resolved identity of an authenticated request. Handlers take it as an argument and
/// call `require_staff` / `require_admin` for role gates.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    /// Editors and admins manage the villa catalog.
    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin/Editor access required".to_string()))
        }
    }

    /// Only admins manage user accounts.
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin access required".to_string()))
        }
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Local Bypass: in `Env::Local`, an `x-user-id` header naming an active user.
/// 2. Token Extraction: `Authorization: Bearer <token>`, else 401.
/// 3. Token Validation: signature and expiry, else 403.
/// 4. DB Lookup: the user must still exist and be active, else 401.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|id_str| Uuid::parse_str(id_str).ok());

            if let Some(user_id) = bypass_id {
                if let Some(user) = repo.get_user(user_id).await? {
                    if user.is_active {
                        return Ok(AuthUser {
                            id: user.id,
                            role: user.role,
                        });
                    }
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Access token required".to_string()))?;

        let claims = decode_token(token, &config)?;

        let user = repo
            .get_user(claims.sub)
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(|| ApiError::Unauthorized("User not found or inactive".to_string()))?;

        Ok(AuthUser {
            id: user.id,
            role: user.role,
        })
    }
}
