//! Bearer-token authentication and role checks.
//!
//! Tokens are HS256 JWTs signed with the configured secret. The `sub` claim
//! is the acting user's id and `role` selects what they may do.

use axum::{
    extract::{FromRequestParts, Query},
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Doctor,
    Nurse,
    Lab,
    Receptionist,
    Patient,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Nurse => "nurse",
            Role::Lab => "lab",
            Role::Receptionist => "receptionist",
            Role::Patient => "patient",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    /// Expiry, seconds since the Unix epoch
    pub exp: usize,
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub role: Role,
}

impl AuthUser {
    /// Fail with 403 unless the caller holds one of `allowed`.
    pub fn require(&self, allowed: &[Role]) -> Result<(), ApiError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "Role {} may not perform this action",
                self.role.as_str()
            )))
        }
    }
}

/// Browsers cannot set headers on an `EventSource`, so the token may also
/// arrive as `?token=`.
#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn bearer_token(parts: &Parts) -> Result<String, ApiError> {
    if let Some(value) = parts.headers.get(header::AUTHORIZATION) {
        let value = value
            .to_str()
            .map_err(|_| ApiError::Unauthorized("Authorization header is not valid UTF-8".into()))?;
        return value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))
            .map(str::to_string)
            .ok_or_else(|| ApiError::Unauthorized("Authorization header must be 'Bearer <token>'".into()));
    }

    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|q| q.0.token)
        .ok_or_else(|| ApiError::Unauthorized("No token, authorization denied".into()))
}

/// Verify a token and return its claims.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "token rejected");
        ApiError::Unauthorized("Token is not valid".into())
    })
}

/// Sign a token for `user_id` valid for `ttl`.
pub fn issue_token(
    secret: &str,
    user_id: &str,
    role: Role,
    ttl: chrono::Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: user_id.to_string(),
        role,
        exp: (chrono::Utc::now() + ttl).timestamp().max(0) as usize,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = verify_token(&token, &state.config.jwt_secret)?;
        Ok(AuthUser {
            user_id: claims.sub,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let token = issue_token("secret", "u1", Role::Nurse, chrono::Duration::hours(1)).unwrap();
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role, Role::Nurse);
    }

    #[test]
    fn test_wrong_secret_and_expired() {
        let token = issue_token("secret", "u1", Role::Admin, chrono::Duration::hours(1)).unwrap();
        assert!(matches!(verify_token(&token, "other"), Err(ApiError::Unauthorized(_))));

        let expired = issue_token("secret", "u1", Role::Admin, chrono::Duration::hours(-2)).unwrap();
        assert!(matches!(verify_token(&expired, "secret"), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_require_role() {
        let user = AuthUser {
            user_id: "u1".into(),
            role: Role::Lab,
        };
        assert!(user.require(&[Role::Admin, Role::Lab]).is_ok());
        assert!(matches!(user.require(&[Role::Admin]), Err(ApiError::Forbidden(_))));
    }
}
