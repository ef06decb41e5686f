use axum::{async_trait, extract::FromRequestParts, http::header, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::api_error::ApiError;
use crate::app::AppState;

pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub user_id: Uuid,
    pub email: String,
    pub exp: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminClaims {
    pub admin_id: Uuid,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

/// Expiry `ttl` from now, as a JWT `exp` value.
pub fn expiry_after(ttl: Duration) -> usize {
    (Utc::now() + ttl).timestamp().max(0) as usize
}

pub fn issue_token<C: Serialize>(claims: &C, secret: &str) -> Result<String, ApiError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.into()))
}

fn bearer_claims<C: DeserializeOwned>(parts: &Parts, secret: &str) -> Result<C, ApiError> {
    let header_value = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization token".into()))?;

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Invalid authorization header".into()))?;

    decode::<C>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        ApiError::Unauthorized("Invalid or expired token".into())
    })
}

/// A subscriber authenticated by bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        bearer_claims(parts, state.jwt_secret()).map(AuthenticatedUser)
    }
}

/// An administrator authenticated by bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedAdmin(pub AdminClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims: AdminClaims = bearer_claims(parts, state.jwt_secret())?;
        if claims.role != ADMIN_ROLE {
            return Err(ApiError::Forbidden("Admin access required".into()));
        }
        Ok(AuthenticatedAdmin(claims))
    }
}
