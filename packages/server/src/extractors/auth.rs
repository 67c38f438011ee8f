use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{HeaderMap, request::Parts},
};
use sea_orm::EntityTrait;

use crate::entity::user;
use crate::error::AppError;
use crate::state::AppState;
use crate::utils::jwt;

/// Authenticated user extracted from the `Authorization: Bearer <token>` header.
///
/// The token is issued by the identity service; the user row is loaded so that
/// plan changes take effect without re-issuing tokens.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i32,
    pub username: String,
    pub plan: String,
}

impl AuthUser {
    /// Resolve a raw bearer token to a user.
    pub async fn from_token(state: &AppState, token: &str) -> Result<Self, AppError> {
        let claims =
            jwt::verify(token, &state.config.auth.jwt_secret).map_err(|_| AppError::TokenInvalid)?;

        let user = user::Entity::find_by_id(claims.uid)
            .one(&state.db)
            .await?
            .ok_or(AppError::TokenInvalid)?;

        Ok(AuthUser {
            user_id: user.id,
            username: user.username,
            plan: user.plan,
        })
    }
}

/// The token from an `Authorization: Bearer` header, if one is present.
///
/// A present header with another scheme is an invalid credential, not an absent one.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AppError> {
    let Some(value) = headers.get("Authorization") else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| AppError::TokenInvalid)?;
    value
        .strip_prefix("Bearer ")
        .map(Some)
        .ok_or(AppError::TokenInvalid)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?.ok_or(AppError::TokenMissing)?;
        AuthUser::from_token(state, token).await
    }
}

/// `Option<AuthUser>`: anonymous when no header is sent, rejected when a bad one is.
impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        match bearer_token(&parts.headers)? {
            Some(token) => AuthUser::from_token(state, token).await.map(Some),
            None => Ok(None),
        }
    }
}
