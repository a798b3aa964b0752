//! Acting-user extractors
//!
//! Authentication happens upstream; the authenticated account id arrives in
//! the `x-user-id` header.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::AppState;
use crate::{
    error::{AppError, AppResult},
    models::{User, UserId},
    services::admin::Operator,
};

pub const USER_ID_HEADER: &str = "x-user-id";

fn header_user_id(parts: &Parts) -> AppResult<Option<UserId>> {
    let Some(value) = parts.headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|s| s.trim().parse::<UserId>().ok())
        .map(Some)
        .ok_or_else(|| AppError::Unauthorized(format!("malformed {} header", USER_ID_HEADER)))
}

async fn resolve(parts: &Parts, state: &AppState) -> AppResult<Option<User>> {
    let Some(user_id) = header_user_id(parts)? else {
        return Ok(None);
    };
    let user = state
        .store
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("unknown user".to_string()))?;
    if !user.is_active {
        return Err(AppError::Forbidden("account is disabled".to_string()));
    }

    tracing::Span::current().record("user_id", user.id);
    Ok(Some(user))
}

/// The signed-in user; 401 without one, 403 when banned
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve(parts, state)
            .await?
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("sign in required".to_string()))
    }
}

/// The signed-in user when there is one
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve(parts, state).await?))
    }
}

/// A signed-in administrator; 403 for everyone else
pub struct AdminUser(pub User);

impl AdminUser {
    pub fn operator<'a>(&'a self, state: &'a AppState) -> Operator<'a> {
        Operator {
            user: &self.0,
            super_admin_email: &state.super_admin_email,
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            tracing::warn!(target: "audit", user_id = user.id, uri = %parts.uri, "Admin access denied");
            return Err(AppError::Forbidden("administrator access required".to_string()));
        }
        Ok(AdminUser(user))
    }
}
