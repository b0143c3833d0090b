use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use domains::{DomainError, User, UserId};

use crate::{error::ApiError, AppState};

/// The authenticated user behind a request.
///
/// The bearer token is the user id handed out by `POST /session`.
#[derive(Debug, Clone)]
pub struct Caller(pub User);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthorized)?;
        match state.services.identity.lookup_by_id(&UserId::from(token)).await {
            Ok(user) => Ok(Caller(user)),
            Err(DomainError::NotFound { .. }) => Err(ApiError::Unauthorized),
            Err(err) => Err(err.into()),
        }
    }
}
