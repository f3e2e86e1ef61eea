//! Current user extractors
//!
//! The host platform authenticates users and forwards their id in the
//! `X-User-Id` header and their course role in `X-User-Role`. Requests
//! without an id are rejected with 401. Authoring operations additionally
//! need the `staff` role and are rejected with 403 otherwise.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::{ApiError, Error};

pub const USER_HEADER: &str = "x-user-id";
pub const ROLE_HEADER: &str = "x-user-role";
pub const STAFF_ROLE: &str = "staff";

/// Opaque id of the learner making the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| CurrentUser(id.to_string()))
            .ok_or(ApiError(Error::Unauthenticated))
    }
}

/// Course staff member allowed to author the block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for StaffUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(user_id) = CurrentUser::from_request_parts(parts, state).await?;
        let is_staff = parts
            .headers
            .get(ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|role| role.trim().eq_ignore_ascii_case(STAFF_ROLE))
            .unwrap_or(false);

        if !is_staff {
            tracing::debug!(user_id = %user_id, "Staff operation refused");
            return Err(ApiError(Error::Forbidden(format!(
                "{} requires the {} role",
                parts.uri.path(),
                STAFF_ROLE
            ))));
        }
        Ok(StaffUser(user_id))
    }
}
