use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    AppState,
    error::{AppError, Result},
    services::user_service,
};

/// Name of the principal header set by the upstream auth collaborator.
/// Token/OAuth verification happens before requests reach this service; by
/// the time a request lands here the header carries a verified user id.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: i64,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<i64>().ok())
            .ok_or_else(|| AppError::Authentication("Missing user identity".to_string()))?;

        // Confirm the account still exists; the header may outlive it.
        user_service::get_user_by_id(&state.db, user_id)
            .await?
            .ok_or_else(|| AppError::Authentication("Unknown user identity".to_string()))?;

        Ok(AuthUser { user_id })
    }
}

// Optional auth user (for endpoints that work with or without identity)
#[derive(Debug)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

impl FromRequestParts<AppState> for OptionalAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(OptionalAuthUser(Some(user))),
            Err(_) => Ok(OptionalAuthUser(None)),
        }
    }
}
