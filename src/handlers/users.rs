use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{Value, json};
use validator::Validate;

use crate::{
    AppState,
    auth::{AuthUser, OptionalAuthUser},
    error::{AppError, Result},
    models::{RegisterUserRequest, User, UserProfileResponse},
    services::{follow_service, user_service},
};

pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    payload.validate()?;

    let now = state.clock.now();
    let user = user_service::create_user(&state.db, &payload.handle, now).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    auth_user: OptionalAuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<UserProfileResponse>> {
    let user = user_service::get_user_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let stats = follow_service::get_follow_stats(&state.db, user_id).await?;

    let is_following = match auth_user.0 {
        Some(requester) => {
            Some(follow_service::is_following(&state.db, requester.user_id, user_id).await?)
        }
        None => None,
    };

    Ok(Json(UserProfileResponse {
        id: user.id,
        handle: user.handle,
        follower_count: stats.follower_count,
        following_count: stats.following_count,
        is_following,
    }))
}

pub async fn follow_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(user_id): Path<i64>,
) -> Result<(StatusCode, Json<Value>)> {
    let now = state.clock.now();
    follow_service::follow(&state.db, auth_user.user_id, user_id, now).await?;

    Ok((StatusCode::CREATED, Json(json!({ "followed_id": user_id }))))
}

pub async fn unfollow_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<Value>> {
    follow_service::unfollow(&state.db, auth_user.user_id, user_id).await?;

    Ok(Json(json!({ "unfollowed_id": user_id })))
}
