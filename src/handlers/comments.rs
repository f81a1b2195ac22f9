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
    error::Result,
    models::{CommentView, CreateCommentRequest},
    services::comment_service,
};

pub async fn comment_poll(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(poll_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    payload.validate()?;

    let now = state.clock.now();
    let comment_id = comment_service::post_root_comment(
        &state.db,
        poll_id,
        auth_user.user_id,
        &payload.comment_text,
        now,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(json!({ "comment_id": comment_id }))))
}

pub async fn reply_comment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(comment_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    payload.validate()?;

    let now = state.clock.now();
    let reply_id = comment_service::post_reply(
        &state.db,
        comment_id,
        auth_user.user_id,
        &payload.comment_text,
        now,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(json!({ "comment_id": reply_id }))))
}

pub async fn list_comments(
    State(state): State<AppState>,
    auth_user: OptionalAuthUser,
    Path(poll_id): Path<i64>,
) -> Result<Json<Vec<CommentView>>> {
    let requester_id = auth_user.0.map(|user| user.user_id);
    let comments = comment_service::list_comments(&state.db, poll_id, requester_id).await?;

    Ok(Json(comments))
}

pub async fn like_comment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(comment_id): Path<i64>,
) -> Result<Json<Value>> {
    let now = state.clock.now();
    let like_count =
        comment_service::like_comment(&state.db, comment_id, auth_user.user_id, now).await?;

    Ok(Json(json!({ "like_count": like_count })))
}

pub async fn unlike_comment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(comment_id): Path<i64>,
) -> Result<Json<Value>> {
    let like_count =
        comment_service::unlike_comment(&state.db, comment_id, auth_user.user_id).await?;

    Ok(Json(json!({ "like_count": like_count })))
}
