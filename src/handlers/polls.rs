use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Duration;
use serde::Deserialize;
use serde_json::{Value, json};
use validator::Validate;

use crate::{
    AppState,
    auth::AuthUser,
    error::Result,
    models::{CastVoteRequest, CreatePollRequest, PollFilter, PollSort, PollView},
    services::{poll_service, vote_service},
};

#[derive(Debug, Deserialize)]
pub struct PollListQuery {
    pub filter: Option<String>,
    pub sort: Option<String>,
}

pub async fn create_poll(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreatePollRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    payload.validate()?;

    let now = state.clock.now();
    let expires_at = payload
        .expires_at
        .unwrap_or(now + Duration::hours(state.config.poll_ttl_hours));

    let poll_id = poll_service::create_poll(
        &state.db,
        auth_user.user_id,
        &payload.question,
        &payload.options,
        expires_at,
        now,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(json!({ "poll_id": poll_id }))))
}

pub async fn list_polls(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(params): Query<PollListQuery>,
) -> Result<Json<Vec<PollView>>> {
    let filter = PollFilter::parse(params.filter.as_deref());
    let sort = PollSort::parse(params.sort.as_deref());

    let polls = poll_service::list_polls(&state.db, auth_user.user_id, filter, sort).await?;

    Ok(Json(polls))
}

pub async fn get_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<i64>,
) -> Result<Json<PollView>> {
    let poll = poll_service::get_poll(&state.db, poll_id).await?;

    Ok(Json(poll))
}

pub async fn delete_poll(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(poll_id): Path<i64>,
) -> Result<Json<Value>> {
    poll_service::delete_poll(&state.db, poll_id, auth_user.user_id).await?;

    Ok(Json(json!({ "message": "Poll deleted" })))
}

pub async fn vote_poll(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(poll_id): Path<i64>,
    Json(payload): Json<CastVoteRequest>,
) -> Result<Json<Value>> {
    let now = state.clock.now();
    vote_service::cast_vote(
        &state.db,
        poll_id,
        payload.option_id,
        auth_user.user_id,
        now,
    )
    .await?;

    Ok(Json(json!({ "message": "Vote recorded" })))
}

pub async fn has_voted(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(poll_id): Path<i64>,
) -> Result<Json<Value>> {
    let voted = vote_service::has_voted(&state.db, poll_id, auth_user.user_id).await?;

    Ok(Json(json!({ "voted": voted })))
}
