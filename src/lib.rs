pub mod auth;
pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

use axum::{
    Router,
    http::{
        HeaderName, HeaderValue, Method,
        header::{ACCEPT, CONTENT_TYPE},
    },
    routing::{delete, get, post},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{clock::Clock, config::Config};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<Config>,
    pub clock: Clock,
}

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .allowed_origins
                .iter()
                .map(|origin| origin.parse::<HeaderValue>().unwrap())
                .collect::<Vec<_>>(),
        )
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static(auth::USER_ID_HEADER),
        ]);

    // Identity travels per-request in the principal header, so protection is
    // per-handler via the AuthUser extractor rather than a router layer.
    Router::new()
        // User routes
        .route("/api/users", post(handlers::users::register_user))
        .route("/api/users/{user_id}", get(handlers::users::get_user))
        .route(
            "/api/users/{user_id}/follow",
            post(handlers::users::follow_user),
        )
        .route(
            "/api/users/{user_id}/follow",
            delete(handlers::users::unfollow_user),
        )
        // Poll routes
        .route("/api/polls", post(handlers::polls::create_poll))
        .route("/api/polls", get(handlers::polls::list_polls))
        .route("/api/polls/{poll_id}", get(handlers::polls::get_poll))
        .route("/api/polls/{poll_id}", delete(handlers::polls::delete_poll))
        .route("/api/polls/{poll_id}/vote", post(handlers::polls::vote_poll))
        .route(
            "/api/polls/{poll_id}/has_voted",
            get(handlers::polls::has_voted),
        )
        // Comment routes
        .route(
            "/api/polls/{poll_id}/comments",
            post(handlers::comments::comment_poll),
        )
        .route(
            "/api/polls/{poll_id}/comments",
            get(handlers::comments::list_comments),
        )
        .route(
            "/api/comments/{comment_id}/replies",
            post(handlers::comments::reply_comment),
        )
        .route(
            "/api/comments/{comment_id}/like",
            post(handlers::comments::like_comment),
        )
        .route(
            "/api/comments/{comment_id}/like",
            delete(handlers::comments::unlike_comment),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
