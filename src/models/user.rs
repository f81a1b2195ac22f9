use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub handle: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Validate, Deserialize)]
pub struct RegisterUserRequest {
    #[validate(length(min = 1, max = 64))]
    pub handle: String,
}

#[derive(Debug, Serialize)]
pub struct UserProfileResponse {
    pub id: i64,
    pub handle: String,
    pub follower_count: i64,
    pub following_count: i64,
    /// Present only when the request carries an identity.
    pub is_following: Option<bool>,
}
