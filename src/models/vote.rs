use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vote {
    pub id: i64,
    pub poll_id: i64,
    pub option_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

// Vote request
#[derive(Debug, Deserialize)]
pub struct CastVoteRequest {
    pub option_id: i64,
}
