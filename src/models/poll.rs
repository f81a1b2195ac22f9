use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Poll {
    pub id: i64,
    pub question: String,
    pub creator_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PollOption {
    pub id: i64,
    pub poll_id: i64,
    pub option_text: String,
}

// Create poll request
#[derive(Debug, Validate, Deserialize)]
pub struct CreatePollRequest {
    #[validate(length(min = 1, max = 500))]
    pub question: String,
    #[validate(length(min = 2, message = "at least two options are required"))]
    pub options: Vec<String>,
    /// Defaults to the configured poll TTL when absent.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

// Poll view with derived per-option counts
#[derive(Debug, Serialize)]
pub struct PollView {
    pub id: i64,
    pub question: String,
    pub creator_handle: String,
    pub expires_at: DateTime<Utc>,
    pub options: Vec<PollOptionView>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct PollOptionView {
    pub id: i64,
    pub text: String,
    pub vote_count: i64,
}

/// Poll listing filters. Unknown query values fall back to `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PollFilter {
    #[default]
    None,
    Unvoted,
    Mine,
    Interacted,
}

impl PollFilter {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("unvoted") => Self::Unvoted,
            Some("mine") => Self::Mine,
            Some("interacted") => Self::Interacted,
            _ => Self::None,
        }
    }
}

/// Poll listing sort keys. All sorts are stable; ties keep creation order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PollSort {
    #[default]
    None,
    VotesDesc,
    VotesAsc,
    CompletedFirst,
}

impl PollSort {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("votes") | Some("votes_desc") => Self::VotesDesc,
            Some("votes_asc") => Self::VotesAsc,
            Some("completed") | Some("completed_first") => Self::CompletedFirst,
            _ => Self::None,
        }
    }
}
