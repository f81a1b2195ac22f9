use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// What a comment is attached to: a poll (root comment) or another comment
/// (reply). Creation always goes through this type, so the illegal
/// "both set"/"neither set" states cannot be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentTarget {
    Poll(i64),
    Parent(i64),
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub comment_text: String,
    pub author_id: i64,
    pub poll_id: Option<i64>,
    pub parent_comment_id: Option<i64>,
    pub posted_at: DateTime<Utc>,
}

impl Comment {
    /// The stored row keeps two nullable columns under a CHECK constraint;
    /// this folds them back into the tagged form. `None` only if the storage
    /// invariant has been violated out-of-band.
    pub fn target(&self) -> Option<CommentTarget> {
        match (self.poll_id, self.parent_comment_id) {
            (Some(poll_id), None) => Some(CommentTarget::Poll(poll_id)),
            (None, Some(parent_id)) => Some(CommentTarget::Parent(parent_id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CommentLike {
    pub id: i64,
    pub user_id: i64,
    pub comment_id: i64,
    pub created_at: DateTime<Utc>,
}

// Create comment request (root comments and replies share the shape)
#[derive(Debug, Validate, Deserialize)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 10000))]
    pub comment_text: String,
}

// Root-comment listing entry
#[derive(Debug, Serialize, FromRow)]
pub struct CommentView {
    pub id: i64,
    pub text: String,
    pub author_handle: String,
    pub posted_at: DateTime<Utc>,
    pub like_count: i64,
    pub liked_by_requester: bool,
}
