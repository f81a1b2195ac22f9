use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::{
    error::{AppError, Result},
    models::{PollOption, Vote},
};

/// Records a vote. The option-belongs-to-poll check, the one-vote-per-poll
/// check, and the insert run in one transaction; the (poll_id, user_id)
/// unique index catches any write that loses the race anyway.
pub async fn cast_vote(
    db: &SqlitePool,
    poll_id: i64,
    option_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut tx = db.begin().await?;

    let poll: Option<i64> = sqlx::query_scalar("SELECT id FROM polls WHERE id = ?1")
        .bind(poll_id)
        .fetch_optional(&mut *tx)
        .await?;
    if poll.is_none() {
        return Err(AppError::NotFound("Poll not found".to_string()));
    }

    let option =
        sqlx::query_as::<_, PollOption>("SELECT * FROM poll_options WHERE id = ?1 AND poll_id = ?2")
            .bind(option_id)
            .bind(poll_id)
            .fetch_optional(&mut *tx)
            .await?;
    if option.is_none() {
        return Err(AppError::NotFound(
            "Option not found in this poll".to_string(),
        ));
    }

    let existing =
        sqlx::query_as::<_, Vote>("SELECT * FROM votes WHERE poll_id = ?1 AND user_id = ?2")
            .bind(poll_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(
            "Already voted in this poll".to_string(),
        ));
    }

    sqlx::query(
        "INSERT INTO votes (poll_id, option_id, user_id, created_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(poll_id)
    .bind(option_id)
    .bind(user_id)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|e| AppError::conflict_on_unique(e, "Already voted in this poll"))?;

    tx.commit().await?;
    tracing::debug!(poll_id, option_id, user_id, "vote recorded");
    Ok(())
}

pub async fn has_voted(db: &SqlitePool, poll_id: i64, user_id: i64) -> Result<bool> {
    let voted: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM votes WHERE poll_id = ?1 AND user_id = ?2)",
    )
    .bind(poll_id)
    .bind(user_id)
    .fetch_one(db)
    .await?;

    Ok(voted)
}
