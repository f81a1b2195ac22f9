use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::{
    error::{AppError, Result},
    models::{Follow, FollowStats},
};

pub async fn follow(
    db: &SqlitePool,
    follower_id: i64,
    followed_id: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    if follower_id == followed_id {
        return Err(AppError::Validation("Cannot follow yourself".to_string()));
    }

    let mut tx = db.begin().await?;

    let target: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?1")
        .bind(followed_id)
        .fetch_optional(&mut *tx)
        .await?;
    if target.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let existing = sqlx::query_as::<_, Follow>(
        "SELECT * FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
    )
    .bind(follower_id)
    .bind(followed_id)
    .fetch_optional(&mut *tx)
    .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(
            "Already following this user".to_string(),
        ));
    }

    sqlx::query("INSERT INTO follows (follower_id, followed_id, created_at) VALUES (?1, ?2, ?3)")
        .bind(follower_id)
        .bind(followed_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, "Already following this user"))?;

    tx.commit().await?;
    Ok(())
}

pub async fn unfollow(db: &SqlitePool, follower_id: i64, followed_id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM follows WHERE follower_id = ?1 AND followed_id = ?2")
        .bind(follower_id)
        .bind(followed_id)
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::Conflict("Not following this user".to_string()));
    }

    Ok(())
}

pub async fn is_following(db: &SqlitePool, follower_id: i64, followed_id: i64) -> Result<bool> {
    let following: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND followed_id = ?2)",
    )
    .bind(follower_id)
    .bind(followed_id)
    .fetch_one(db)
    .await?;

    Ok(following)
}

pub async fn get_follow_stats(db: &SqlitePool, user_id: i64) -> Result<FollowStats> {
    let stats = sqlx::query_as::<_, FollowStats>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM follows WHERE followed_id = ?1) AS follower_count,
            (SELECT COUNT(*) FROM follows WHERE follower_id = ?1) AS following_count
        "#,
    )
    .bind(user_id)
    .fetch_one(db)
    .await?;

    Ok(stats)
}
