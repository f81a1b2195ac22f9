use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::{
    error::{AppError, Result},
    models::User,
};

pub async fn create_user(db: &SqlitePool, handle: &str, now: DateTime<Utc>) -> Result<User> {
    if handle.is_empty() {
        return Err(AppError::Validation("handle must not be empty".to_string()));
    }

    let result = sqlx::query("INSERT INTO users (handle, created_at) VALUES (?1, ?2)")
        .bind(handle)
        .bind(now)
        .execute(db)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, "Handle is already taken"))?;

    Ok(User {
        id: result.last_insert_rowid(),
        handle: handle.to_string(),
        created_at: now,
    })
}

pub async fn get_user_by_id(db: &SqlitePool, user_id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?1")
        .bind(user_id)
        .fetch_optional(db)
        .await?;

    Ok(user)
}
