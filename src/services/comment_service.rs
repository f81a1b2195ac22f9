use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    error::{AppError, Result},
    models::{Comment, CommentLike, CommentTarget, CommentView},
};

pub async fn post_root_comment(
    db: &SqlitePool,
    poll_id: i64,
    author_id: i64,
    text: &str,
    now: DateTime<Utc>,
) -> Result<i64> {
    insert_comment(db, author_id, text, CommentTarget::Poll(poll_id), now).await
}

pub async fn post_reply(
    db: &SqlitePool,
    parent_comment_id: i64,
    author_id: i64,
    text: &str,
    now: DateTime<Utc>,
) -> Result<i64> {
    insert_comment(db, author_id, text, CommentTarget::Parent(parent_comment_id), now).await
}

/// Shared write path. The target type makes "both set"/"neither set"
/// unrepresentable; the parent-must-pre-exist check inside the transaction is
/// what keeps the reply graph a tree.
async fn insert_comment(
    db: &SqlitePool,
    author_id: i64,
    text: &str,
    target: CommentTarget,
    now: DateTime<Utc>,
) -> Result<i64> {
    if text.is_empty() {
        return Err(AppError::Validation(
            "comment_text must not be empty".to_string(),
        ));
    }

    let mut tx = db.begin().await?;

    let (poll_id, parent_comment_id) = match target {
        CommentTarget::Poll(poll_id) => {
            let poll: Option<i64> = sqlx::query_scalar("SELECT id FROM polls WHERE id = ?1")
                .bind(poll_id)
                .fetch_optional(&mut *tx)
                .await?;
            if poll.is_none() {
                return Err(AppError::NotFound("Poll not found".to_string()));
            }
            (Some(poll_id), None)
        }
        CommentTarget::Parent(parent_id) => {
            let parent = get_comment(&mut tx, parent_id).await?;
            if parent.is_none() {
                return Err(AppError::NotFound("Comment not found".to_string()));
            }
            (None, Some(parent_id))
        }
    };

    let result = sqlx::query(
        r#"
        INSERT INTO comments (comment_text, author_id, poll_id, parent_comment_id, posted_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(text)
    .bind(author_id)
    .bind(poll_id)
    .bind(parent_comment_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(result.last_insert_rowid())
}

/// Root comments of a poll in creation order, with the like count derived
/// from the like set on every read.
pub async fn list_comments(
    db: &SqlitePool,
    poll_id: i64,
    requester_id: Option<i64>,
) -> Result<Vec<CommentView>> {
    let poll: Option<i64> = sqlx::query_scalar("SELECT id FROM polls WHERE id = ?1")
        .bind(poll_id)
        .fetch_optional(db)
        .await?;
    if poll.is_none() {
        return Err(AppError::NotFound("Poll not found".to_string()));
    }

    let comments = sqlx::query_as::<_, CommentView>(
        r#"
        SELECT
            c.id,
            c.comment_text AS text,
            u.handle AS author_handle,
            c.posted_at,
            (SELECT COUNT(*) FROM comment_likes l WHERE l.comment_id = c.id) AS like_count,
            EXISTS(
                SELECT 1 FROM comment_likes l
                WHERE l.comment_id = c.id AND l.user_id = ?1
            ) AS liked_by_requester
        FROM comments c
        JOIN users u ON u.id = c.author_id
        WHERE c.poll_id = ?2
        ORDER BY c.id
        "#,
    )
    .bind(requester_id)
    .bind(poll_id)
    .fetch_all(db)
    .await?;

    Ok(comments)
}

pub async fn like_comment(db: &SqlitePool, comment_id: i64, user_id: i64, now: DateTime<Utc>) -> Result<i64> {
    let mut tx = db.begin().await?;

    if get_comment(&mut tx, comment_id).await?.is_none() {
        return Err(AppError::NotFound("Comment not found".to_string()));
    }

    let existing = sqlx::query_as::<_, CommentLike>(
        "SELECT * FROM comment_likes WHERE user_id = ?1 AND comment_id = ?2",
    )
    .bind(user_id)
    .bind(comment_id)
    .fetch_optional(&mut *tx)
    .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("Already liked".to_string()));
    }

    sqlx::query("INSERT INTO comment_likes (user_id, comment_id, created_at) VALUES (?1, ?2, ?3)")
        .bind(user_id)
        .bind(comment_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, "Already liked"))?;

    let like_count = count_likes(&mut tx, comment_id).await?;
    tx.commit().await?;
    Ok(like_count)
}

pub async fn unlike_comment(db: &SqlitePool, comment_id: i64, user_id: i64) -> Result<i64> {
    let mut tx = db.begin().await?;

    if get_comment(&mut tx, comment_id).await?.is_none() {
        return Err(AppError::NotFound("Comment not found".to_string()));
    }

    let result = sqlx::query("DELETE FROM comment_likes WHERE user_id = ?1 AND comment_id = ?2")
        .bind(user_id)
        .bind(comment_id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::Conflict("Not liked".to_string()));
    }

    let like_count = count_likes(&mut tx, comment_id).await?;
    tx.commit().await?;
    Ok(like_count)
}

async fn get_comment(conn: &mut SqliteConnection, comment_id: i64) -> Result<Option<Comment>> {
    let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = ?1")
        .bind(comment_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(comment)
}

async fn count_likes(conn: &mut SqliteConnection, comment_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comment_likes WHERE comment_id = ?1")
        .bind(comment_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(count)
}

/// Removes whole comment threads: the given roots, every transitive reply,
/// and all their likes. Worklist expansion discovers parents before children,
/// so deleting in reverse order never orphans a reply mid-transaction.
pub(crate) async fn delete_threads(conn: &mut SqliteConnection, roots: Vec<i64>) -> Result<()> {
    let mut ordered = roots;
    let mut index = 0;
    while index < ordered.len() {
        let parent = ordered[index];
        index += 1;
        let children: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM comments WHERE parent_comment_id = ?1 ORDER BY id")
                .bind(parent)
                .fetch_all(&mut *conn)
                .await?;
        ordered.extend(children);
    }

    for comment_id in ordered.iter().rev() {
        sqlx::query("DELETE FROM comment_likes WHERE comment_id = ?1")
            .bind(comment_id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM comments WHERE id = ?1")
            .bind(comment_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}
