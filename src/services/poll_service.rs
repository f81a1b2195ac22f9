use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use crate::{
    error::{AppError, Result},
    models::{Comment, CommentTarget, Poll, PollFilter, PollOptionView, PollSort, PollView},
    services::{comment_service, user_service},
};

/// Polls with at least this many votes can no longer be deleted.
const VOTE_DELETE_GUARD: i64 = 10;

pub async fn create_poll(
    db: &SqlitePool,
    creator_id: i64,
    question: &str,
    options: &[String],
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<i64> {
    if question.is_empty() {
        return Err(AppError::Validation(
            "question must not be empty".to_string(),
        ));
    }
    if options.len() < 2 {
        return Err(AppError::Validation(
            "at least two options are required".to_string(),
        ));
    }

    // Poll and options land together or not at all.
    let mut tx = db.begin().await?;

    let creator: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?1")
        .bind(creator_id)
        .fetch_optional(&mut *tx)
        .await?;
    if creator.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let result = sqlx::query(
        "INSERT INTO polls (question, creator_id, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(question)
    .bind(creator_id)
    .bind(expires_at)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    let poll_id = result.last_insert_rowid();

    for text in options {
        sqlx::query("INSERT INTO poll_options (poll_id, option_text) VALUES (?1, ?2)")
            .bind(poll_id)
            .bind(text)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    tracing::debug!(poll_id, creator_id, "poll created");
    Ok(poll_id)
}

pub async fn get_poll(db: &SqlitePool, poll_id: i64) -> Result<PollView> {
    let poll = sqlx::query_as::<_, Poll>("SELECT * FROM polls WHERE id = ?1")
        .bind(poll_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Poll not found".to_string()))?;

    let creator = user_service::get_user_by_id(db, poll.creator_id)
        .await?
        .ok_or_else(|| AppError::Internal("Poll creator missing".to_string()))?;

    let options = options_with_counts(db, poll_id).await?;

    Ok(PollView {
        id: poll.id,
        question: poll.question,
        creator_handle: creator.handle,
        expires_at: poll.expires_at,
        options,
    })
}

/// Deletes a poll and everything it owns: options, their votes, root
/// comments with their reply subtrees and likes. The vote-count guard is
/// checked inside the same transaction as the cascade, so no vote can land
/// between the check and the commit.
pub async fn delete_poll(db: &SqlitePool, poll_id: i64, requester_id: i64) -> Result<()> {
    let mut tx = db.begin().await?;

    let poll: Option<i64> = sqlx::query_scalar("SELECT id FROM polls WHERE id = ?1")
        .bind(poll_id)
        .fetch_optional(&mut *tx)
        .await?;
    if poll.is_none() {
        return Err(AppError::NotFound("Poll not found".to_string()));
    }

    let total_votes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE poll_id = ?1")
        .bind(poll_id)
        .fetch_one(&mut *tx)
        .await?;
    if total_votes >= VOTE_DELETE_GUARD {
        return Err(AppError::Conflict(format!(
            "Cannot delete a poll with {VOTE_DELETE_GUARD} or more votes"
        )));
    }

    let roots: Vec<i64> = sqlx::query_scalar("SELECT id FROM comments WHERE poll_id = ?1")
        .bind(poll_id)
        .fetch_all(&mut *tx)
        .await?;
    comment_service::delete_threads(&mut tx, roots).await?;

    sqlx::query("DELETE FROM votes WHERE poll_id = ?1")
        .bind(poll_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM poll_options WHERE poll_id = ?1")
        .bind(poll_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM polls WHERE id = ?1")
        .bind(poll_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    tracing::debug!(poll_id, requester_id, total_votes, "poll deleted");
    Ok(())
}

#[derive(FromRow)]
struct PollListRow {
    id: i64,
    question: String,
    creator_id: i64,
    creator_handle: String,
    expires_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct OptionCountRow {
    id: i64,
    poll_id: i64,
    text: String,
    vote_count: i64,
}

/// The poll feed: a read-time fold over the vote ledger and the comment
/// tree. Counts are never cached, so the view cannot drift from the rows.
pub async fn list_polls(
    db: &SqlitePool,
    requester_id: i64,
    filter: PollFilter,
    sort: PollSort,
) -> Result<Vec<PollView>> {
    let mut polls = sqlx::query_as::<_, PollListRow>(
        r#"
        SELECT p.id, p.question, p.creator_id, p.expires_at, u.handle AS creator_handle
        FROM polls p
        JOIN users u ON u.id = p.creator_id
        ORDER BY p.id
        "#,
    )
    .fetch_all(db)
    .await?;

    let option_rows = sqlx::query_as::<_, OptionCountRow>(
        r#"
        SELECT o.id, o.poll_id, o.option_text AS text, COUNT(v.id) AS vote_count
        FROM poll_options o
        LEFT JOIN votes v ON v.option_id = o.id
        GROUP BY o.id
        ORDER BY o.id
        "#,
    )
    .fetch_all(db)
    .await?;

    let mut options_by_poll: HashMap<i64, Vec<PollOptionView>> = HashMap::new();
    let mut engagement: HashMap<i64, i64> = HashMap::new();
    for row in option_rows {
        *engagement.entry(row.poll_id).or_default() += row.vote_count;
        options_by_poll
            .entry(row.poll_id)
            .or_default()
            .push(PollOptionView {
                id: row.id,
                text: row.text,
                vote_count: row.vote_count,
            });
    }

    let voted = voted_poll_ids(db, requester_id).await?;

    match filter {
        PollFilter::None => {}
        PollFilter::Unvoted => polls.retain(|p| !voted.contains(&p.id)),
        PollFilter::Mine => polls.retain(|p| p.creator_id == requester_id),
        PollFilter::Interacted => {
            let commented = commented_poll_ids(db, requester_id).await?;
            polls.retain(|p| voted.contains(&p.id) || commented.contains(&p.id));
        }
    }

    // All sorts are stable, so ties keep their creation order.
    match sort {
        PollSort::None => {}
        PollSort::VotesDesc => {
            polls.sort_by_key(|p| Reverse(engagement.get(&p.id).copied().unwrap_or(0)));
        }
        PollSort::VotesAsc => {
            polls.sort_by_key(|p| engagement.get(&p.id).copied().unwrap_or(0));
        }
        PollSort::CompletedFirst => polls.sort_by_key(|p| !voted.contains(&p.id)),
    }

    let views = polls
        .into_iter()
        .map(|p| PollView {
            id: p.id,
            question: p.question,
            creator_handle: p.creator_handle,
            expires_at: p.expires_at,
            options: options_by_poll.remove(&p.id).unwrap_or_default(),
        })
        .collect();

    Ok(views)
}

async fn options_with_counts(db: &SqlitePool, poll_id: i64) -> Result<Vec<PollOptionView>> {
    let options = sqlx::query_as::<_, PollOptionView>(
        r#"
        SELECT o.id, o.option_text AS text, COUNT(v.id) AS vote_count
        FROM poll_options o
        LEFT JOIN votes v ON v.option_id = o.id
        WHERE o.poll_id = ?1
        GROUP BY o.id
        ORDER BY o.id
        "#,
    )
    .bind(poll_id)
    .fetch_all(db)
    .await?;

    Ok(options)
}

async fn voted_poll_ids(db: &SqlitePool, user_id: i64) -> Result<HashSet<i64>> {
    let ids: Vec<i64> = sqlx::query_scalar("SELECT DISTINCT poll_id FROM votes WHERE user_id = ?1")
        .bind(user_id)
        .fetch_all(db)
        .await?;

    Ok(ids.into_iter().collect())
}

/// Polls the user commented on. A reply carries no poll id, so each of the
/// user's comments is resolved to its root poll by walking the parent chain
/// in memory.
async fn commented_poll_ids(db: &SqlitePool, user_id: i64) -> Result<HashSet<i64>> {
    let comments = sqlx::query_as::<_, Comment>("SELECT * FROM comments")
        .fetch_all(db)
        .await?;
    let by_id: HashMap<i64, &Comment> = comments.iter().map(|c| (c.id, c)).collect();

    let mut poll_ids = HashSet::new();
    for comment in comments.iter().filter(|c| c.author_id == user_id) {
        if let Some(poll_id) = root_poll_of(&by_id, comment) {
            poll_ids.insert(poll_id);
        }
    }

    Ok(poll_ids)
}

fn root_poll_of(by_id: &HashMap<i64, &Comment>, comment: &Comment) -> Option<i64> {
    let mut current = comment;
    loop {
        match current.target()? {
            CommentTarget::Poll(poll_id) => return Some(poll_id),
            CommentTarget::Parent(parent_id) => current = by_id.get(&parent_id).copied()?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{fixed_now, memory_pool, seed_poll, seed_user};
    use crate::services::{comment_service, vote_service};
    use sqlx::SqlitePool;

    async fn option_ids(pool: &SqlitePool, poll_id: i64) -> Vec<i64> {
        sqlx::query_scalar("SELECT id FROM poll_options WHERE poll_id = ?1 ORDER BY id")
            .bind(poll_id)
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn creation_validates_question_options_and_creator() {
        let pool = memory_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let expires = fixed_now() + chrono::Duration::hours(12);

        let one_option = vec!["Tea".to_string()];
        let err = create_poll(&pool, alice, "Tea?", &one_option, expires, fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let two = vec!["Tea".to_string(), "Coffee".to_string()];
        let err = create_poll(&pool, alice, "", &two, expires, fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = create_poll(&pool, 9999, "Tea or coffee?", &two, expires, fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        // nothing half-written by the failed attempts
        let polls: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM polls")
            .fetch_one(&pool)
            .await
            .unwrap();
        let options: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM poll_options")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(polls, 0);
        assert_eq!(options, 0);
    }

    #[tokio::test]
    async fn option_counts_sum_to_the_vote_rows() {
        let pool = memory_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;
        let carol = seed_user(&pool, "carol").await;
        let poll = seed_poll(&pool, alice, "Tea or coffee?", &["Tea", "Coffee"]).await;
        let options = option_ids(&pool, poll).await;

        vote_service::cast_vote(&pool, poll, options[0], alice, fixed_now())
            .await
            .unwrap();
        vote_service::cast_vote(&pool, poll, options[0], bob, fixed_now())
            .await
            .unwrap();
        vote_service::cast_vote(&pool, poll, options[1], carol, fixed_now())
            .await
            .unwrap();

        let view = get_poll(&pool, poll).await.unwrap();
        let summed: i64 = view.options.iter().map(|o| o.vote_count).sum();
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE poll_id = ?1")
            .bind(poll)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(summed, rows);
        assert_eq!(view.options[0].vote_count, 2);
        assert_eq!(view.options[1].vote_count, 1);
        // creation order is display order
        assert_eq!(view.options[0].text, "Tea");
        assert_eq!(view.options[1].text, "Coffee");
    }

    #[tokio::test]
    async fn get_poll_is_idempotent_and_missing_is_not_found() {
        let pool = memory_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let poll = seed_poll(&pool, alice, "Tea or coffee?", &["Tea", "Coffee"]).await;

        let first = get_poll(&pool, poll).await.unwrap();
        let second = get_poll(&pool, poll).await.unwrap();
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );

        let err = get_poll(&pool, 9999).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_is_blocked_at_ten_votes() {
        let pool = memory_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let poll = seed_poll(&pool, alice, "Tea or coffee?", &["Tea", "Coffee"]).await;
        let options = option_ids(&pool, poll).await;

        for i in 0..10 {
            let voter = seed_user(&pool, &format!("voter{i}")).await;
            vote_service::cast_vote(&pool, poll, options[0], voter, fixed_now())
                .await
                .unwrap();
        }

        let err = delete_poll(&pool, poll, alice).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(get_poll(&pool, poll).await.is_ok());
    }

    #[tokio::test]
    async fn delete_at_nine_votes_cascades_to_everything_the_poll_owns() {
        let pool = memory_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;
        let poll = seed_poll(&pool, alice, "Tea or coffee?", &["Tea", "Coffee"]).await;
        let other = seed_poll(&pool, alice, "Cats or dogs?", &["Cats", "Dogs"]).await;
        let options = option_ids(&pool, poll).await;

        for i in 0..9 {
            let voter = seed_user(&pool, &format!("voter{i}")).await;
            vote_service::cast_vote(&pool, poll, options[0], voter, fixed_now())
                .await
                .unwrap();
        }

        let root = comment_service::post_root_comment(&pool, poll, bob, "first", fixed_now())
            .await
            .unwrap();
        let reply = comment_service::post_reply(&pool, root, alice, "reply", fixed_now())
            .await
            .unwrap();
        let nested = comment_service::post_reply(&pool, reply, bob, "deeper", fixed_now())
            .await
            .unwrap();
        comment_service::like_comment(&pool, nested, alice, fixed_now())
            .await
            .unwrap();
        comment_service::post_root_comment(&pool, other, bob, "elsewhere", fixed_now())
            .await
            .unwrap();

        delete_poll(&pool, poll, alice).await.unwrap();

        let err = get_poll(&pool, poll).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        for table in ["poll_options", "votes", "comments"] {
            let left: i64 =
                sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE poll_id = ?1"))
                    .bind(poll)
                    .fetch_one(&pool)
                    .await
                    .unwrap();
            assert_eq!(left, 0, "{table} rows should be gone");
        }
        let likes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comment_likes")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(likes, 0);
        // the reply subtree went with its root
        let comments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(comments, 1);
        assert!(get_poll(&pool, other).await.is_ok());
    }

    #[tokio::test]
    async fn unvoted_filter_excludes_only_the_voter() {
        let pool = memory_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;
        let poll = seed_poll(&pool, alice, "Tea or coffee?", &["Tea", "Coffee"]).await;
        let options = option_ids(&pool, poll).await;

        vote_service::cast_vote(&pool, poll, options[0], alice, fixed_now())
            .await
            .unwrap();

        let for_alice = list_polls(&pool, alice, PollFilter::Unvoted, PollSort::None)
            .await
            .unwrap();
        assert!(for_alice.iter().all(|p| p.id != poll));

        let for_bob = list_polls(&pool, bob, PollFilter::Unvoted, PollSort::None)
            .await
            .unwrap();
        let view = for_bob.iter().find(|p| p.id == poll).unwrap();
        assert_eq!(view.options[0].text, "Tea");
        assert_eq!(view.options[0].vote_count, 1);
        assert_eq!(view.options[1].text, "Coffee");
        assert_eq!(view.options[1].vote_count, 0);
        assert_eq!(view.creator_handle, "alice");
    }

    #[tokio::test]
    async fn mine_filter_returns_only_the_requesters_polls() {
        let pool = memory_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;
        seed_poll(&pool, alice, "Tea or coffee?", &["Tea", "Coffee"]).await;
        let bobs = seed_poll(&pool, bob, "Cats or dogs?", &["Cats", "Dogs"]).await;

        let mine = list_polls(&pool, bob, PollFilter::Mine, PollSort::None)
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, bobs);
    }

    #[tokio::test]
    async fn interacted_union_covers_votes_root_comments_and_replies() {
        let pool = memory_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;
        let carol = seed_user(&pool, "carol").await;
        let dave = seed_user(&pool, "dave").await;
        let poll = seed_poll(&pool, alice, "Tea or coffee?", &["Tea", "Coffee"]).await;
        let options = option_ids(&pool, poll).await;

        vote_service::cast_vote(&pool, poll, options[0], bob, fixed_now())
            .await
            .unwrap();
        let root = comment_service::post_root_comment(&pool, poll, alice, "first", fixed_now())
            .await
            .unwrap();
        // carol only replies; the reply still attributes her to the poll
        comment_service::post_reply(&pool, root, carol, "agreed", fixed_now())
            .await
            .unwrap();

        for user in [bob, alice, carol] {
            let polls = list_polls(&pool, user, PollFilter::Interacted, PollSort::None)
                .await
                .unwrap();
            assert!(polls.iter().any(|p| p.id == poll), "user {user} interacted");
        }
        let none = list_polls(&pool, dave, PollFilter::Interacted, PollSort::None)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn vote_sorts_order_by_engagement_and_keep_ties_stable() {
        let pool = memory_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let first = seed_poll(&pool, alice, "First?", &["a", "b"]).await;
        let second = seed_poll(&pool, alice, "Second?", &["a", "b"]).await;
        let third = seed_poll(&pool, alice, "Third?", &["a", "b"]).await;

        // second gets two votes, first and third one each (a tie)
        for (poll, voters) in [(first, 1), (second, 2), (third, 1)] {
            let options = option_ids(&pool, poll).await;
            for i in 0..voters {
                let voter = seed_user(&pool, &format!("voter{poll}_{i}")).await;
                vote_service::cast_vote(&pool, poll, options[0], voter, fixed_now())
                    .await
                    .unwrap();
            }
        }

        let desc = list_polls(&pool, alice, PollFilter::None, PollSort::VotesDesc)
            .await
            .unwrap();
        let ids: Vec<i64> = desc.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![second, first, third]);

        let asc = list_polls(&pool, alice, PollFilter::None, PollSort::VotesAsc)
            .await
            .unwrap();
        let ids: Vec<i64> = asc.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![first, third, second]);
    }

    #[tokio::test]
    async fn completed_first_puts_voted_polls_ahead() {
        let pool = memory_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;
        let first = seed_poll(&pool, alice, "First?", &["a", "b"]).await;
        let second = seed_poll(&pool, alice, "Second?", &["a", "b"]).await;
        let third = seed_poll(&pool, alice, "Third?", &["a", "b"]).await;

        let options = option_ids(&pool, third).await;
        vote_service::cast_vote(&pool, third, options[0], bob, fixed_now())
            .await
            .unwrap();

        let ordered = list_polls(&pool, bob, PollFilter::None, PollSort::CompletedFirst)
            .await
            .unwrap();
        let ids: Vec<i64> = ordered.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![third, first, second]);
    }
}
