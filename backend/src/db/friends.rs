use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::connection::PgStore;
use super::repository::{FriendRepository, StoreError, StoreResult};
use crate::models::{FriendPair, FriendRequest, Friendship, Page, UserId};

const REQUEST_COLUMNS: &str = "id, sender_id, receiver_id, status, created_at, updated_at";

#[derive(Debug, FromRow)]
struct FriendRequestRow {
    id: Uuid,
    sender_id: Uuid,
    receiver_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FriendRequestRow> for FriendRequest {
    type Error = StoreError;

    fn try_from(row: FriendRequestRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("friend request {}: {}", row.id, e)))?;
        Ok(FriendRequest {
            id: row.id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_requests(rows: Vec<FriendRequestRow>) -> StoreResult<Vec<FriendRequest>> {
    rows.into_iter().map(FriendRequest::try_from).collect()
}

fn map_unique_violation(e: sqlx::Error, what: &str) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::UniqueViolation(what.to_string())
        }
        _ => StoreError::Database(e),
    }
}

#[async_trait]
impl FriendRepository for PgStore {
    async fn friendship_exists(&self, pair: FriendPair) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM friendships WHERE user_a = $1 AND user_b = $2)",
        )
        .bind(pair.user_a())
        .bind(pair.user_b())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn delete_friendship(&self, pair: FriendPair) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM friendships WHERE user_a = $1 AND user_b = $2")
            .bind(pair.user_a())
            .bind(pair.user_b())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn friend_ids_of(&self, user_id: UserId) -> StoreResult<HashSet<UserId>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT user_b FROM friendships WHERE user_a = $1
            UNION
            SELECT user_a FROM friendships WHERE user_b = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().collect())
    }

    async fn list_friendships(&self, user_id: UserId, page: Page) -> StoreResult<Vec<Friendship>> {
        let friendships = sqlx::query_as::<_, Friendship>(
            r#"
            SELECT user_a, user_b, created_at
            FROM friendships
            WHERE user_a = $1 OR user_b = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await?;

        Ok(friendships)
    }

    async fn pending_request_between(
        &self,
        first: UserId,
        second: UserId,
    ) -> StoreResult<Option<FriendRequest>> {
        let row = sqlx::query_as::<_, FriendRequestRow>(&format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM friend_requests
            WHERE status = 'pending'
            AND ((sender_id = $1 AND receiver_id = $2) OR (sender_id = $2 AND receiver_id = $1))
            LIMIT 1
            "#
        ))
        .bind(first)
        .bind(second)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FriendRequest::try_from).transpose()
    }

    async fn insert_request(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        now: DateTime<Utc>,
    ) -> StoreResult<FriendRequest> {
        let row = sqlx::query_as::<_, FriendRequestRow>(&format!(
            r#"
            INSERT INTO friend_requests (id, sender_id, receiver_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, 'pending', $4, $4)
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(sender_id)
        .bind(receiver_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "pending friend request for this pair"))?;

        row.try_into()
    }

    async fn accept_request(
        &self,
        request_id: Uuid,
        receiver_id: UserId,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<FriendRequest>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, FriendRequestRow>(&format!(
            r#"
            UPDATE friend_requests
            SET status = 'accepted', updated_at = $3
            WHERE id = $1 AND receiver_id = $2 AND status = 'pending'
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(request_id)
        .bind(receiver_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        // Dropping the transaction rolls it back.
        let Some(row) = row else {
            return Ok(None);
        };
        let request = FriendRequest::try_from(row)?;
        let pair = FriendPair::new(request.sender_id, request.receiver_id).ok_or_else(|| {
            StoreError::Corrupt(format!("friend request {} addressed to its sender", request.id))
        })?;

        // A send that raced an earlier accept can leave a pending request
        // between existing friends; accepting it keeps the original friendship.
        let inserted = sqlx::query(
            r#"
            INSERT INTO friendships (user_a, user_b, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_a, user_b) DO NOTHING
            "#,
        )
        .bind(pair.user_a())
        .bind(pair.user_b())
        .bind(now)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            tx.rollback().await?;
            return Err(StoreError::Consistency(format!(
                "friendship insert for request {} failed: {}",
                request.id, e
            )));
        }

        tx.commit().await?;
        Ok(Some(request))
    }

    async fn reject_request(
        &self,
        request_id: Uuid,
        receiver_id: UserId,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<FriendRequest>> {
        let row = sqlx::query_as::<_, FriendRequestRow>(&format!(
            r#"
            UPDATE friend_requests
            SET status = 'rejected', updated_at = $3
            WHERE id = $1 AND receiver_id = $2 AND status = 'pending'
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(request_id)
        .bind(receiver_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FriendRequest::try_from).transpose()
    }

    async fn pending_received(&self, user_id: UserId, page: Page) -> StoreResult<Vec<FriendRequest>> {
        let rows = sqlx::query_as::<_, FriendRequestRow>(&format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM friend_requests
            WHERE receiver_id = $1 AND status = 'pending'
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await?;

        into_requests(rows)
    }

    async fn pending_sent(&self, user_id: UserId, page: Page) -> StoreResult<Vec<FriendRequest>> {
        let rows = sqlx::query_as::<_, FriendRequestRow>(&format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM friend_requests
            WHERE sender_id = $1 AND status = 'pending'
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await?;

        into_requests(rows)
    }
}
