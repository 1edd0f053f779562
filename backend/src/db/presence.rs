use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::connection::PgStore;
use super::repository::{PresenceRepository, StoreResult};
use crate::models::{Presence, PresenceUpdate, UserId};

#[async_trait]
impl PresenceRepository for PgStore {
    async fn upsert_presence(&self, update: &PresenceUpdate, now: DateTime<Utc>) -> StoreResult<Presence> {
        let presence = sqlx::query_as::<_, Presence>(
            r#"
            INSERT INTO user_presence (
                user_id, latitude, longitude, accuracy_meters,
                is_available, is_online, status, last_seen_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, TRUE, $6, $7, $7, $7)
            ON CONFLICT (user_id) DO UPDATE SET
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                accuracy_meters = EXCLUDED.accuracy_meters,
                is_available = EXCLUDED.is_available,
                is_online = TRUE,
                status = EXCLUDED.status,
                last_seen_at = EXCLUDED.last_seen_at,
                updated_at = EXCLUDED.updated_at
            RETURNING user_id, latitude, longitude, accuracy_meters,
                is_available, is_online, status, last_seen_at
            "#,
        )
        .bind(update.user_id)
        .bind(update.latitude)
        .bind(update.longitude)
        .bind(update.accuracy_meters)
        .bind(update.is_available)
        .bind(&update.status)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(presence)
    }

    async fn presence_of(&self, user_id: UserId) -> StoreResult<Option<Presence>> {
        let presence = sqlx::query_as::<_, Presence>(
            r#"
            SELECT user_id, latitude, longitude, accuracy_meters,
                is_available, is_online, status, last_seen_at
            FROM user_presence
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(presence)
    }

    async fn online_presences_except(&self, viewer_id: UserId) -> StoreResult<Vec<Presence>> {
        let presences = sqlx::query_as::<_, Presence>(
            r#"
            SELECT user_id, latitude, longitude, accuracy_meters,
                is_available, is_online, status, last_seen_at
            FROM user_presence
            WHERE is_online AND user_id <> $1
            "#,
        )
        .bind(viewer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(presences)
    }

    async fn stale_online_ids(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<UserId>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM user_presence WHERE is_online AND last_seen_at < $1",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn mark_offline(&self, user_ids: &[UserId]) -> StoreResult<u64> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE user_presence
            SET is_online = FALSE, is_available = FALSE, updated_at = NOW()
            WHERE user_id = ANY($1)
            "#,
        )
        .bind(user_ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
