use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::connection::PgStore;
use super::repository::{StoreResult, VisibilityRepository};
use crate::models::{AccuracyTier, StoredSettings, UserId, VisibilityMode};

#[async_trait]
impl VisibilityRepository for PgStore {
    async fn settings_for(&self, user_id: UserId) -> StoreResult<Option<StoredSettings>> {
        let settings = sqlx::query_as::<_, StoredSettings>(
            r#"
            SELECT user_id, visibility_mode, accuracy_level, updated_at
            FROM location_visibility_settings
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(settings)
    }

    async fn settings_for_many(&self, user_ids: &[UserId]) -> StoreResult<Vec<StoredSettings>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let settings = sqlx::query_as::<_, StoredSettings>(
            r#"
            SELECT user_id, visibility_mode, accuracy_level, updated_at
            FROM location_visibility_settings
            WHERE user_id = ANY($1)
            "#,
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(settings)
    }

    async fn allow_list(&self, owner_id: UserId) -> StoreResult<HashSet<UserId>> {
        let allowed = sqlx::query_scalar::<_, Uuid>(
            "SELECT allowed_user_id FROM location_visibility_allowed WHERE owner_user_id = $1",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(allowed.into_iter().collect())
    }

    async fn allow_lists_for(
        &self,
        owner_ids: &[UserId],
    ) -> StoreResult<HashMap<UserId, HashSet<UserId>>> {
        if owner_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, (Uuid, Uuid)>(
            r#"
            SELECT owner_user_id, allowed_user_id
            FROM location_visibility_allowed
            WHERE owner_user_id = ANY($1)
            "#,
        )
        .bind(owner_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut lists: HashMap<UserId, HashSet<UserId>> = HashMap::new();
        for (owner, allowed) in rows {
            lists.entry(owner).or_default().insert(allowed);
        }
        Ok(lists)
    }

    async fn save_settings(
        &self,
        user_id: UserId,
        mode: VisibilityMode,
        accuracy: AccuracyTier,
        allow_list: Option<&HashSet<UserId>>,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO location_visibility_settings (user_id, visibility_mode, accuracy_level, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (user_id) DO UPDATE SET
                visibility_mode = EXCLUDED.visibility_mode,
                accuracy_level = EXCLUDED.accuracy_level,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(user_id)
        .bind(mode.as_str())
        .bind(accuracy.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if let Some(allowed) = allow_list {
            sqlx::query("DELETE FROM location_visibility_allowed WHERE owner_user_id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

            let allowed: Vec<Uuid> = allowed.iter().copied().collect();
            sqlx::query(
                r#"
                INSERT INTO location_visibility_allowed (owner_user_id, allowed_user_id, created_at)
                SELECT $1, allowed, $3 FROM UNNEST($2::uuid[]) AS allowed
                "#,
            )
            .bind(user_id)
            .bind(&allowed)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn save_accuracy(
        &self,
        user_id: UserId,
        accuracy: AccuracyTier,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO location_visibility_settings (user_id, visibility_mode, accuracy_level, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (user_id) DO UPDATE SET
                accuracy_level = EXCLUDED.accuracy_level,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(user_id)
        .bind(VisibilityMode::default().as_str())
        .bind(accuracy.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
