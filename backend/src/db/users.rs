use std::collections::HashMap;

use async_trait::async_trait;

use super::connection::PgStore;
use super::repository::{StoreResult, UserDirectory};
use crate::models::{UserId, UserProfile};

#[async_trait]
impl UserDirectory for PgStore {
    async fn profiles(&self, user_ids: &[UserId]) -> StoreResult<HashMap<UserId, UserProfile>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let users = sqlx::query_as::<_, UserProfile>(
            "SELECT id, name, avatar_url FROM users WHERE id = ANY($1)",
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(users.into_iter().map(|user| (user.id, user)).collect())
    }

    async fn user_exists(&self, user_id: UserId) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }
}
