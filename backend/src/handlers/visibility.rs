use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};

use super::{CurrentUser, MessageResponse, UserSummary};
use crate::error::LocatorResult;
use crate::models::{AccuracyTier, UserId, VisibilityMode};
use crate::router::AppState;

#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    pub visibility_mode: String,
    pub accuracy_level: String,
    #[serde(default)]
    pub allowed_user_ids: Vec<UserId>,
}

#[derive(Debug, Serialize)]
pub struct VisibilitySettingsResponse {
    pub visibility_mode: VisibilityMode,
    pub accuracy_level: AccuracyTier,
    pub allowed_users: Vec<UserSummary>,
}

pub async fn update_visibility(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(req): Json<VisibilityRequest>,
) -> LocatorResult<Json<MessageResponse>> {
    state
        .locator
        .policy()
        .update_settings(user_id, &req.visibility_mode, &req.accuracy_level, &req.allowed_user_ids)
        .await?;
    Ok(Json(MessageResponse::new("Visibility settings updated")))
}

pub async fn visibility_settings(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> LocatorResult<Json<VisibilitySettingsResponse>> {
    let settings = state.locator.policy().settings_for(user_id).await?;

    let mut allowed: Vec<UserId> = settings
        .audience
        .allow_list()
        .map(|list| list.iter().copied().collect())
        .unwrap_or_default();
    allowed.sort();
    let profiles = state.locator.profiles(&allowed).await?;

    Ok(Json(VisibilitySettingsResponse {
        visibility_mode: settings.audience.mode(),
        accuracy_level: settings.accuracy,
        allowed_users: allowed
            .into_iter()
            .map(|id| UserSummary::from_directory(id, &profiles))
            .collect(),
    }))
}
