use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};

use super::{CurrentUser, MessageResponse};
use crate::constants::DEFAULT_NEARBY_RADIUS_KM;
use crate::error::LocatorResult;
use crate::models::{LocationReport, VisibleUser};
use crate::router::AppState;

#[derive(Debug, Serialize)]
pub struct VisibleUsersResponse {
    pub count: usize,
    pub users: Vec<VisibleUser>,
}

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub radius: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct NearbyResponse {
    pub count: usize,
    pub radius_km: f64,
    pub users: Vec<VisibleUser>,
}

pub async fn update_location(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(report): Json<LocationReport>,
) -> LocatorResult<Json<MessageResponse>> {
    state.locator.update_location(user_id, report).await?;
    Ok(Json(MessageResponse::new("Location updated")))
}

pub async fn visible_users(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> LocatorResult<Json<VisibleUsersResponse>> {
    let users = state.locator.get_visible_users(user_id, None).await?;
    Ok(Json(VisibleUsersResponse {
        count: users.len(),
        users,
    }))
}

pub async fn nearby_users(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<NearbyQuery>,
) -> LocatorResult<Json<NearbyResponse>> {
    let radius_km = query.radius.unwrap_or(DEFAULT_NEARBY_RADIUS_KM);
    let users = state.locator.get_visible_users(user_id, Some(radius_km)).await?;
    Ok(Json(NearbyResponse {
        count: users.len(),
        radius_km,
        users,
    }))
}

pub async fn visible_friends(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> LocatorResult<Json<VisibleUsersResponse>> {
    let users = state.locator.get_visible_friends(user_id).await?;
    Ok(Json(VisibleUsersResponse {
        count: users.len(),
        users,
    }))
}
