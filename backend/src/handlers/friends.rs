use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{CurrentUser, MessageResponse, UserSummary};
use crate::error::{LocatorError, LocatorResult};
use crate::models::{FriendRequest, FriendRequestStatus, FriendshipStatus, Page, PageQuery, UserId};
use crate::router::AppState;

#[derive(Debug, Serialize)]
pub struct FriendRequestResponse {
    pub message: String,
    pub request: FriendRequest,
}

#[derive(Debug, Serialize)]
pub struct FriendsResponse {
    pub count: usize,
    pub friends: Vec<UserSummary>,
}

/// A request as listed to one of its two parties; `user` is the other party.
#[derive(Debug, Serialize)]
pub struct FriendRequestEntry {
    pub id: Uuid,
    pub user: UserSummary,
    pub status: FriendRequestStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct FriendRequestsResponse {
    pub count: usize,
    pub requests: Vec<FriendRequestEntry>,
}

pub async fn send_friend_request(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(receiver_id): Path<UserId>,
) -> LocatorResult<(StatusCode, Json<FriendRequestResponse>)> {
    if receiver_id != user_id && !state.locator.user_exists(receiver_id).await? {
        return Err(LocatorError::NotFound("user"));
    }

    let request = state.locator.friends().send_request(user_id, receiver_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(FriendRequestResponse {
            message: "Friend request sent".to_string(),
            request,
        }),
    ))
}

pub async fn accept_friend_request(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(request_id): Path<Uuid>,
) -> LocatorResult<Json<FriendRequestResponse>> {
    let request = state.locator.friends().accept_request(request_id, user_id).await?;
    Ok(Json(FriendRequestResponse {
        message: "Friend request accepted".to_string(),
        request,
    }))
}

pub async fn reject_friend_request(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(request_id): Path<Uuid>,
) -> LocatorResult<Json<FriendRequestResponse>> {
    let request = state.locator.friends().reject_request(request_id, user_id).await?;
    Ok(Json(FriendRequestResponse {
        message: "Friend request rejected".to_string(),
        request,
    }))
}

pub async fn remove_friendship(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(friend_id): Path<UserId>,
) -> LocatorResult<Json<MessageResponse>> {
    state.locator.friends().remove_friendship(user_id, friend_id).await?;
    Ok(Json(MessageResponse::new("Friendship removed")))
}

pub async fn list_friends(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(page): Query<PageQuery>,
) -> LocatorResult<Json<FriendsResponse>> {
    let friend_ids = state.locator.friends().friends(user_id, Page::from(page)).await?;
    let profiles = state.locator.profiles(&friend_ids).await?;

    let friends: Vec<UserSummary> = friend_ids
        .into_iter()
        .map(|id| UserSummary::from_directory(id, &profiles))
        .collect();
    Ok(Json(FriendsResponse {
        count: friends.len(),
        friends,
    }))
}

pub async fn pending_requests(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(page): Query<PageQuery>,
) -> LocatorResult<Json<FriendRequestsResponse>> {
    let requests = state.locator.friends().pending_received(user_id, Page::from(page)).await?;
    request_listing(&state, requests, |r| r.sender_id).await
}

pub async fn sent_requests(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(page): Query<PageQuery>,
) -> LocatorResult<Json<FriendRequestsResponse>> {
    let requests = state.locator.friends().pending_sent(user_id, Page::from(page)).await?;
    request_listing(&state, requests, |r| r.receiver_id).await
}

async fn request_listing(
    state: &AppState,
    requests: Vec<FriendRequest>,
    counterpart: impl Fn(&FriendRequest) -> UserId,
) -> LocatorResult<Json<FriendRequestsResponse>> {
    let ids: Vec<UserId> = requests.iter().map(&counterpart).collect();
    let profiles = state.locator.profiles(&ids).await?;

    let requests: Vec<FriendRequestEntry> = requests
        .iter()
        .map(|r| FriendRequestEntry {
            id: r.id,
            user: UserSummary::from_directory(counterpart(r), &profiles),
            status: r.status,
            created_at: r.created_at,
        })
        .collect();
    Ok(Json(FriendRequestsResponse {
        count: requests.len(),
        requests,
    }))
}

pub async fn friendship_status(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(other_id): Path<UserId>,
) -> LocatorResult<Json<FriendshipStatus>> {
    let status = state.locator.friends().friendship_status(user_id, other_id).await?;
    Ok(Json(status))
}
