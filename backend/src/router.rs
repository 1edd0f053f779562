use axum::{
    http::{HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::constants::API_BASE_PATH;
use crate::db::SharedStore;
use crate::handlers;
use crate::services::LocatorService;

#[derive(Clone)]
pub struct AppState {
    pub locator: LocatorService,
}

impl AppState {
    pub fn new(store: SharedStore) -> Self {
        Self {
            locator: LocatorService::new(store),
        }
    }
}

pub fn create_router(state: AppState, allowed_origins: Option<&str>) -> Router {
    let api = Router::new()
        // Location
        .route(
            "/locator/location",
            post(handlers::update_location).put(handlers::update_location),
        )
        .route("/locator", get(handlers::visible_users))
        .route("/locator/nearby", get(handlers::nearby_users))
        .route("/locator/friends", get(handlers::visible_friends))
        .route("/locator/visibility", post(handlers::update_visibility))
        .route("/locator/visibility/settings", get(handlers::visibility_settings))
        // Friends
        .route("/friend-request/{id}", post(handlers::send_friend_request))
        .route("/friend-request/{id}/accept", post(handlers::accept_friend_request))
        .route("/friend-request/{id}/reject", post(handlers::reject_friend_request))
        .route("/friendship/{id}", delete(handlers::remove_friendship))
        .route("/friends", get(handlers::list_friends))
        .route("/friend-requests/pending", get(handlers::pending_requests))
        .route("/friend-requests/sent", get(handlers::sent_requests))
        .route("/friendship-status/{id}", get(handlers::friendship_status));

    Router::new()
        .route("/health", get(health_check))
        .nest(API_BASE_PATH, api)
        .layer(create_cors_layer(allowed_origins))
        .with_state(state)
}

/// Comma-separated origins; unset or unparsable falls back to any origin.
pub fn create_cors_layer(allowed_origins: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(false);

    let origins: Vec<HeaderValue> = allowed_origins
        .unwrap_or_default()
        .split(',')
        .filter_map(|origin| {
            let trimmed = origin.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse().ok()
            }
        })
        .collect();

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origins)
    }
}

async fn health_check() -> &'static str {
    "OK"
}
