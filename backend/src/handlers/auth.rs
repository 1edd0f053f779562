use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::Json,
};
use uuid::Uuid;

use crate::constants::USER_ID_HEADER;
use crate::error::ErrorBody;
use crate::models::UserId;

/// Caller identity, as established by the auth layer in front of this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub UserId);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorBody>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| unauthorized("Missing user identity"))?;

        let user_id = Uuid::parse_str(raw.trim()).map_err(|_| unauthorized("Invalid user identity"))?;
        Ok(CurrentUser(user_id))
    }
}

fn unauthorized(message: &str) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorBody {
            error: message.to_string(),
            code: "unauthorized",
        }),
    )
}
