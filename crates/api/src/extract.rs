//! Request extractors that reject with the API's `{"error": ...}` body.

use axum::extract::{FromRequest, FromRequestParts, OptionalFromRequestParts, Request};
use axum::http::request::Parts;
use axum::Json;
use common::UserId;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Header carrying the caller's id, set by the identity gateway after it has
/// verified the bearer token.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The verified caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

fn parse_user(parts: &Parts) -> Result<Option<UserId>, ApiError> {
    let Some(value) = parts.headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<UserId>().ok())
        .map(Some)
        .ok_or_else(|| ApiError::Unauthorized("invalid X-User-Id header".to_string()))
}

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parse_user(parts)?
            .map(AuthenticatedUser)
            .ok_or_else(|| ApiError::Unauthorized("missing X-User-Id header".to_string()))
    }
}

/// A missing header is `None`; a malformed one is still rejected.
impl<S: Send + Sync> OptionalFromRequestParts<S> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parse_user(parts)?.map(AuthenticatedUser))
    }
}

/// `Json` whose rejection is a 400 with an `{"error": ...}` body.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(JsonBody(value))
    }
}

/// Parses an optional JSON body. An empty body yields `T::default()`.
pub fn optional_body<T: DeserializeOwned + Default>(bytes: &[u8]) -> Result<T, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes).map_err(|e| ApiError::BadRequest(e.to_string()))
}
