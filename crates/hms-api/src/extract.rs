//! Request body extraction with API-shaped rejections.

use axum::{
    async_trait,
    body::Bytes,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::{ApiError, ApiResult};

/// JSON body whose rejection is a 400 `ApiError` rather than axum's plain-text 422.
///
/// Handlers that check roles take `Result<ApiJson<T>, ApiError>` and unwrap it
/// after `AuthUser::require`, so a refused caller gets 403 whatever the body.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

impl<T: DeserializeOwned + Default> ApiJson<T> {
    /// Parse an optional body: empty means `T::default()`.
    pub fn or_default(bytes: &Bytes) -> ApiResult<T> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }
        let Json(value) = Json::<T>::from_bytes(bytes)?;
        Ok(value)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "request body rejected");
        ApiError::validation(rejection.body_text())
    }
}
