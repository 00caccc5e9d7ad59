use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::handlers::error::ApiError;

/// JSON body that is deserialized and then checked with `validator`. Both
/// failures come back as a JSON 400.
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            let message = format!("Failed to parse JSON request body: {}", rejection);
            tracing::warn!("{}", message);
            ApiError::bad_request(message)
        })?;

        value.validate().map_err(|errors| {
            tracing::warn!(%errors, "Request validation failed");
            ApiError::bad_request(format!("Validation failed: {}", errors))
        })?;

        Ok(ValidatedJson(value))
    }
}
