use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::services::game_engine::GameError;

/// JSON error returned by every API route: `{"error": code, "message": text}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn too_many_requests() -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "Too many requests",
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        let message = err.to_string();
        match err {
            GameError::InsufficientQuestions { .. } => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "insufficient_questions",
                message,
            ),
            GameError::SessionAlreadyFinished => {
                Self::new(StatusCode::CONFLICT, "session_already_finished", message)
            }
            GameError::CannotCashOutYet => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "cannot_cash_out_yet",
                message,
            ),
            GameError::LifelineAlreadyUsed(_) => {
                Self::new(StatusCode::CONFLICT, "lifeline_already_used", message)
            }
            GameError::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, "not_found", message),
            GameError::Storage(source) => {
                tracing::error!(error = ?source, "Storage failure");
                Self::internal("Internal storage error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.code,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::lifeline::LifelineKind;

    #[test]
    fn game_errors_map_to_status_codes() {
        let cases = [
            (
                GameError::InsufficientQuestions { level: 3 },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (GameError::SessionAlreadyFinished, StatusCode::CONFLICT),
            (GameError::CannotCashOutYet, StatusCode::UNPROCESSABLE_ENTITY),
            (
                GameError::LifelineAlreadyUsed(LifelineKind::FriendCall),
                StatusCode::CONFLICT,
            ),
            (GameError::game_not_found("g1"), StatusCode::NOT_FOUND),
            (
                GameError::Storage(anyhow::anyhow!("connection reset")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn storage_details_are_not_exposed() {
        let err = ApiError::from(GameError::Storage(anyhow::anyhow!("secret host 10.0.0.5")));
        assert_eq!(err.code(), "internal");
        assert!(!err.message.contains("10.0.0.5"));
    }
}
