use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::extractors::ValidatedJson;
use crate::middlewares::auth::JwtClaims;
use crate::models::game::{
    StatusQuery, StatusResponse, SubmitAnswerRequest, SubmitAnswerResponse, TakeMoneyResponse,
};
use crate::models::lifeline::UseLifelineRequest;
use crate::models::question::AnswerKey;
use crate::services::game_engine::AnswerOutcome;
use crate::services::AppState;

use super::error::ApiError;

pub async fn create_game(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("Creating game for user_id={}", claims.sub);

    let game = state.games.create_session(&claims.sub).await?;
    Ok((StatusCode::CREATED, Json(state.games.view(&game))))
}

pub async fn get_game(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(game_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let game = state.games.game(&game_id, &claims.sub).await?;
    Ok(Json(state.games.view(&game)))
}

pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(game_id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state
        .games
        .status(&game_id, &claims.sub, query.finalize)
        .await?;

    Ok(Json(StatusResponse { game_id, status }))
}

pub async fn get_current_question(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(game_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let question = state.games.current_question(&game_id, &claims.sub).await?;
    Ok(Json(question))
}

pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(game_id): Path<String>,
    ValidatedJson(req): ValidatedJson<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let key = req
        .answer
        .parse::<AnswerKey>()
        .map_err(|err| ApiError::bad_request(err.to_string()))?;

    let result = state.games.submit_answer(&game_id, &claims.sub, key).await?;

    // The correct key is only revealed once a wrong answer ended the game.
    let correct_answer = match result.outcome {
        AnswerOutcome::Failed { .. } => result
            .game
            .current_game_question()
            .map(|question| question.correct_answer_key()),
        _ => None,
    };

    Ok(Json(SubmitAnswerResponse {
        status: result.status,
        correct: result.outcome.correct(),
        already_finished: matches!(result.outcome, AnswerOutcome::AlreadyFinished { .. }),
        current_level: result.game.current_level,
        prize: result.game.prize,
        correct_answer,
    }))
}

pub async fn take_money(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(game_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.games.cash_out(&game_id, &claims.sub).await?;

    Ok(Json(TakeMoneyResponse {
        status: result.settlement.status,
        prize: result.settlement.prize,
        balance: result.balance,
    }))
}

pub async fn use_help(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(game_id): Path<String>,
    ValidatedJson(req): ValidatedJson<UseLifelineRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = req
        .kind()
        .ok_or_else(|| ApiError::bad_request(format!("Unknown help type: {}", req.help_type)))?;

    let hint = state.games.use_lifeline(&game_id, &claims.sub, kind).await?;
    Ok(Json(hint))
}
