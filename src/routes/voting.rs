//! Voting round route handlers

use crate::auth::{Actor, Claims};
use crate::constants::{VoteDecision, VoteState};
use crate::error::ApiResult;
use crate::models::{SuccessResponse, Vote, VotingRound, VotingRoundDetail};
use crate::state::SharedState;
use crate::store::ResolvedRound;
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CastVoteRequest {
    pub decision: VoteDecision,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRoundRequest {
    pub state: VoteState,
}

/// GET /api/voting-rounds/{id}
pub async fn get_round(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<VotingRoundDetail>>> {
    let detail = state.voting.detail(id).await?;
    Ok(Json(SuccessResponse::with_data(
        format!("Voting round with {} votes.", detail.summary.total()),
        detail,
    )))
}

/// POST /api/voting-rounds/{id}/votes
pub async fn cast_vote(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CastVoteRequest>,
) -> ApiResult<Json<SuccessResponse<Vote>>> {
    let vote = state
        .voting
        .cast(&Actor::from(&claims), id, payload.decision)
        .await?;
    Ok(Json(SuccessResponse::with_data("Vote recorded.", vote)))
}

/// POST /api/voting-rounds/{id}/resolve
pub async fn resolve_round(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResolveRoundRequest>,
) -> ApiResult<Json<SuccessResponse<ResolvedRound>>> {
    let resolved = state
        .voting
        .resolve(&Actor::from(&claims), id, payload.state)
        .await?;
    Ok(Json(SuccessResponse::with_data("Voting round resolved.", resolved)))
}

/// POST /api/sources/{id}/voting-rounds
pub async fn reopen_round(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(source_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<VotingRound>>)> {
    let round = state
        .voting
        .reopen(&Actor::from(&claims), source_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Voting round opened.", round)),
    ))
}
