//! QA check route handlers

use crate::auth::{Actor, Claims};
use crate::error::ApiResult;
use crate::models::{QaCheck, SuccessResponse};
use crate::services::qa::CloseQa;
use crate::state::SharedState;
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct OpenQaRequest {
    pub comment: Option<String>,
}

/// POST /api/sources/{id}/qa
pub async fn open_check(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(source_id): Path<Uuid>,
    Json(payload): Json<OpenQaRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<QaCheck>>)> {
    let check = state
        .qa
        .open(&Actor::from(&claims), source_id, payload.comment)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("QA check opened.", check)),
    ))
}

/// POST /api/qa/{id}/close
pub async fn close_check(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CloseQa>,
) -> ApiResult<Json<SuccessResponse<QaCheck>>> {
    let check = state.qa.close(&Actor::from(&claims), id, payload).await?;
    Ok(Json(SuccessResponse::with_data("QA check closed.", check)))
}
