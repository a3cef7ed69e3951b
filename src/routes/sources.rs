//! Source and seed route handlers

use crate::auth::{Actor, Claims};
use crate::error::ApiResult;
use crate::models::{QaCheck, Seed, Source, SourceDetail, SourceFilter, SuccessResponse};
use crate::services::sources::{NewSeed, NewSource, SeedUpdate, SourceUpdate};
use crate::state::SharedState;
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceList {
    pub sources: Vec<Source>,
    pub count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QaList {
    pub qa_checks: Vec<QaCheck>,
}

/// POST /api/sources
pub async fn propose_source(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<NewSource>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<SourceDetail>>)> {
    let detail = state.sources.propose(&Actor::from(&claims), payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Source proposed.", detail)),
    ))
}

/// GET /api/sources?state=&owner=
pub async fn list_sources(
    State(state): State<SharedState>,
    Query(filter): Query<SourceFilter>,
) -> ApiResult<Json<SuccessResponse<SourceList>>> {
    debug!("Listing sources with {:?}", filter);
    let sources = state.sources.list(&filter).await?;
    let count = sources.len();
    Ok(Json(SuccessResponse::with_data(
        format!("{} sources.", count),
        SourceList { sources, count },
    )))
}

/// GET /api/sources/{id}
pub async fn get_source(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<SourceDetail>>> {
    let detail = state.sources.detail(id).await?;
    Ok(Json(SuccessResponse::with_data("Source found.", detail)))
}

/// PUT /api/sources/{id}
pub async fn update_source(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SourceUpdate>,
) -> ApiResult<Json<SuccessResponse<Source>>> {
    let source = state
        .sources
        .update(&Actor::from(&claims), id, payload)
        .await?;
    Ok(Json(SuccessResponse::with_data("Source updated.", source)))
}

/// POST /api/sources/{id}/seeds
pub async fn add_seed(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewSeed>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<Seed>>)> {
    let seed = state
        .sources
        .add_seed(&Actor::from(&claims), id, payload)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Seed added.", seed)),
    ))
}

/// PUT /api/seeds/{id}
pub async fn update_seed(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SeedUpdate>,
) -> ApiResult<Json<SuccessResponse<Seed>>> {
    let seed = state
        .sources
        .update_seed(&Actor::from(&claims), id, payload)
        .await?;
    Ok(Json(SuccessResponse::with_data("Seed updated.", seed)))
}

/// GET /api/sources/{id}/qa
pub async fn list_qa(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<QaList>>> {
    let qa_checks = state.qa.list(id).await?;
    Ok(Json(SuccessResponse::with_data(
        "QA checks of the source.",
        QaList { qa_checks },
    )))
}
