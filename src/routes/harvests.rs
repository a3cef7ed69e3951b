//! Harvest route handlers

use crate::auth::{Actor, Claims};
use crate::error::ApiResult;
use crate::models::{Harvest, HarvestDetail, SuccessResponse};
use crate::services::harvests::NewHarvest;
use crate::state::SharedState;
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestList {
    pub harvests: Vec<Harvest>,
    pub count: usize,
}

/// POST /api/harvests
pub async fn create_harvest(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<NewHarvest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<Harvest>>)> {
    let harvest = state.harvests.create(&Actor::from(&claims), payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Harvest planned.", harvest)),
    ))
}

/// GET /api/harvests
pub async fn list_harvests(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<HarvestList>>> {
    let harvests = state.harvests.list().await?;
    let count = harvests.len();
    Ok(Json(SuccessResponse::with_data(
        format!("{} harvests.", count),
        HarvestList { harvests, count },
    )))
}

/// GET /api/harvests/{id}
pub async fn get_harvest(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<HarvestDetail>>> {
    let detail = state.harvests.detail(id).await?;
    Ok(Json(SuccessResponse::with_data(
        format!("Harvest crawling {} URLs.", detail.seeds.len()),
        detail,
    )))
}
