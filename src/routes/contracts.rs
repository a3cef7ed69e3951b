//! Contract and negotiation route handlers

use crate::auth::{Actor, Claims};
use crate::error::ApiResult;
use crate::models::{Contract, ContractDetail, ContractFilter, EmailNegotiation, SuccessResponse};
use crate::negotiation::{EmailDraft, ScheduleSubmission};
use crate::services::contracts::NewContract;
use crate::state::SharedState;
use crate::store::EditedContract;
use crate::workflow::ContractEdit;
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractList {
    pub contracts: Vec<Contract>,
    pub count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftList {
    pub drafts: Vec<EmailDraft>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailList {
    pub emails: Vec<EmailNegotiation>,
}

/// POST /api/sources/{id}/contracts
pub async fn create_contract(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(source_id): Path<Uuid>,
    Json(payload): Json<NewContract>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<Contract>>)> {
    let contract = state
        .contracts
        .create(&Actor::from(&claims), source_id, payload)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Contract created.", contract)),
    ))
}

/// GET /api/contracts?state=&sourceId=&inCommunication=
pub async fn list_contracts(
    State(state): State<SharedState>,
    Query(filter): Query<ContractFilter>,
) -> ApiResult<Json<SuccessResponse<ContractList>>> {
    let contracts = state.contracts.list(&filter).await?;
    let count = contracts.len();
    Ok(Json(SuccessResponse::with_data(
        format!("{} contracts.", count),
        ContractList { contracts, count },
    )))
}

/// GET /api/contracts/{id}
pub async fn get_contract(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<ContractDetail>>> {
    let detail = state.contracts.detail(id).await?;
    Ok(Json(SuccessResponse::with_data("Contract found.", detail)))
}

/// PUT /api/contracts/{id}
///
/// Send `expectedState` to reject the edit when someone changed the state meanwhile.
pub async fn edit_contract(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ContractEdit>,
) -> ApiResult<Json<SuccessResponse<EditedContract>>> {
    let edited = state
        .contracts
        .edit(&Actor::from(&claims), id, payload)
        .await?;
    Ok(Json(SuccessResponse::with_data("Contract updated.", edited)))
}

/// GET /api/contracts/{id}/drafts
pub async fn email_drafts(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<DraftList>>> {
    let user = state.users.get(claims.sub).await?;
    let drafts = state.contracts.drafts(&user, id).await?;
    Ok(Json(SuccessResponse::with_data(
        "Proposed negotiation e-mails.",
        DraftList { drafts },
    )))
}

/// PUT /api/contracts/{id}/emails
pub async fn save_schedule(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ScheduleSubmission>,
) -> ApiResult<Json<SuccessResponse<EmailList>>> {
    let emails = state
        .contracts
        .save_schedule(&Actor::from(&claims), id, payload)
        .await?;
    Ok(Json(SuccessResponse::with_data(
        "Negotiation schedule saved.",
        EmailList { emails },
    )))
}
