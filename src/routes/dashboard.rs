//! Dashboard route handlers

use crate::auth::Claims;
use crate::dashboard::{Card, CardKind};
use crate::error::{ApiResult, AppError};
use crate::models::SuccessResponse;
use crate::state::SharedState;
use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
}

#[derive(Serialize)]
pub struct CardList {
    pub cards: Vec<Card>,
}

#[derive(Serialize)]
pub struct SingleCard {
    pub card: Card,
}

/// GET /api/dashboard
pub async fn dashboard(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<SuccessResponse<CardList>>> {
    let cards = state.dashboard.cards(claims.sub).await?;
    Ok(Json(SuccessResponse::with_data("Dashboard.", CardList { cards })))
}

/// GET /api/dashboard/{card}?page=
pub async fn card(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<SuccessResponse<SingleCard>>> {
    let kind = CardKind::from_slug(&slug)
        .ok_or_else(|| AppError::NotFound(format!("No dashboard card '{}'", slug)))?;
    let card = state
        .dashboard
        .card(kind, claims.sub, query.page.unwrap_or(1))
        .await?;
    Ok(Json(SuccessResponse::with_data(kind.title(), SingleCard { card })))
}
