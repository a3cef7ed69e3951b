//! Authentication route handlers
//!
//! Provides login, register, refresh, and user management endpoints.

use crate::auth::{Claims, Role, TokenPair};
use crate::error::ApiResult;
use crate::models::{User, UserResponse};
use crate::services::users::{LoginRequest, RegisterRequest};
use crate::state::SharedState;
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub user: UserResponse,
    pub tokens: TokenPair,
}

impl AuthResponse {
    fn new((user, tokens): (User, TokenPair)) -> Self {
        Self {
            success: true,
            user: user.into(),
            tokens,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub success: bool,
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub success: bool,
    pub user: UserResponse,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let signed_in = state.users.login(req).await?;
    Ok(Json(AuthResponse::new(signed_in)))
}

/// POST /api/auth/register
///
/// New users are curators.
pub async fn register(
    State(state): State<SharedState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let registered = state.users.register(req).await?;
    Ok((StatusCode::CREATED, Json(AuthResponse::new(registered))))
}

/// POST /api/auth/refresh
pub async fn refresh(
    State(state): State<SharedState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let tokens = state.users.refresh(&req.refresh_token)?;
    Ok(Json(TokenResponse {
        success: true,
        tokens,
    }))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<MeResponse>> {
    let user = state.users.get(claims.sub).await?;
    Ok(Json(MeResponse {
        success: true,
        user: user.into(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

/// PUT /api/auth/role/{user_id}
///
/// Admin only.
pub async fn update_role(
    State(state): State<SharedState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> ApiResult<Json<MeResponse>> {
    let user = state.users.set_role(claims.role, user_id, req.role).await?;
    Ok(Json(MeResponse {
        success: true,
        user: user.into(),
    }))
}
