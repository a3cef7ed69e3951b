//! Staff accounts and sign-in

use crate::auth::{hash_password, validate_password, verify_password, Role, TokenPair, TokenService};
use crate::error::AppError;
use crate::models::User;
use crate::store::Store;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub struct UserService {
    store: Arc<dyn Store>,
    tokens: Arc<TokenService>,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>, tokens: Arc<TokenService>) -> Self {
        Self { store, tokens }
    }

    /// New accounts are curators
    pub async fn register(&self, request: RegisterRequest) -> Result<(User, TokenPair), AppError> {
        request.validate()?;
        validate_password(&request.password)?;

        let email = request.email.trim().to_lowercase();
        let password_hash = hash_password(&request.password)?;
        let user = self
            .store
            .insert_user(User::new(email, password_hash, request.name, Role::Curator))
            .await?;
        let tokens = self.tokens.create_tokens(user.id, &user.email, user.role)?;

        info!("Registered user {}", user.id);
        Ok((user, tokens))
    }

    pub async fn login(&self, request: LoginRequest) -> Result<(User, TokenPair), AppError> {
        let invalid = || AppError::Unauthorized("Invalid email or password".to_string());
        let user = self
            .store
            .find_user_by_email(&request.email.trim().to_lowercase())
            .await?
            .ok_or_else(invalid)?;
        if !verify_password(&request.password, &user.password_hash)? {
            return Err(invalid());
        }

        let tokens = self.tokens.create_tokens(user.id, &user.email, user.role)?;
        Ok((user, tokens))
    }

    pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        self.tokens.refresh(refresh_token)
    }

    pub async fn get(&self, id: Uuid) -> Result<User, AppError> {
        self.store.get_user(id).await
    }

    /// Change a user's role; admins only
    pub async fn set_role(&self, admin_role: Role, user_id: Uuid, role: Role) -> Result<User, AppError> {
        if admin_role != Role::Admin {
            return Err(AppError::Forbidden("Only admins can change roles".to_string()));
        }
        let mut user = self.store.get_user(user_id).await?;
        user.role = role;
        user.updated_at = Utc::now();
        let user = self.store.update_user(user).await?;
        info!("User {} is now {}", user.id, user.role);
        Ok(user)
    }
}
