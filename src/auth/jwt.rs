//! JWT token management
//!
//! Handles creation, validation, and refresh of JWT tokens.

use crate::auth::Role;
use crate::config::AuthConfig;
use crate::error::AppError;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub token_type: TokenType,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Token pair response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Signs and verifies tokens with the configured secret
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_ttl: Duration::minutes(config.access_token_minutes),
            refresh_ttl: Duration::days(config.refresh_token_days),
        }
    }

    /// Create access and refresh tokens for a user
    pub fn create_tokens(&self, user_id: Uuid, email: &str, role: Role) -> Result<TokenPair, AppError> {
        let access_token = self.sign(user_id, email, role, TokenType::Access, self.access_ttl)?;
        let refresh_token = self.sign(user_id, email, role, TokenType::Refresh, self.refresh_ttl)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    fn sign(
        &self,
        user_id: Uuid,
        email: &str,
        role: Role,
        token_type: TokenType,
        ttl: Duration,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            role,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            token_type,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to create {:?} token: {}", token_type, e)))
    }

    /// Decode and validate a JWT token
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let token_data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::Unauthorized("Token expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidToken => {
                    AppError::Unauthorized("Invalid token".to_string())
                }
                _ => AppError::Unauthorized(format!("Token validation failed: {}", e)),
            })?;

        Ok(token_data.claims)
    }

    /// Decode a token that must be an access token
    pub fn decode_access(&self, token: &str) -> Result<Claims, AppError> {
        let claims = self.decode(token)?;
        if claims.token_type != TokenType::Access {
            return Err(AppError::Unauthorized("Refresh token used as access token".to_string()));
        }
        Ok(claims)
    }

    /// Refresh tokens using a valid refresh token
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let claims = self.decode(refresh_token)?;

        if claims.token_type != TokenType::Refresh {
            return Err(AppError::Unauthorized("Invalid token type for refresh".to_string()));
        }

        self.create_tokens(claims.sub, &claims.email, claims.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(&AuthConfig::default())
    }

    #[test]
    fn test_access_token_round_trip() {
        let tokens = service().create_tokens(Uuid::new_v4(), "a@b.cz", Role::Manager).unwrap();
        let claims = service().decode_access(&tokens.access_token).unwrap();
        assert_eq!(claims.role, Role::Manager);
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(tokens.expires_in, 15 * 60);
    }

    #[test]
    fn test_refresh_requires_refresh_token() {
        let tokens = service().create_tokens(Uuid::new_v4(), "a@b.cz", Role::Curator).unwrap();
        assert!(service().refresh(&tokens.access_token).is_err());
        assert!(service().refresh(&tokens.refresh_token).is_ok());
        assert!(service().decode_access(&tokens.refresh_token).is_err());
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let other = TokenService::new(&AuthConfig {
            jwt_secret: "other".to_string(),
            ..AuthConfig::default()
        });
        let tokens = other.create_tokens(Uuid::new_v4(), "a@b.cz", Role::Curator).unwrap();
        assert!(service().decode(&tokens.access_token).is_err());
    }
}
