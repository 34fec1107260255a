// Security and Authentication - signed bearer tokens for portal users
// Users are provisioned elsewhere; this service only issues, validates and revokes tokens

use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::RwLock;
use serde::{Serialize, Deserialize};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation, Algorithm};
use tracing::{info, warn, instrument};

use crate::core::{Role, UserId};
use crate::entities::from_millis;
use crate::error::{AppResult, AppError};
use crate::infrastructure::viewer::Session;

/// Secret used when none is configured. Only fit for local development.
pub const DEV_JWT_SECRET: &str = "campus-portal-dev-secret";

/// Identity carried inside the token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenUser {
    pub id: UserId,
    pub role: Role,
}

/// JWT Claims for authentication
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user: TokenUser,
    pub sid: String,        // Session id, used for revocation
    pub iat: u64,           // Issued at (seconds)
    pub exp: u64,           // Expires at (seconds)
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry: Duration,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_expiry: Duration::from_secs(24 * 3600),
        }
    }
}

/// Authentication service
pub struct SecurityService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,

    /// Sessions ended through logout before their expiry
    revoked: RwLock<HashSet<String>>,

    config: SecurityConfig,
}

impl SecurityService {
    pub fn new(config: SecurityConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

        Self {
            encoding_key,
            decoding_key,
            revoked: RwLock::new(HashSet::new()),
            config,
        }
    }

    /// Issue a signed token for a provisioned user
    #[instrument(skip(self))]
    pub fn issue_token(&self, user_id: UserId, role: Role) -> AppResult<String> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let exp = now + self.config.jwt_expiry.as_secs();

        let claims = Claims {
            user: TokenUser { id: user_id, role },
            sid: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;
        info!("Issued token for user {} ({})", user_id, role);
        Ok(token)
    }

    /// Validate JWT token and return the session it represents
    #[instrument(skip(self, token))]
    pub async fn validate_token(&self, token: &str) -> AppResult<Session> {
        let validation = Validation::new(Algorithm::HS256);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

        let claims = token_data.claims;

        if self.revoked.read().await.contains(&claims.sid) {
            return Err(AppError::Unauthorized("Session has been logged out".to_string()));
        }

        Ok(Session {
            session_id: claims.sid,
            user_id: claims.user.id,
            role: claims.user.role,
            issued_at: from_millis(claims.iat as i64 * 1000),
            expires_at: from_millis(claims.exp as i64 * 1000),
        })
    }

    /// Logout and invalidate session
    #[instrument(skip(self))]
    pub async fn logout(&self, session: &Session) -> AppResult<()> {
        let mut revoked = self.revoked.write().await;
        if !revoked.insert(session.session_id.clone()) {
            warn!("Session {} was already logged out", session.session_id);
        }
        info!("AUDIT: logout - user {}", session.user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> SecurityService {
        SecurityService::new(SecurityConfig {
            jwt_secret: "test-secret".to_string(),
            jwt_expiry: Duration::from_secs(3600),
        })
    }

    #[tokio::test]
    async fn test_issue_and_validate_token() {
        let security = service();
        let token = security.issue_token(UserId(42), Role::Faculty).unwrap();

        let session = security.validate_token(&token).await.unwrap();
        assert_eq!(session.user_id, UserId(42));
        assert_eq!(session.role, Role::Faculty);
        assert!(session.expires_at > session.issued_at);
    }

    #[tokio::test]
    async fn test_rejects_foreign_signature() {
        let other = SecurityService::new(SecurityConfig {
            jwt_secret: "someone-else".to_string(),
            jwt_expiry: Duration::from_secs(3600),
        });
        let token = other.issue_token(UserId(1), Role::Admin).unwrap();

        let err = service().validate_token(&token).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert!(service().validate_token("not-a-token").await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_expired_token() {
        let security = service();
        let claims = Claims {
            user: TokenUser { id: UserId(1), role: Role::Student },
            sid: "old".to_string(),
            iat: 1_000,
            exp: 2_000,
        };
        let token = encode(&Header::default(), &claims, &security.encoding_key).unwrap();
        assert!(security.validate_token(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_logout_revokes_only_that_session() {
        let security = service();
        let first = security.issue_token(UserId(7), Role::Student).unwrap();
        let second = security.issue_token(UserId(7), Role::Student).unwrap();

        let session = security.validate_token(&first).await.unwrap();
        security.logout(&session).await.unwrap();

        assert!(security.validate_token(&first).await.is_err());
        assert!(security.validate_token(&second).await.is_ok());
    }
}
