use crate::domain_model::{Role, SessionInfo, UserId, UserRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("token invalid")]
    TokenInvalid,
    #[error("token expired")]
    TokenExpired,
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        AuthError::Unauthorized(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        AuthError::BadRequest(message.into())
    }

    /// Collapses codec failures into `Unauthorized`, leaving infra errors untouched.
    pub fn or_unauthorized(self, message: &str) -> Self {
        match self {
            AuthError::TokenInvalid | AuthError::TokenExpired => {
                AuthError::Unauthorized(message.to_string())
            }
            other => other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email_or_username: String,
    pub password: String,
    pub session_info: SessionInfo,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user_id: UserId,
    pub role: Role,
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RefreshResult {
    pub access_token: AccessToken,
    pub access_token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ResetPasswordInput {
    pub reset_token: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RefreshToken(pub String);

/// The identity a token is issued for.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<&UserRecord> for Principal {
    fn from(user: &UserRecord) -> Self {
        Principal {
            user_id: user.user_id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Decoded, verified token claims; attached to the request by the gate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait TokenCodec: Send + Sync {
    async fn issue_access_token(
        &self,
        principal: &Principal,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError>;
    async fn issue_refresh_token(
        &self,
        principal: &Principal,
        jti: &str,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError>;
    /// Fails with `TokenExpired` or `TokenInvalid`.
    async fn verify_access_token(&self, token: &AccessToken) -> Result<TokenClaims, AuthError>;
    /// Fails with `TokenExpired` or `TokenInvalid`.
    async fn verify_refresh_token(&self, token: &RefreshToken) -> Result<TokenClaims, AuthError>;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
    /// Same input, same digest. Only for high-entropy, short-lived secrets.
    fn hash_deterministic(&self, secret: &str) -> Result<String, AuthError>;
}

/// The session manager: login, refresh, logout and the reset handshake.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError>;
    async fn logout(&self, user_id: UserId, refresh_token: &RefreshToken) -> Result<(), AuthError>;
    async fn refresh_token(&self, refresh_token: &RefreshToken)
    -> Result<RefreshResult, AuthError>;
    async fn forgot_password(&self, email: &str) -> Result<(), AuthError>;
    async fn verify_reset_token(&self, reset_token: &str) -> Result<bool, AuthError>;
    async fn reset_password(&self, request: ResetPasswordInput) -> Result<(), AuthError>;
}
