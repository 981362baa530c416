use super::cookie::CookiePolicy;
use super::error::*;
use crate::application_port::*;
use crate::domain_model::{Role, SessionInfo, SessionSummary, UserId, UserStatus};
use crate::logger::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::Reply;
use warp::hyper::body::Bytes;
use warp::reply::Response;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

fn ok_json<T: Serialize>(data: T) -> Response {
    warp::reply::json(&ApiResponse::ok(data)).into_response()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Message {
    message: &'static str,
}

/// Where tokens travel: `Set-Cookie` headers or the JSON body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Json,
    #[default]
    Cookie,
}

/// A refresh token together with the channel it arrived on, which decides
/// how the answer is delivered.
#[derive(Debug, Clone)]
pub enum RefreshSource {
    Cookie(String),
    Body(String),
}

impl RefreshSource {
    fn token(&self) -> RefreshToken {
        match self {
            RefreshSource::Cookie(t) | RefreshSource::Body(t) => RefreshToken(t.clone()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenBody {
    refresh_token: Option<String>,
}

/// Cookie first, then an optional `{"refreshToken": ...}` body.
pub fn refresh_source(cookie: Option<String>, body: &Bytes) -> Result<RefreshSource, ApiRejection> {
    if let Some(token) = cookie.filter(|c| !c.is_empty()) {
        return Ok(RefreshSource::Cookie(token));
    }
    let parsed: RefreshTokenBody = if body.iter().all(u8::is_ascii_whitespace) {
        RefreshTokenBody::default()
    } else {
        serde_json::from_slice(body).map_err(|e| {
            ApiRejection::new(ApiErrorCode::BadRequest, format!("Malformed request body: {e}"))
        })?
    };
    parsed
        .refresh_token
        .filter(|t| !t.is_empty())
        .map(RefreshSource::Body)
        .ok_or_else(|| ApiRejection::new(ApiErrorCode::Unauthorized, "Refresh token required"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email_or_username: String,
    pub password: String,
    #[serde(default)]
    pub response_type: ResponseType,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    access_token_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token_expires_at: Option<DateTime<Utc>>,
}

pub async fn login(
    body: LoginRequest,
    session_info: SessionInfo,
    auth_service: Arc<dyn AuthService>,
    cookies: CookiePolicy,
) -> Result<Response, warp::Rejection> {
    let login_input = LoginInput {
        email_or_username: body.email_or_username,
        password: body.password,
        session_info,
    };
    let result = auth_service.login(login_input).await.map_err(rejection)?;

    match body.response_type {
        ResponseType::Json => Ok(ok_json(LoginResponse {
            role: result.role,
            user_id: Some(result.user_id),
            access_token: Some(result.access_token.0),
            refresh_token: Some(result.refresh_token.0),
            access_token_expires_at: Some(result.access_token_expires_at),
            refresh_token_expires_at: Some(result.refresh_token_expires_at),
        })),
        ResponseType::Cookie => {
            let mut response = ok_json(LoginResponse {
                role: result.role,
                user_id: None,
                access_token: None,
                refresh_token: None,
                access_token_expires_at: None,
                refresh_token_expires_at: None,
            });
            cookies
                .set_access(&mut response, &result.access_token.0)
                .and_then(|_| cookies.set_refresh(&mut response, &result.refresh_token.0))
                .map_err(ApiRejection::internal)
                .map_err(warp::reject::custom)?;
            Ok(response)
        }
    }
}

pub async fn logout(
    claims: TokenClaims,
    source: RefreshSource,
    auth_service: Arc<dyn AuthService>,
    cookies: CookiePolicy,
) -> Result<Response, warp::Rejection> {
    auth_service
        .logout(claims.user_id, &source.token())
        .await
        .map_err(rejection)?;

    let mut response = ok_json(Message {
        message: "Logged out successfully",
    });
    cookies
        .clear_all(&mut response)
        .map_err(ApiRejection::internal)
        .map_err(warp::reject::custom)?;
    Ok(response)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    access_token_expires_at: DateTime<Utc>,
}

pub async fn refresh_token(
    source: RefreshSource,
    auth_service: Arc<dyn AuthService>,
    cookies: CookiePolicy,
) -> Result<Response, warp::Rejection> {
    let result = auth_service
        .refresh_token(&source.token())
        .await
        .map_err(rejection)?;

    match source {
        RefreshSource::Body(_) => Ok(ok_json(RefreshResponse {
            access_token: Some(result.access_token.0),
            access_token_expires_at: result.access_token_expires_at,
        })),
        RefreshSource::Cookie(_) => {
            let mut response = ok_json(RefreshResponse {
                access_token: None,
                access_token_expires_at: result.access_token_expires_at,
            });
            cookies
                .set_access(&mut response, &result.access_token.0)
                .map_err(ApiRejection::internal)
                .map_err(warp::reject::custom)?;
            Ok(response)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: String,
}

pub async fn forgot_password(
    body: ForgotPasswordRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    auth_service
        .forgot_password(&body.email)
        .await
        .map_err(rejection)?;

    Ok(ok_json(Message {
        message: "Password reset instructions sent",
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub reset_token: String,
    pub new_password: String,
}

pub async fn reset_password(
    body: ResetPasswordRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    auth_service
        .reset_password(ResetPasswordInput {
            reset_token: body.reset_token,
            new_password: body.new_password,
        })
        .await
        .map_err(rejection)?;

    Ok(ok_json(Message {
        message: "Password has been reset",
    }))
}

#[derive(Debug, Serialize)]
struct VerifyResponse {
    valid: bool,
}

pub async fn verify_reset_token(
    reset_token: String,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let valid = auth_service
        .verify_reset_token(&reset_token)
        .await
        .map_err(rejection)?;

    Ok(ok_json(VerifyResponse { valid }))
}

pub async fn me(claims: TokenClaims) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(ok_json(claims))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: UserStatus,
}

pub async fn update_status(
    user_id: UserId,
    admin: TokenClaims,
    body: UpdateStatusRequest,
    user_admin_service: Arc<dyn UserAdminService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    info!(admin = %admin.user_id, %user_id, status = body.status.as_str(), "status change requested");
    user_admin_service
        .update_status(user_id, body.status)
        .await
        .map_err(rejection)?;

    Ok(ok_json(Message {
        message: "User status updated",
    }))
}

pub async fn list_sessions(
    user_id: UserId,
    claims: TokenClaims,
    user_admin_service: Arc<dyn UserAdminService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    if claims.role != Role::Admin && claims.user_id != user_id {
        return Err(rejection(AuthError::Forbidden(
            "Cannot list sessions of another user".to_string(),
        )));
    }

    let sessions: Vec<SessionSummary> = user_admin_service
        .list_sessions(user_id)
        .await
        .map_err(rejection)?;

    Ok(ok_json(sessions))
}
