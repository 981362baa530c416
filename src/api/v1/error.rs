use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use crate::logger::*;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let (code, message) = if let Some(rejection) = err.find::<ApiRejection>() {
        (rejection.code, rejection.message.clone())
    } else if err.is_not_found() {
        (ApiErrorCode::NotFound, "Route not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (ApiErrorCode::BadRequest, format!("Malformed request body: {e}"))
    } else if err.find::<reject::PayloadTooLarge>().is_some() {
        (ApiErrorCode::BadRequest, "Request body too large".to_string())
    } else if err.find::<reject::LengthRequired>().is_some() {
        (ApiErrorCode::BadRequest, "Content-Length required".to_string())
    } else if let Some(e) = err.find::<reject::InvalidHeader>() {
        (ApiErrorCode::BadRequest, e.to_string())
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        (ApiErrorCode::NotFound, "Route not found".to_string())
    } else {
        warn!("Unhandled rejection: {:?}", err);
        (ApiErrorCode::InternalError, "Internal error".to_string())
    };

    debug!(?code, %message, "request rejected");
    let json = warp::reply::json(&ApiResponse::<()>::err(code, message));
    Ok(warp::reply::with_status(json, code.status()))
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    NotFound,
    Unauthorized,
    Forbidden,
    Conflict,
    BadRequest,
    InternalError,
}

impl ApiErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ApiErrorCode::Conflict => StatusCode::CONFLICT,
            ApiErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiRejection {
    pub code: ApiErrorCode,
    pub message: String,
}

impl ApiRejection {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiRejection {
            code,
            message: message.into(),
        }
    }

    pub fn internal<E: std::fmt::Display>(error: E) -> Self {
        warn!("Internal error: {}", error);
        ApiRejection::new(ApiErrorCode::InternalError, "Internal error")
    }
}

impl reject::Reject for ApiRejection {}

impl From<AuthError> for ApiRejection {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::NotFound(m) => ApiRejection::new(ApiErrorCode::NotFound, m),
            AuthError::Unauthorized(m) => ApiRejection::new(ApiErrorCode::Unauthorized, m),
            AuthError::TokenInvalid | AuthError::TokenExpired => {
                ApiRejection::new(ApiErrorCode::Unauthorized, "Invalid token")
            }
            AuthError::Forbidden(m) => ApiRejection::new(ApiErrorCode::Forbidden, m),
            AuthError::Conflict(m) => ApiRejection::new(ApiErrorCode::Conflict, m),
            AuthError::BadRequest(m) => ApiRejection::new(ApiErrorCode::BadRequest, m),
            e @ (AuthError::Store(_) | AuthError::InternalError(_)) => ApiRejection::internal(e),
        }
    }
}

pub(crate) fn rejection(error: AuthError) -> Rejection {
    reject::custom(ApiRejection::from(error))
}
