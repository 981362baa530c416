use super::error::*;
use super::handler;
use crate::application_impl::{ACCESS_TOKEN_COOKIE, Gate};
use crate::application_port::TokenClaims;
use crate::domain_model::{Role, SessionInfo, UserId};
use crate::server::Server;
use std::convert::Infallible;
use std::net::SocketAddr;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use warp::hyper::body::Bytes;
use warp::{Filter, reject};

/// Upper bound on any request body.
const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let cookies = server.cookie_policy;

    let login = warp::post()
        .and(warp::path!("auth" / "login"))
        .and(json_body())
        .and(with_session_info())
        .and(with(server.auth_service.clone()))
        .and(with_value(cookies))
        .and_then(handler::login);

    let logout = warp::post()
        .and(warp::path!("auth" / "logout"))
        .and(with_identity(server.gate.clone()))
        .and(with_refresh_token())
        .and(with(server.auth_service.clone()))
        .and(with_value(cookies))
        .and_then(handler::logout);

    let refresh = warp::post()
        .and(warp::path!("auth" / "refresh-token"))
        .and(with_refresh_token())
        .and(with(server.auth_service.clone()))
        .and(with_value(cookies))
        .and_then(handler::refresh_token);

    let forgot_password = warp::post()
        .and(warp::path!("auth" / "forgot-password"))
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and_then(handler::forgot_password);

    let reset_password = warp::post()
        .and(warp::path!("auth" / "reset-password"))
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and_then(handler::reset_password);

    let verify_reset_token = warp::get()
        .and(warp::path!("auth" / "reset-password" / "verify" / String))
        .and(with(server.auth_service.clone()))
        .and_then(handler::verify_reset_token);

    let me = warp::get()
        .and(warp::path!("auth" / "me"))
        .and(with_identity(server.gate.clone()))
        .and_then(handler::me);

    let update_status = warp::patch()
        .and(warp::path!("users" / UserId / "status"))
        .and(with_role(server.gate.clone(), Role::Admin))
        .and(json_body())
        .and(with(server.user_admin_service.clone()))
        .and_then(handler::update_status);

    let list_sessions = warp::get()
        .and(warp::path!("users" / UserId / "sessions"))
        .and(with_identity(server.gate.clone()))
        .and(with(server.user_admin_service.clone()))
        .and_then(handler::list_sessions);

    login
        .or(logout)
        .or(refresh)
        .or(forgot_password)
        .or(reset_password)
        .or(verify_reset_token)
        .or(me)
        .or(update_status)
        .or(list_sessions)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn with_value<T: Clone + Send + Sync>(
    value: T,
) -> impl Filter<Extract = (T,), Error = Infallible> + Clone {
    warp::any().map(move || value.clone())
}

/// Runs the gate and hands the verified claims to the handler.
fn with_identity(
    gate: Arc<Gate>,
) -> impl Filter<Extract = (TokenClaims,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(warp::cookie::optional::<String>(ACCESS_TOKEN_COOKIE))
        .and_then(move |authorization: Option<String>, cookie: Option<String>| {
            let gate = gate.clone();
            async move {
                gate.authenticate(authorization.as_deref(), cookie.as_deref())
                    .await
                    .map_err(rejection)
            }
        })
}

fn with_role(
    gate: Arc<Gate>,
    role: Role,
) -> impl Filter<Extract = (TokenClaims,), Error = warp::Rejection> + Clone {
    with_identity(gate).and_then(move |claims: TokenClaims| async move {
        Gate::require_role(&claims, role).map_err(rejection)?;
        Ok::<_, warp::Rejection>(claims)
    })
}

fn json_body<T: DeserializeOwned + Send>()
-> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// Like `content_length_limit`, but a missing length is fine: refresh and
/// logout usually arrive with an empty body and the token in a cookie.
fn optional_body_within_limit() -> impl Filter<Extract = (), Error = warp::Rejection> + Clone {
    warp::header::optional::<u64>("content-length")
        .and_then(|length: Option<u64>| async move {
            match length {
                Some(n) if n > MAX_BODY_BYTES => Err(reject::custom(ApiRejection::new(
                    ApiErrorCode::BadRequest,
                    "Request body too large",
                ))),
                _ => Ok(()),
            }
        })
        .untuple_one()
}

fn with_refresh_token()
-> impl Filter<Extract = (handler::RefreshSource,), Error = warp::Rejection> + Clone {
    warp::cookie::optional::<String>(super::cookie::REFRESH_TOKEN_COOKIE)
        .and(optional_body_within_limit())
        .and(warp::body::bytes())
        .and_then(|cookie: Option<String>, body: Bytes| async move {
            handler::refresh_source(cookie, &body).map_err(reject::custom)
        })
}

/// Client address from the first `X-Forwarded-For` hop, else the peer.
fn with_session_info() -> impl Filter<Extract = (SessionInfo,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>("user-agent")
        .and(warp::header::optional::<String>("x-forwarded-for"))
        .and(warp::addr::remote())
        .map(
            |user_agent: Option<String>,
             forwarded: Option<String>,
             remote: Option<SocketAddr>| {
                let ip = forwarded
                    .as_deref()
                    .and_then(|f| f.split(',').next())
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty())
                    .or_else(|| remote.map(|addr| addr.ip().to_string()));
                SessionInfo::from_request(user_agent, ip)
            },
        )
}
