use super::refresh_coordinator::{RefreshCoordinator, RefreshOutcome, TokenRefresher};
use crate::domain_model::Role;
use crate::logger::*;
use anyhow::bail;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    /// The session could not be renewed; the user has to sign in again.
    #[error("login required")]
    LoginRequired,
    #[error("{status}: {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<EnvelopeError>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    role: Role,
}

/// Renews the access-token cookie through `/auth/refresh-token`, sharing the
/// client's cookie jar.
pub struct HttpTokenRefresher {
    http: reqwest::Client,
    url: String,
}

#[async_trait::async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self) -> anyhow::Result<()> {
        let response = self.http.post(&self.url).send().await?;
        if !response.status().is_success() {
            bail!("refresh rejected with {}", response.status());
        }
        Ok(())
    }
}

/// Cookie-mode client for the `/api/v1` surface. A 401 on a first attempt goes
/// through the refresh coordinator and the request is replayed once.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    coordinator: RefreshCoordinator,
}

impl ApiClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:8080`.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        let base_url = format!("{}/api/v1", base_url.trim_end_matches('/'));
        let refresher = HttpTokenRefresher {
            http: http.clone(),
            url: format!("{base_url}/auth/refresh-token"),
        };
        Ok(ApiClient {
            http,
            base_url,
            coordinator: RefreshCoordinator::new(Arc::new(refresher)),
        })
    }

    pub async fn login(&self, email_or_username: &str, password: &str) -> Result<Role, ClientError> {
        let body = json!({
            "emailOrUsername": email_or_username,
            "password": password,
            "responseType": "cookie",
        });
        let response = self
            .http
            .post(self.url("auth/login"))
            .json(&body)
            .send()
            .await?;
        let data: LoginData = Self::decode(response).await?;
        info!(role = data.role.as_str(), "signed in");
        Ok(data.role)
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        let _: Value = self.send(Method::POST, "auth/logout", None).await?;
        Ok(())
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(Method::GET, path, None).await
    }

    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ClientError> {
        let mut retried = false;
        loop {
            let mut request = self.http.request(method.clone(), self.url(path));
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send().await?;

            if response.status() == StatusCode::UNAUTHORIZED && !retried {
                retried = true;
                match self.coordinator.on_unauthorized().await {
                    RefreshOutcome::Retry => continue,
                    RefreshOutcome::GiveUp => return Err(ClientError::LoginRequired),
                }
            }
            return Self::decode(response).await;
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        let envelope: Envelope<T> = response.json().await?;
        match (envelope.success, envelope.data) {
            (true, Some(data)) => Ok(data),
            (_, _) => Err(ClientError::Api {
                status: status.as_u16(),
                message: envelope
                    .error
                    .map(|e| e.message)
                    .unwrap_or_else(|| "empty response".to_string()),
            }),
        }
    }
}
