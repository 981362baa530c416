use crate::application_port::{AccessToken, AuthError, TokenClaims, TokenCodec};
use crate::domain_model::Role;
use crate::logger::*;
use std::sync::Arc;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

/// Stateless request authenticator. Only the token codec is consulted; the
/// session store is never touched on this path.
pub struct Gate {
    token_codec: Arc<dyn TokenCodec>,
}

impl Gate {
    pub fn new(token_codec: Arc<dyn TokenCodec>) -> Self {
        Gate { token_codec }
    }

    /// Bearer header first, then the access-token cookie.
    pub fn extract_token(authorization: Option<&str>, cookie: Option<&str>) -> Option<String> {
        let from_header = authorization.and_then(|value| {
            let (scheme, token) = value.split_once(' ')?;
            (scheme == "Bearer" && !token.is_empty()).then(|| token.to_string())
        });
        from_header.or_else(|| cookie.filter(|c| !c.is_empty()).map(str::to_string))
    }

    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
        cookie: Option<&str>,
    ) -> Result<TokenClaims, AuthError> {
        let token = Self::extract_token(authorization, cookie)
            .ok_or_else(|| AuthError::unauthorized("No access token provided"))?;

        // Expired and malformed look the same from outside.
        self.token_codec
            .verify_access_token(&AccessToken(token))
            .await
            .map_err(|e| {
                debug!("access token rejected: {}", e);
                AuthError::unauthorized("Invalid access token")
            })
    }

    pub fn require_role(claims: &TokenClaims, role: Role) -> Result<(), AuthError> {
        if claims.role == role {
            Ok(())
        } else {
            Err(AuthError::Forbidden(format!(
                "Requires the {} role",
                role.as_str()
            )))
        }
    }
}
