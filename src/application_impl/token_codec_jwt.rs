use crate::application_port::{
    AccessToken, AuthError, Principal, RefreshToken, TokenClaims, TokenCodec,
};
use crate::domain_model::{Role, UserId};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub signing_key: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TokenUse {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    sub: String, // user id as string
    username: String,
    email: String,
    role: Role,
    typ: TokenUse,
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jti: Option<String>, // links a refresh token to its session row
}

pub struct JwtHs256Codec {
    cfg: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtHs256Codec {
    pub fn new(cfg: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(&cfg.signing_key);
        let decoding_key = DecodingKey::from_secret(&cfg.signing_key);
        JwtHs256Codec {
            cfg,
            encoding_key,
            decoding_key,
        }
    }

    fn sign(
        &self,
        principal: &Principal,
        typ: TokenUse,
        jti: Option<String>,
        ttl: Duration,
    ) -> Result<(String, DateTime<Utc>), AuthError> {
        let iat_dt = Utc::now();
        let exp_dt = iat_dt + ttl;
        let claims = JwtClaims {
            sub: principal.user_id.to_string(),
            username: principal.username.clone(),
            email: principal.email.clone(),
            role: principal.role,
            typ,
            exp: exp_dt.timestamp(),
            iat: iat_dt.timestamp(),
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            jti,
        };
        let token = self.encode_claims(&claims)?;
        Ok((token, exp_dt))
    }

    fn encode_claims(&self, claims: &JwtClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::InternalError(e.to_string()))
    }

    fn verify(&self, token: &str, expected: TokenUse) -> Result<TokenClaims, AuthError> {
        let mut v = Validation::new(Algorithm::HS256);
        v.validate_exp = true;
        v.leeway = 0;
        v.set_audience(&[self.cfg.audience.clone()]);
        v.set_issuer(&[self.cfg.issuer.clone()]);
        v.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        let data = decode::<JwtClaims>(token, &self.decoding_key, &v).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid,
            }
        })?;
        let claims = data.claims;
        if claims.typ != expected {
            return Err(AuthError::TokenInvalid);
        }

        Ok(TokenClaims {
            user_id: Self::parse_user_id(&claims.sub)?,
            username: claims.username,
            email: claims.email,
            role: claims.role,
            jti: claims.jti,
            issued_at: Self::timestamp(claims.iat)?,
            expires_at: Self::timestamp(claims.exp)?,
        })
    }

    #[inline]
    fn parse_user_id(sub: &str) -> Result<UserId, AuthError> {
        sub.parse::<UserId>().map_err(|_| AuthError::TokenInvalid)
    }

    #[inline]
    fn timestamp(secs: i64) -> Result<DateTime<Utc>, AuthError> {
        Utc.timestamp_opt(secs, 0)
            .single()
            .ok_or(AuthError::TokenInvalid)
    }
}

#[async_trait::async_trait]
impl TokenCodec for JwtHs256Codec {
    async fn issue_access_token(
        &self,
        principal: &Principal,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError> {
        let (token, exp_dt) = self.sign(principal, TokenUse::Access, None, self.cfg.access_ttl)?;
        Ok((AccessToken(token), exp_dt))
    }

    async fn issue_refresh_token(
        &self,
        principal: &Principal,
        jti: &str,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError> {
        let (token, exp_dt) = self.sign(
            principal,
            TokenUse::Refresh,
            Some(jti.to_string()),
            self.cfg.refresh_ttl,
        )?;
        Ok((RefreshToken(token), exp_dt))
    }

    async fn verify_access_token(&self, token: &AccessToken) -> Result<TokenClaims, AuthError> {
        self.verify(&token.0, TokenUse::Access)
    }

    async fn verify_refresh_token(&self, token: &RefreshToken) -> Result<TokenClaims, AuthError> {
        self.verify(&token.0, TokenUse::Refresh)
    }
}
