use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_RESET_TICKET_TTL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_MIN_PASSWORD_LEN: usize = 8;

pub struct RealAuthService {
    user_repo: Arc<dyn UserRepo>,
    session_store: Arc<dyn SessionStore>,
    reset_ticket_store: Arc<dyn ResetTicketStore>,
    reset_notifier: Arc<dyn ResetNotifier>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_codec: Arc<dyn TokenCodec>,
    tx_manager: Arc<dyn TxManager>,
    reset_ticket_ttl: Duration,
    min_password_len: usize,
}

impl RealAuthService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        session_store: Arc<dyn SessionStore>,
        reset_ticket_store: Arc<dyn ResetTicketStore>,
        reset_notifier: Arc<dyn ResetNotifier>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
        tx_manager: Arc<dyn TxManager>,
    ) -> Self {
        Self {
            user_repo,
            session_store,
            reset_ticket_store,
            reset_notifier,
            credential_hasher,
            token_codec,
            tx_manager,
            reset_ticket_ttl: DEFAULT_RESET_TICKET_TTL,
            min_password_len: DEFAULT_MIN_PASSWORD_LEN,
        }
    }

    pub fn with_reset_ticket_ttl(mut self, ttl: Duration) -> Self {
        self.reset_ticket_ttl = ttl;
        self
    }

    pub fn with_min_password_len(mut self, len: usize) -> Self {
        self.min_password_len = len;
        self
    }

    #[inline]
    fn new_jti() -> String {
        Uuid::new_v4().to_string()
    }

    #[inline]
    fn new_reset_token() -> String {
        Uuid::new_v4().to_string()
    }

    fn check_user_status(status: UserStatus) -> Result<(), AuthError> {
        match status {
            UserStatus::Active => Ok(()),
            UserStatus::Inactive => Err(AuthError::Forbidden(
                "User account is deactivated. Please contact support.".to_string(),
            )),
            UserStatus::Banned => Err(AuthError::Forbidden(
                "User account is banned. Please create a new account.".to_string(),
            )),
        }
    }

    /// Verifies a presented refresh token down to its live session row.
    /// Shared by refresh and logout.
    async fn resolve_session(
        &self,
        user_id: UserId,
        jti: &str,
        refresh_token: &RefreshToken,
    ) -> Result<RefreshSession, AuthError> {
        let session = self
            .session_store
            .find_active(jti, user_id, Utc::now())
            .await?
            .ok_or_else(|| AuthError::unauthorized("Session not found or revoked"))?;

        // A guessed jti under a forged token must not pass.
        let matches = self
            .credential_hasher
            .verify_password(&refresh_token.0, &session.token_hash)
            .await?;
        if !matches {
            warn!(%user_id, "refresh token does not match stored session hash");
            return Err(AuthError::unauthorized("Invalid session"));
        }

        Ok(session)
    }

    async fn lookup_ticket(&self, reset_token: &str) -> Result<(String, ResetTicket), AuthError> {
        let digest = self.credential_hasher.hash_deterministic(reset_token)?;
        let ticket = self
            .reset_ticket_store
            .get(&digest)
            .await?
            .ok_or_else(|| AuthError::bad_request("Invalid or expired reset token"))?;
        Ok((digest, ticket))
    }

    /// Revoke-all and the password write commit together or not at all.
    async fn commit_password_reset(
        &self,
        user_id: UserId,
        new_hash: &str,
    ) -> Result<u64, AuthError> {
        let mut tx = self.tx_manager.begin().await?;

        let revoked = self
            .session_store
            .revoke_all_for_user_in_tx(tx.as_mut(), user_id, Utc::now())
            .await?;
        self.user_repo
            .update_password_hash_in_tx(tx.as_mut(), user_id, new_hash)
            .await?;

        tx.commit().await?;
        Ok(revoked)
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError> {
        let LoginInput {
            email_or_username,
            password,
            session_info,
        } = request;

        // Distinct from "Invalid password" below; a known enumeration gap.
        let user = self
            .user_repo
            .find_by_email_or_username(&email_or_username)
            .await?
            .ok_or_else(|| AuthError::NotFound("User does not exist".to_string()))?;

        Self::check_user_status(user.status)?;

        let ok = self
            .credential_hasher
            .verify_password(&password, &user.password_hash)
            .await?;
        if !ok {
            debug!(user_id = %user.user_id, "login refused: wrong password");
            return Err(AuthError::unauthorized("Invalid password"));
        }

        let principal = Principal::from(&user);
        let jti = Self::new_jti();

        let (access_token, access_exp) = self.token_codec.issue_access_token(&principal).await?;
        let (refresh_token, refresh_exp) = self
            .token_codec
            .issue_refresh_token(&principal, &jti)
            .await?;

        let token_hash = self
            .credential_hasher
            .hash_password(&refresh_token.0)
            .await?;
        self.session_store
            .create(NewRefreshSession {
                token_id: jti,
                token_hash,
                user_id: user.user_id,
                info: session_info,
                expires_at: refresh_exp,
            })
            .await?;

        info!(user_id = %user.user_id, "login succeeded");

        Ok(LoginResult {
            user_id: user.user_id,
            role: user.role,
            access_token,
            refresh_token,
            access_token_expires_at: access_exp,
            refresh_token_expires_at: refresh_exp,
        })
    }

    async fn logout(&self, user_id: UserId, refresh_token: &RefreshToken) -> Result<(), AuthError> {
        let claims = self
            .token_codec
            .verify_refresh_token(refresh_token)
            .await
            .map_err(|e| e.or_unauthorized("Invalid refresh token"))?;
        let jti = claims
            .jti
            .ok_or_else(|| AuthError::unauthorized("Invalid refresh token"))?;

        let session = self.resolve_session(user_id, &jti, refresh_token).await?;

        if !self.session_store.revoke(&session.token_id, Utc::now()).await? {
            // Lost a race with another revocation.
            return Err(AuthError::unauthorized("Session not found or revoked"));
        }

        info!(%user_id, "session revoked by logout");
        Ok(())
    }

    async fn refresh_token(
        &self,
        refresh_token: &RefreshToken,
    ) -> Result<RefreshResult, AuthError> {
        let claims = self
            .token_codec
            .verify_refresh_token(refresh_token)
            .await
            .map_err(|e| e.or_unauthorized("Invalid refresh token"))?;
        let jti = claims
            .jti
            .ok_or_else(|| AuthError::unauthorized("Invalid refresh token"))?;

        let user = self
            .user_repo
            .find_by_id(claims.user_id)
            .await?
            .ok_or_else(|| AuthError::unauthorized("User not found"))?;

        Self::check_user_status(user.status)?;

        let session = self
            .resolve_session(user.user_id, &jti, refresh_token)
            .await?;

        // No rotation: the refresh token and its session row stay as issued.
        let (access_token, access_exp) = self
            .token_codec
            .issue_access_token(&Principal::from(&user))
            .await?;

        self.session_store
            .touch_last_used(&session.token_id, Utc::now())
            .await?;

        debug!(user_id = %user.user_id, "access token refreshed");

        Ok(RefreshResult {
            access_token,
            access_token_expires_at: access_exp,
        })
    }

    async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let user = self
            .user_repo
            .find_by_email(email)
            .await?
            .ok_or_else(|| AuthError::NotFound("Email does not exist".to_string()))?;

        Self::check_user_status(user.status)?;

        let reset_token = Self::new_reset_token();
        let digest = self.credential_hasher.hash_deterministic(&reset_token)?;
        let ticket = ResetTicket {
            user_id: user.user_id,
            created_at: Utc::now(),
        };
        self.reset_ticket_store
            .put(&digest, &ticket, self.reset_ticket_ttl)
            .await?;

        self.reset_notifier.deliver(&user.email, &reset_token).await?;

        info!(user_id = %user.user_id, "reset ticket issued");
        Ok(())
    }

    async fn verify_reset_token(&self, reset_token: &str) -> Result<bool, AuthError> {
        self.lookup_ticket(reset_token).await?;
        Ok(true)
    }

    async fn reset_password(&self, request: ResetPasswordInput) -> Result<(), AuthError> {
        let ResetPasswordInput {
            reset_token,
            new_password,
        } = request;

        let (digest, _) = self.lookup_ticket(&reset_token).await?;

        if new_password.chars().count() < self.min_password_len {
            return Err(AuthError::bad_request(format!(
                "Password must be at least {} characters long",
                self.min_password_len
            )));
        }

        let new_hash = self.credential_hasher.hash_password(&new_password).await?;

        // Claim the ticket before writing; a concurrent reset with the same
        // token loses here.
        let (ticket, remaining) = self
            .reset_ticket_store
            .take(&digest)
            .await?
            .ok_or_else(|| AuthError::bad_request("Invalid or expired reset token"))?;

        let revoked = match self.commit_password_reset(ticket.user_id, &new_hash).await {
            Ok(revoked) => revoked,
            Err(e) => {
                // Hand the ticket back for a retry within its original window.
                if let Err(put_err) = self
                    .reset_ticket_store
                    .put(&digest, &ticket, remaining)
                    .await
                {
                    warn!(user_id = %ticket.user_id, error = %put_err, "could not restore reset ticket");
                }
                return Err(e);
            }
        };

        info!(user_id = %ticket.user_id, revoked, "password reset, sessions revoked");
        Ok(())
    }
}
