use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::StorageTx;
use chrono::{DateTime, Utc};

/// Durable refresh-session table, keyed by token id (`jti`).
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: NewRefreshSession) -> Result<RefreshSession, AuthError>;

    /// The session for `(token_id, user_id)` if it is not revoked and
    /// `expires_at > now`.
    async fn find_active(
        &self,
        token_id: &str,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshSession>, AuthError>;

    /// Revokes a single session. `false` if it was already revoked or absent.
    async fn revoke(&self, token_id: &str, now: DateTime<Utc>) -> Result<bool, AuthError>;

    /// Revokes every non-revoked session of the user; returns how many.
    async fn revoke_all_for_user_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<u64, AuthError>;

    async fn touch_last_used(&self, token_id: &str, now: DateTime<Utc>) -> Result<(), AuthError>;

    /// Live sessions, newest first.
    async fn list_active_for_user(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshSession>, AuthError>;
}
