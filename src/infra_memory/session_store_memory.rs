use super::store::{MemoryDb, MemoryTx, StagedWrite};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};

pub struct MemorySessionStore {
    db: MemoryDb,
}

impl MemorySessionStore {
    pub fn new(db: MemoryDb) -> Self {
        MemorySessionStore { db }
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: NewRefreshSession) -> Result<RefreshSession, AuthError> {
        let created = RefreshSession::from_new(session, Utc::now());
        self.db.with(|t| {
            if t.sessions.contains_key(&created.token_id) {
                return Err(AuthError::Store(format!(
                    "duplicate token id {}",
                    created.token_id
                )));
            }
            t.sessions
                .insert(created.token_id.clone(), created.clone());
            Ok(created)
        })?
    }

    async fn find_active(
        &self,
        token_id: &str,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshSession>, AuthError> {
        self.db.with(|t| {
            t.sessions
                .get(token_id)
                .filter(|s| s.user_id == user_id && s.is_usable(now))
                .cloned()
        })
    }

    async fn revoke(&self, token_id: &str, now: DateTime<Utc>) -> Result<bool, AuthError> {
        self.db.with(|t| {
            t.sessions
                .get_mut(token_id)
                .map(|s| s.revoke(now))
                .unwrap_or(false)
        })
    }

    async fn revoke_all_for_user_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<u64, AuthError> {
        let tx = MemoryTx::from_dyn(tx)?;
        let pending = tx.db().with(|t| {
            t.sessions
                .values()
                .filter(|s| s.user_id == user_id && !s.is_revoked)
                .count() as u64
        })?;
        tx.stage(StagedWrite::RevokeSessions { user_id, at: now });
        Ok(pending)
    }

    async fn touch_last_used(&self, token_id: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
        self.db.with(|t| {
            if let Some(s) = t.sessions.get_mut(token_id) {
                s.last_used_at = Some(now);
            }
        })
    }

    async fn list_active_for_user(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshSession>, AuthError> {
        let mut sessions = self.db.with(|t| {
            t.sessions
                .values()
                .filter(|s| s.user_id == user_id && s.is_usable(now))
                .cloned()
                .collect::<Vec<_>>()
        })?;
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }
}
