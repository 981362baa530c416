use crate::application_port::{AuthError, UserAdminService};
use crate::domain_model::{SessionSummary, UserId, UserStatus};
use crate::domain_port::{SessionStore, TxManager, UserRepo};
use crate::logger::*;
use chrono::Utc;
use std::sync::Arc;

pub struct RealUserAdminService {
    user_repo: Arc<dyn UserRepo>,
    session_store: Arc<dyn SessionStore>,
    tx_manager: Arc<dyn TxManager>,
}

impl RealUserAdminService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        session_store: Arc<dyn SessionStore>,
        tx_manager: Arc<dyn TxManager>,
    ) -> RealUserAdminService {
        RealUserAdminService {
            user_repo,
            session_store,
            tx_manager,
        }
    }
}

#[async_trait::async_trait]
impl UserAdminService for RealUserAdminService {
    async fn update_status(&self, user_id: UserId, status: UserStatus) -> Result<(), AuthError> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".to_string()))?;

        if user.status == status {
            return Err(AuthError::Conflict(
                "User status is already set to this value".to_string(),
            ));
        }

        let mut tx = self.tx_manager.begin().await?;

        let mut revoked = 0;
        if status != UserStatus::Active {
            revoked = self
                .session_store
                .revoke_all_for_user_in_tx(tx.as_mut(), user_id, Utc::now())
                .await?;
        }
        self.user_repo
            .update_status_in_tx(tx.as_mut(), user_id, status)
            .await?;

        tx.commit().await?;

        info!(%user_id, status = status.as_str(), revoked, "user status changed");
        Ok(())
    }

    async fn list_sessions(&self, user_id: UserId) -> Result<Vec<SessionSummary>, AuthError> {
        if self.user_repo.find_by_id(user_id).await?.is_none() {
            return Err(AuthError::NotFound("User not found".to_string()));
        }

        let sessions = self
            .session_store
            .list_active_for_user(user_id, Utc::now())
            .await?;
        Ok(sessions.into_iter().map(SessionSummary::from).collect())
    }
}
