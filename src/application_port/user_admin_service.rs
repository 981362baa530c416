use crate::application_port::AuthError;
use crate::domain_model::{SessionSummary, UserId, UserStatus};

#[async_trait::async_trait]
pub trait UserAdminService: Send + Sync {
    /// Leaving `Active` revokes every live session in the same transaction.
    async fn update_status(&self, user_id: UserId, status: UserStatus) -> Result<(), AuthError>;
    async fn list_sessions(&self, user_id: UserId) -> Result<Vec<SessionSummary>, AuthError>;
}
