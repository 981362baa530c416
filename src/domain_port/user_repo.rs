use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::StorageTx;

#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    /// Exact, case-sensitive match against email OR username.
    async fn find_by_email_or_username(
        &self,
        email_or_username: &str,
    ) -> Result<Option<UserRecord>, AuthError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError>;

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, AuthError>;

    /// Returns `false` when a user with the same email or username exists.
    async fn insert_if_absent(&self, user: &UserRecord) -> Result<bool, AuthError>;

    async fn update_password_hash_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        user_id: UserId,
        password_hash: &str,
    ) -> Result<(), AuthError>;

    async fn update_status_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        user_id: UserId,
        status: UserStatus,
    ) -> Result<(), AuthError>;
}
