use super::store::{MemoryDb, MemoryTx, StagedWrite};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;

pub struct MemoryUserRepo {
    db: MemoryDb,
}

impl MemoryUserRepo {
    pub fn new(db: MemoryDb) -> Self {
        MemoryUserRepo { db }
    }

    fn ensure_exists(db: &MemoryDb, user_id: UserId) -> Result<(), AuthError> {
        if db.with(|t| t.users.contains_key(&user_id))? {
            Ok(())
        } else {
            Err(AuthError::NotFound(format!("User {} not found", user_id)))
        }
    }
}

#[async_trait::async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_email_or_username(
        &self,
        email_or_username: &str,
    ) -> Result<Option<UserRecord>, AuthError> {
        self.db.with(|t| {
            t.users
                .values()
                .find(|u| u.email == email_or_username || u.username == email_or_username)
                .cloned()
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        self.db
            .with(|t| t.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, AuthError> {
        self.db.with(|t| t.users.get(&user_id).cloned())
    }

    async fn insert_if_absent(&self, user: &UserRecord) -> Result<bool, AuthError> {
        self.db.with(|t| {
            let taken = t.users.contains_key(&user.user_id)
                || t
                    .users
                    .values()
                    .any(|u| u.email == user.email || u.username == user.username);
            if taken {
                return false;
            }
            t.users.insert(user.user_id, user.clone());
            true
        })
    }

    async fn update_password_hash_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        user_id: UserId,
        password_hash: &str,
    ) -> Result<(), AuthError> {
        let tx = MemoryTx::from_dyn(tx)?;
        Self::ensure_exists(tx.db(), user_id)?;
        tx.stage(StagedWrite::SetPasswordHash {
            user_id,
            password_hash: password_hash.to_string(),
        });
        Ok(())
    }

    async fn update_status_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        user_id: UserId,
        status: UserStatus,
    ) -> Result<(), AuthError> {
        let tx = MemoryTx::from_dyn(tx)?;
        Self::ensure_exists(tx.db(), user_id)?;
        tx.stage(StagedWrite::SetStatus { user_id, status });
        Ok(())
    }
}
