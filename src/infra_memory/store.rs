use crate::application_port::AuthError;
use crate::domain_model::*;
use crate::domain_port::{StorageTx, TxManager, downcast_tx};
use chrono::{DateTime, Utc};
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub(crate) struct MemoryTables {
    pub(crate) users: HashMap<UserId, UserRecord>,
    pub(crate) sessions: HashMap<String, RefreshSession>,
}

/// Shared process-local tables behind the in-memory user repo and session
/// store. Cloning shares the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryDb {
    tables: Arc<Mutex<MemoryTables>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut MemoryTables) -> R) -> Result<R, AuthError> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| AuthError::Store("memory store poisoned".to_string()))?;
        Ok(f(&mut tables))
    }
}

#[derive(Debug)]
pub(crate) enum StagedWrite {
    RevokeSessions { user_id: UserId, at: DateTime<Utc> },
    SetPasswordHash { user_id: UserId, password_hash: String },
    SetStatus { user_id: UserId, status: UserStatus },
}

impl StagedWrite {
    fn apply(self, tables: &mut MemoryTables) {
        match self {
            StagedWrite::RevokeSessions { user_id, at } => {
                for session in tables.sessions.values_mut() {
                    if session.user_id == user_id {
                        session.revoke(at);
                    }
                }
            }
            StagedWrite::SetPasswordHash {
                user_id,
                password_hash,
            } => {
                if let Some(user) = tables.users.get_mut(&user_id) {
                    user.password_hash = password_hash;
                }
            }
            StagedWrite::SetStatus { user_id, status } => {
                if let Some(user) = tables.users.get_mut(&user_id) {
                    user.status = status;
                }
            }
        }
    }
}

pub struct MemoryTxManager {
    db: MemoryDb,
}

impl MemoryTxManager {
    pub fn new(db: MemoryDb) -> Self {
        MemoryTxManager { db }
    }
}

#[async_trait::async_trait]
impl TxManager for MemoryTxManager {
    async fn begin(&self) -> Result<Box<dyn StorageTx>, AuthError> {
        Ok(Box::new(MemoryTx {
            db: self.db.clone(),
            staged: Vec::new(),
        }))
    }
}

/// Buffers writes and applies them under one lock on commit.
pub struct MemoryTx {
    db: MemoryDb,
    staged: Vec<StagedWrite>,
}

impl MemoryTx {
    pub(crate) fn from_dyn(tx: &mut dyn StorageTx) -> Result<&mut MemoryTx, AuthError> {
        downcast_tx::<MemoryTx>(tx)
    }

    pub(crate) fn stage(&mut self, write: StagedWrite) {
        self.staged.push(write);
    }

    pub(crate) fn db(&self) -> &MemoryDb {
        &self.db
    }
}

#[async_trait::async_trait]
impl StorageTx for MemoryTx {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    async fn commit(self: Box<Self>) -> Result<(), AuthError> {
        let MemoryTx { db, staged } = *self;
        db.with(|tables| {
            for write in staged {
                write.apply(tables);
            }
        })
    }
}
