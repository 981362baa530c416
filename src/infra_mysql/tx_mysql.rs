use crate::application_port::AuthError;
use crate::domain_port::{StorageTx, TxManager, downcast_tx};
use sqlx::{MySql, MySqlConnection, MySqlPool, Transaction};
use std::any::Any;

pub struct MySqlTxManager {
    pool: MySqlPool,
}

impl MySqlTxManager {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlTxManager { pool }
    }
}

#[async_trait::async_trait]
impl TxManager for MySqlTxManager {
    async fn begin(&self) -> Result<Box<dyn StorageTx>, AuthError> {
        let inner = self
            .pool
            .begin()
            .await
            .map_err(|e| AuthError::Store(format!("begin transaction: {e}")))?;
        Ok(Box::new(MySqlTx { inner }))
    }
}

/// sqlx rolls the transaction back if this is dropped uncommitted.
pub struct MySqlTx {
    inner: Transaction<'static, MySql>,
}

impl MySqlTx {
    pub(crate) fn connection(tx: &mut dyn StorageTx) -> Result<&mut MySqlConnection, AuthError> {
        Ok(downcast_tx::<MySqlTx>(tx)?.inner.as_mut())
    }
}

#[async_trait::async_trait]
impl StorageTx for MySqlTx {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    async fn commit(self: Box<Self>) -> Result<(), AuthError> {
        self.inner
            .commit()
            .await
            .map_err(|e| AuthError::Store(format!("commit transaction: {e}")))
    }
}
