use crate::application_port::AuthError;
use std::any::Any;

/// Opens a unit of work over the user and session tables. Repos take the
/// handle in their `*_in_tx` methods; dropping it without `commit` discards
/// every write made through it.
#[async_trait::async_trait]
pub trait TxManager: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StorageTx>, AuthError>;
}

#[async_trait::async_trait]
pub trait StorageTx: Any + Send {
    /// Lets an adapter recover its own handle type.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    async fn commit(self: Box<Self>) -> Result<(), AuthError>;
}

/// Recovers the adapter's concrete handle. A handle from another backend is a
/// wiring mistake and surfaces as an internal error.
pub fn downcast_tx<T: StorageTx>(tx: &mut dyn StorageTx) -> Result<&mut T, AuthError> {
    tx.as_any_mut()
        .downcast_mut::<T>()
        .ok_or_else(|| AuthError::InternalError("transaction handle from another backend".into()))
}
