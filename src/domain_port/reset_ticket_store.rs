use crate::application_port::*;
use crate::domain_model::*;
use std::time::Duration;

/// Time-expiring cache for reset tickets. An entry past its TTL must read as
/// absent; there is no separate cleanup.
#[async_trait::async_trait]
pub trait ResetTicketStore: Send + Sync {
    async fn put(&self, digest: &str, ticket: &ResetTicket, ttl: Duration)
    -> Result<(), AuthError>;
    async fn get(&self, digest: &str) -> Result<Option<ResetTicket>, AuthError>;

    /// Atomically removes and returns a live ticket with the TTL it had left.
    /// Of two concurrent callers at most one gets `Some`.
    async fn take(&self, digest: &str) -> Result<Option<(ResetTicket, Duration)>, AuthError>;
}
