use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

/// TTL cache on the tokio clock, so paused-time tests can age tickets out.
#[derive(Default)]
pub struct MemoryResetTicketStore {
    entries: DashMap<String, (ResetTicket, Instant)>,
}

impl MemoryResetTicketStore {
    pub fn new() -> Self {
        MemoryResetTicketStore {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl ResetTicketStore for MemoryResetTicketStore {
    async fn put(
        &self,
        digest: &str,
        ticket: &ResetTicket,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        self.entries
            .insert(digest.to_string(), (ticket.clone(), Instant::now() + ttl));
        Ok(())
    }

    async fn get(&self, digest: &str) -> Result<Option<ResetTicket>, AuthError> {
        let now = Instant::now();
        // Expired entries are dropped on read.
        self.entries.remove_if(digest, |_, (_, deadline)| *deadline <= now);
        Ok(self.entries.get(digest).map(|entry| entry.0.clone()))
    }

    async fn take(&self, digest: &str) -> Result<Option<(ResetTicket, Duration)>, AuthError> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(digest)
            .filter(|(_, (_, deadline))| *deadline > now)
            .map(|(_, (ticket, deadline))| (ticket, deadline - now)))
    }
}
