use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

/// Tickets live as JSON strings under `<prefix>:<digest>`; Redis `EX` does the expiry.
pub struct RedisResetTicketStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisResetTicketStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisResetTicketStore {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, digest: &str) -> String {
        format!("{}:{}", self.prefix, digest)
    }
}

#[async_trait::async_trait]
impl ResetTicketStore for RedisResetTicketStore {
    async fn put(
        &self,
        digest: &str,
        ticket: &ResetTicket,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        let key = self.key(digest);
        let value =
            serde_json::to_string(ticket).map_err(|e| AuthError::InternalError(e.to_string()))?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(&key, value, ttl.as_secs().max(1))
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, digest: &str) -> Result<Option<ResetTicket>, AuthError> {
        let key = self.key(digest);
        let mut conn = self.conn.clone();
        let val: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        val.map(|s| {
            serde_json::from_str::<ResetTicket>(&s).map_err(|e| AuthError::Store(e.to_string()))
        })
        .transpose()
    }

    async fn take(&self, digest: &str) -> Result<Option<(ResetTicket, Duration)>, AuthError> {
        let key = self.key(digest);
        let mut conn = self.conn.clone();
        // PTTL and GETDEL in one MULTI so no other client sees the key in between.
        let (pttl, val): (i64, Option<String>) = redis::pipe()
            .atomic()
            .cmd("PTTL")
            .arg(&key)
            .cmd("GETDEL")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        let Some(s) = val else {
            return Ok(None);
        };
        let ticket =
            serde_json::from_str::<ResetTicket>(&s).map_err(|e| AuthError::Store(e.to_string()))?;
        // Negative PTTL (no expiry) maps to one second.
        let remaining = Duration::from_millis(u64::try_from(pttl).unwrap_or(1000).max(1));
        Ok(Some((ticket, remaining)))
    }
}
