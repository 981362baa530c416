use crate::domain_model::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cached state of one password-reset handshake. Stored under the
/// deterministic digest of the raw token; expiry of the cache entry is the
/// only way a ticket ages out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetTicket {
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}
