use crate::domain_model::UserId;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Request metadata recorded alongside a refresh session.
#[derive(Debug, Clone, Default)]
pub struct SessionInfo {
    pub device_info: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl SessionInfo {
    pub fn from_request(user_agent: Option<String>, ip_address: Option<String>) -> Self {
        SessionInfo {
            device_info: user_agent.as_deref().map(device_class).map(str::to_string),
            user_agent,
            ip_address,
        }
    }
}

fn device_class(user_agent: &str) -> &'static str {
    if user_agent.contains("Mobile") {
        "Mobile"
    } else if user_agent.contains("Tablet") {
        "Tablet"
    } else {
        "Desktop"
    }
}

#[derive(Debug, Clone)]
pub struct NewRefreshSession {
    pub token_id: String,
    pub token_hash: String,
    pub user_id: UserId,
    pub info: SessionInfo,
    pub expires_at: DateTime<Utc>,
}

/// One issued refresh token. `token_id` is the token's `jti`, never the token itself.
#[derive(Debug, Clone)]
pub struct RefreshSession {
    pub token_id: String,
    pub token_hash: String,
    pub user_id: UserId,
    pub device_info: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub is_revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl RefreshSession {
    pub fn from_new(new: NewRefreshSession, created_at: DateTime<Utc>) -> Self {
        RefreshSession {
            token_id: new.token_id,
            token_hash: new.token_hash,
            user_id: new.user_id,
            device_info: new.info.device_info,
            user_agent: new.info.user_agent,
            ip_address: new.info.ip_address,
            is_revoked: false,
            revoked_at: None,
            expires_at: new.expires_at,
            created_at,
            last_used_at: None,
        }
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked && self.expires_at > now
    }

    /// Revocation is one-way; a revoked session keeps its first `revoked_at`.
    pub fn revoke(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_revoked {
            return false;
        }
        self.is_revoked = true;
        self.revoked_at = Some(now);
        true
    }
}

/// Session listing entry; the token hash never leaves the store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub token_id: String,
    pub user_id: UserId,
    pub device_info: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<RefreshSession> for SessionSummary {
    fn from(session: RefreshSession) -> Self {
        SessionSummary {
            token_id: session.token_id,
            user_id: session.user_id,
            device_info: session.device_info,
            user_agent: session.user_agent,
            ip_address: session.ip_address,
            expires_at: session.expires_at,
            created_at: session.created_at,
            last_used_at: session.last_used_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_in: Duration) -> RefreshSession {
        let now = Utc::now();
        RefreshSession::from_new(
            NewRefreshSession {
                token_id: "jti".to_string(),
                token_hash: "hash".to_string(),
                user_id: UserId::new_random(),
                info: SessionInfo::default(),
                expires_at: now + expires_in,
            },
            now,
        )
    }

    #[test]
    fn usable_only_when_live_and_not_revoked() {
        let now = Utc::now();
        assert!(session(Duration::days(7)).is_usable(now));
        assert!(!session(Duration::seconds(-1)).is_usable(now));

        let mut revoked = session(Duration::days(7));
        assert!(revoked.revoke(now));
        assert!(!revoked.is_usable(now));
    }

    #[test]
    fn revoke_is_monotonic() {
        let first = Utc::now();
        let mut s = session(Duration::days(7));
        assert!(s.revoke(first));
        assert!(!s.revoke(first + Duration::minutes(5)));
        assert!(s.is_revoked);
        assert_eq!(s.revoked_at, Some(first));
    }

    #[test]
    fn device_class_from_user_agent() {
        let mobile = SessionInfo::from_request(Some("Foo Mobile Safari".into()), None);
        assert_eq!(mobile.device_info.as_deref(), Some("Mobile"));
        let tablet = SessionInfo::from_request(Some("Tablet; Android".into()), None);
        assert_eq!(tablet.device_info.as_deref(), Some("Tablet"));
        let desktop = SessionInfo::from_request(Some("Mozilla/5.0 (X11)".into()), None);
        assert_eq!(desktop.device_info.as_deref(), Some("Desktop"));
        assert!(SessionInfo::from_request(None, None).device_info.is_none());
    }
}
