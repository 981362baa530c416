use super::tx_mysql::MySqlTx;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

const SESSION_COLUMNS: &str = "token_id, token_hash, user_id, device_info, user_agent, \
     ip_address, is_revoked, revoked_at, expires_at, created_at, last_used_at";

pub struct MySqlSessionStore {
    pool: MySqlPool,
}

impl MySqlSessionStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlSessionStore { pool }
    }

    fn row_to_session(row: MySqlRow) -> Result<RefreshSession, AuthError> {
        let store = |e: sqlx::Error| AuthError::Store(e.to_string());

        Ok(RefreshSession {
            token_id: row.try_get("token_id").map_err(store)?,
            token_hash: row.try_get("token_hash").map_err(store)?,
            user_id: row.try_get("user_id").map_err(store)?,
            device_info: row.try_get("device_info").map_err(store)?,
            user_agent: row.try_get("user_agent").map_err(store)?,
            ip_address: row.try_get("ip_address").map_err(store)?,
            is_revoked: row.try_get("is_revoked").map_err(store)?,
            revoked_at: row.try_get("revoked_at").map_err(store)?,
            expires_at: row.try_get("expires_at").map_err(store)?,
            created_at: row.try_get("created_at").map_err(store)?,
            last_used_at: row.try_get("last_used_at").map_err(store)?,
        })
    }
}

#[async_trait::async_trait]
impl SessionStore for MySqlSessionStore {
    async fn create(&self, session: NewRefreshSession) -> Result<RefreshSession, AuthError> {
        let created = RefreshSession::from_new(session, Utc::now());

        sqlx::query(
            r#"
INSERT INTO refresh_session
    (token_id, token_hash, user_id, device_info, user_agent, ip_address,
     is_revoked, expires_at, created_at)
VALUES (?, ?, ?, ?, ?, ?, FALSE, ?, ?)
"#,
        )
        .bind(&created.token_id)
        .bind(&created.token_hash)
        .bind(created.user_id)
        .bind(&created.device_info)
        .bind(&created.user_agent)
        .bind(&created.ip_address)
        .bind(created.expires_at)
        .bind(created.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Store(format!("insert session: {e}")))?;

        Ok(created)
    }

    async fn find_active(
        &self,
        token_id: &str,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshSession>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(&format!(
            r#"
SELECT {SESSION_COLUMNS}
FROM refresh_session
WHERE token_id = ? AND user_id = ? AND is_revoked = FALSE AND expires_at > ?
"#
        ))
        .bind(token_id)
        .bind(user_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Store(format!("query session: {e}")))?;

        row_opt.map(Self::row_to_session).transpose()
    }

    async fn revoke(&self, token_id: &str, now: DateTime<Utc>) -> Result<bool, AuthError> {
        let result = sqlx::query(
            r#"
UPDATE refresh_session
SET is_revoked = TRUE, revoked_at = ?
WHERE token_id = ? AND is_revoked = FALSE
"#,
        )
        .bind(now)
        .bind(token_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Store(format!("revoke session: {e}")))?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke_all_for_user_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<u64, AuthError> {
        let conn = MySqlTx::connection(tx)?;

        let result = sqlx::query(
            r#"
UPDATE refresh_session
SET is_revoked = TRUE, revoked_at = ?
WHERE user_id = ? AND is_revoked = FALSE
"#,
        )
        .bind(now)
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AuthError::Store(format!("revoke user sessions: {e}")))?;

        Ok(result.rows_affected())
    }

    async fn touch_last_used(&self, token_id: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
        sqlx::query("UPDATE refresh_session SET last_used_at = ? WHERE token_id = ?")
            .bind(now)
            .bind(token_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Store(format!("touch session: {e}")))?;

        Ok(())
    }

    async fn list_active_for_user(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshSession>, AuthError> {
        let rows: Vec<MySqlRow> = sqlx::query(&format!(
            r#"
SELECT {SESSION_COLUMNS}
FROM refresh_session
WHERE user_id = ? AND is_revoked = FALSE AND expires_at > ?
ORDER BY created_at DESC
"#
        ))
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AuthError::Store(format!("list sessions: {e}")))?;

        rows.into_iter().map(Self::row_to_session).collect()
    }
}
