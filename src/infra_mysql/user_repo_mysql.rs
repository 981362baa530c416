use super::tx_mysql::MySqlTx;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::{MySqlDatabaseError, MySqlRow};
use sqlx::{MySqlPool, Row};

/// MySQL `ER_DUP_ENTRY`: the email or username unique key is taken.
const ER_DUP_ENTRY: u16 = 1062;

fn is_duplicate_user(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db
            .try_downcast_ref::<MySqlDatabaseError>()
            .is_some_and(|e| e.number() == ER_DUP_ENTRY),
        _ => false,
    }
}

const USER_COLUMNS: &str = "user_id, username, email, password_hash, status, role, created_at";

pub struct MySqlUserRepo {
    pool: MySqlPool,
}

impl MySqlUserRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlUserRepo { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<UserRecord, AuthError> {
        let store = |e: sqlx::Error| AuthError::Store(e.to_string());

        let user_id: UserId = row.try_get("user_id").map_err(store)?;
        let username: String = row.try_get("username").map_err(store)?;
        let email: String = row.try_get("email").map_err(store)?;
        let password_hash: String = row.try_get("password_hash").map_err(store)?;
        let status: String = row.try_get("status").map_err(store)?;
        let role: String = row.try_get("role").map_err(store)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(store)?;

        Ok(UserRecord {
            user_id,
            username,
            email,
            password_hash,
            status: status
                .parse()
                .map_err(|e: UnknownVariant| AuthError::Store(e.to_string()))?,
            role: role
                .parse()
                .map_err(|e: UnknownVariant| AuthError::Store(e.to_string()))?,
            created_at,
        })
    }

    fn expect_one_row(rows: u64, user_id: UserId) -> Result<(), AuthError> {
        if rows == 0 {
            return Err(AuthError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserRepo for MySqlUserRepo {
    async fn find_by_email_or_username(
        &self,
        email_or_username: &str,
    ) -> Result<Option<UserRecord>, AuthError> {
        // BINARY comparison keeps the match case-sensitive under any collation.
        let row_opt: Option<MySqlRow> = sqlx::query(&format!(
            r#"
SELECT {USER_COLUMNS}
FROM user
WHERE BINARY email = ? OR BINARY username = ?
LIMIT 1
"#
        ))
        .bind(email_or_username)
        .bind(email_or_username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        let row_opt: Option<MySqlRow> =
            sqlx::query(&format!("SELECT {USER_COLUMNS} FROM user WHERE BINARY email = ?"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AuthError::Store(format!("query user by email: {e}")))?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, AuthError> {
        let row_opt: Option<MySqlRow> =
            sqlx::query(&format!("SELECT {USER_COLUMNS} FROM user WHERE user_id = ?"))
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AuthError::Store(format!("query user by id: {e}")))?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn insert_if_absent(&self, user: &UserRecord) -> Result<bool, AuthError> {
        let result = sqlx::query(
            r#"
INSERT INTO user (user_id, username, email, password_hash, status, role, created_at)
VALUES (?, ?, ?, ?, ?, ?, ?)
"#,
        )
        .bind(user.user_id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.status.as_str())
        .bind(user.role.as_str())
        .bind(user.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_user(&e) => Ok(false),
            Err(e) => Err(AuthError::Store(e.to_string())),
        }
    }

    async fn update_password_hash_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        user_id: UserId,
        password_hash: &str,
    ) -> Result<(), AuthError> {
        let conn = MySqlTx::connection(tx)?;

        let result = sqlx::query("UPDATE user SET password_hash = ? WHERE user_id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| AuthError::Store(format!("update password: {e}")))?;

        Self::expect_one_row(result.rows_affected(), user_id)
    }

    async fn update_status_in_tx(
        &self,
        tx: &mut dyn StorageTx,
        user_id: UserId,
        status: UserStatus,
    ) -> Result<(), AuthError> {
        let conn = MySqlTx::connection(tx)?;

        let result = sqlx::query("UPDATE user SET status = ? WHERE user_id = ?")
            .bind(status.as_str())
            .bind(user_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| AuthError::Store(format!("update status: {e}")))?;

        Self::expect_one_row(result.rows_affected(), user_id)
    }
}
