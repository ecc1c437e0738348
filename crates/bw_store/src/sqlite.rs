//! SQLite session backend via sqlx.

use std::path::Path;

use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use tracing::debug;

use crate::{
    error::StoreError,
    models::{Session, SessionRow},
    session::SessionStore,
};

const SELECT_SESSION: &str = "SELECT id, user_id, access_token, refresh_token, ikm, expires_at, \
     box_secret_key, box_public_key, sign_secret_key, sign_public_key, client_public_key \
     FROM sessions";

/// Cheap to clone (the pool is Arc internally).
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Open (or create) the database at `db_path` and run pending migrations.
    ///
    /// WAL is set on the connection options.  SQLite refuses to change
    /// `journal_mode` inside a transaction and every migration runs in one.
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        Self::migrate(&pool).await?;
        debug!(path = %db_path.display(), "session database ready");
        Ok(Self { pool })
    }

    /// Private in-memory database.  One connection, or each would see its own empty db.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn insert(&self, session: Session) -> Result<(), StoreError> {
        let Session { token, keys } = session;
        sqlx::query(
            "INSERT INTO sessions (id, user_id, access_token, refresh_token, ikm, expires_at, \
             box_secret_key, box_public_key, sign_secret_key, sign_public_key, client_public_key) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(token.access_token)
        .bind(token.refresh_token)
        .bind(token.ikm)
        .bind(token.expires_at)
        .bind(keys.box_secret_key)
        .bind(keys.box_public_key)
        .bind(keys.sign_secret_key)
        .bind(keys.sign_public_key)
        .bind(keys.client_public_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let row: Option<SessionRow> = sqlx::query_as(&format!("{SELECT_SESSION} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Session::from))
    }

    async fn find_by_access_token(&self, access_token: &str) -> Result<Option<Session>, StoreError> {
        let row: Option<SessionRow> =
            sqlx::query_as(&format!("{SELECT_SESSION} WHERE access_token = ?"))
                .bind(access_token)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Session::from))
    }

    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<Session>, StoreError> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "{SELECT_SESSION} WHERE user_id = ? ORDER BY expires_at ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Session::from).collect())
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        let done = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn delete_by_user_id(&self, user_id: &str) -> Result<u64, StoreError> {
        let done = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }

    async fn set_client_public_key(
        &self,
        id: &str,
        client_public_key: Option<String>,
    ) -> Result<bool, StoreError> {
        let done = sqlx::query("UPDATE sessions SET client_public_key = ? WHERE id = ?")
            .bind(client_public_key)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}
