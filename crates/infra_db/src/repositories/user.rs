//! User repository implementation
//!
//! Reads go through [`Connection::read_client`] and writes through
//! [`Connection::write_client`], so inside a unit of work both run on the
//! active transaction.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{FromRow, PgConnection};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{Context, PageId, UserId};
use domain_user::{Provider, User, UserError, UserRepository};

use crate::connection::Connection;
use crate::error::DatabaseError;

#[derive(Debug, Clone, FromRow)]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub uid: String,
    pub provider: String,
    pub email: Option<String>,
}

impl UserRow {
    pub(crate) fn into_user(self, joined_page_ids: Vec<PageId>) -> Result<User, UserError> {
        let provider: Provider = self.provider.parse()?;
        Ok(User::reconstruct(
            UserId::from(self.id),
            self.uid,
            provider,
            self.email,
            joined_page_ids,
        ))
    }
}

fn db_error(error: sqlx::Error) -> UserError {
    UserError::repository(DatabaseError::classify(error))
}

/// PostgreSQL-backed implementation of [`UserRepository`]
#[derive(Debug, Clone)]
pub struct PgUserRepository {
    conn: Arc<Connection>,
}

impl PgUserRepository {
    pub fn new(conn: Arc<Connection>) -> Self {
        Self { conn }
    }

    async fn load(
        conn: &mut PgConnection,
        row: Option<UserRow>,
    ) -> Result<Option<User>, UserError> {
        let Some(row) = row else {
            return Ok(None);
        };

        let joined: Vec<Uuid> = sqlx::query_scalar(
            "SELECT page_id FROM page_users WHERE user_id = $1 ORDER BY page_id",
        )
        .bind(row.id)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error)?;

        row.into_user(joined.into_iter().map(PageId::from).collect())
            .map(Some)
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    #[instrument(skip(self, ctx))]
    async fn get(&self, ctx: &Context, id: UserId) -> Result<Option<User>, UserError> {
        let mut conn = self
            .conn
            .read_client(ctx)
            .acquire()
            .await
            .map_err(UserError::repository)?;

        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, uid, provider, email FROM users WHERE id = $1")
                .bind(Uuid::from(id))
                .fetch_optional(&mut *conn)
                .await
                .map_err(db_error)?;

        Self::load(&mut conn, row).await
    }

    #[instrument(skip(self, ctx))]
    async fn get_by_uid(&self, ctx: &Context, uid: &str) -> Result<Option<User>, UserError> {
        let mut conn = self
            .conn
            .read_client(ctx)
            .acquire()
            .await
            .map_err(UserError::repository)?;

        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, uid, provider, email FROM users WHERE uid = $1")
                .bind(uid)
                .fetch_optional(&mut *conn)
                .await
                .map_err(db_error)?;

        Self::load(&mut conn, row).await
    }

    #[instrument(skip(self, ctx, user), fields(user_id = %user.id()))]
    async fn save(&self, ctx: &Context, user: &User) -> Result<(), UserError> {
        let mut conn = self
            .conn
            .write_client(ctx)
            .acquire()
            .await
            .map_err(UserError::repository)?;

        sqlx::query(
            r#"
            INSERT INTO users (id, uid, provider, email)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET provider = EXCLUDED.provider,
                email = EXCLUDED.email,
                updated_at = now()
            "#,
        )
        .bind(Uuid::from(user.id()))
        .bind(user.uid())
        .bind(user.provider().as_str())
        .bind(user.email())
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;

        debug!(transactional = conn.is_transaction(), "User saved");
        Ok(())
    }
}
