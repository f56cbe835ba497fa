//! Page repository implementation
//!
//! A page is stored across `pages`, `link_items` and `page_users`. `save`
//! rewrites all three in its own unit of work, which becomes a savepoint when
//! the caller already runs one.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{Context, LinkItemId, PageId, TransactionService};
use domain_page::{Link, Links, Page, PageError, PageQuery, PageRepository};
use domain_user::User;

use crate::connection::Connection;
use crate::error::DatabaseError;
use crate::repositories::user::UserRow;

const PAGE_COLUMNS: &str = r#"
    SELECT p.id, p.title, p.invite_code,
           u.id AS creator_id, u.uid AS creator_uid,
           u.provider AS creator_provider, u.email AS creator_email
    FROM pages p
    JOIN users u ON u.id = p.creator_id
"#;

#[derive(Debug, Clone, FromRow)]
struct PageRow {
    id: Uuid,
    title: String,
    invite_code: String,
    creator_id: Uuid,
    creator_uid: String,
    creator_provider: String,
    creator_email: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
struct LinkItemRow {
    url: String,
    memo: String,
    priority: i32,
}

fn db_error(error: sqlx::Error) -> PageError {
    PageError::repository(DatabaseError::classify(error))
}

/// PostgreSQL-backed implementation of [`PageRepository`]
#[derive(Debug, Clone)]
pub struct PgPageRepository {
    conn: Arc<Connection>,
}

impl PgPageRepository {
    pub fn new(conn: Arc<Connection>) -> Self {
        Self { conn }
    }

    /// Loads links and invited users for a page row
    async fn hydrate(conn: &mut PgConnection, row: PageRow) -> Result<Page, PageError> {
        let links: Vec<LinkItemRow> = sqlx::query_as(
            r#"
            SELECT url, COALESCE(memo, '') AS memo, priority
            FROM link_items
            WHERE page_id = $1
            ORDER BY priority, id
            "#,
        )
        .bind(row.id)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error)?;

        let invited: Vec<UserRow> = sqlx::query_as(
            r#"
            SELECT u.id, u.uid, u.provider, u.email
            FROM page_users pu
            JOIN users u ON u.id = pu.user_id
            WHERE pu.page_id = $1
            ORDER BY u.id
            "#,
        )
        .bind(row.id)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error)?;

        let creator = UserRow {
            id: row.creator_id,
            uid: row.creator_uid,
            provider: row.creator_provider,
            email: row.creator_email,
        }
        .into_user(Vec::new())?;

        let invited_users = invited
            .into_iter()
            .map(|user| user.into_user(Vec::new()))
            .collect::<Result<Vec<User>, _>>()?;

        let links = links
            .into_iter()
            .map(|l| Link::new(l.url, l.memo, l.priority))
            .collect();

        Ok(Page::reconstruct(
            PageId::from(row.id),
            row.title,
            creator,
            row.invite_code,
            Links::new(links),
            invited_users,
        ))
    }

    async fn write(&self, ctx: &Context, page: &Page) -> Result<(), PageError> {
        let mut conn = self
            .conn
            .write_client(ctx)
            .acquire()
            .await
            .map_err(PageError::repository)?;
        let page_id = Uuid::from(page.id());

        sqlx::query(
            r#"
            INSERT INTO pages (id, title, creator_id, invite_code)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET title = EXCLUDED.title,
                updated_at = now()
            "#,
        )
        .bind(page_id)
        .bind(page.title())
        .bind(Uuid::from(page.created_by().id()))
        .bind(page.invite_code())
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;

        sqlx::query("DELETE FROM link_items WHERE page_id = $1")
            .bind(page_id)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;

        for link in page.links().iter() {
            let memo = Some(link.memo()).filter(|m| !m.is_empty());
            sqlx::query(
                r#"
                INSERT INTO link_items (id, page_id, url, memo, priority)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::from(LinkItemId::new()))
            .bind(page_id)
            .bind(link.url())
            .bind(memo)
            .bind(link.priority())
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
        }

        sqlx::query("DELETE FROM page_users WHERE page_id = $1")
            .bind(page_id)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;

        for user in page.invited_users() {
            sqlx::query("INSERT INTO page_users (page_id, user_id) VALUES ($1, $2)")
                .bind(page_id)
                .bind(Uuid::from(user.id()))
                .execute(&mut *conn)
                .await
                .map_err(db_error)?;
        }

        debug!(
            links = page.links().len(),
            invited = page.invited_users().len(),
            "Page saved"
        );
        Ok(())
    }
}

#[async_trait]
impl PageRepository for PgPageRepository {
    #[instrument(skip(self, ctx))]
    async fn get(&self, ctx: &Context, id: PageId) -> Result<Option<Page>, PageError> {
        let mut conn = self
            .conn
            .read_client(ctx)
            .acquire()
            .await
            .map_err(PageError::repository)?;

        let row: Option<PageRow> = sqlx::query_as(&format!("{PAGE_COLUMNS} WHERE p.id = $1"))
            .bind(Uuid::from(id))
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_error)?;

        match row {
            Some(row) => Self::hydrate(&mut conn, row).await.map(Some),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, ctx))]
    async fn list(&self, ctx: &Context, query: &PageQuery) -> Result<Vec<Page>, PageError> {
        let mut conn = self
            .conn
            .read_client(ctx)
            .acquire()
            .await
            .map_err(PageError::repository)?;

        let mut builder = QueryBuilder::<Postgres>::new(PAGE_COLUMNS);
        builder.push(" WHERE TRUE");
        if !query.ids.is_empty() {
            let ids: Vec<Uuid> = query.ids.iter().map(|id| Uuid::from(*id)).collect();
            builder.push(" AND p.id = ANY(").push_bind(ids).push(")");
        }
        if let Some(creator) = query.created_by {
            builder
                .push(" AND p.creator_id = ")
                .push_bind(Uuid::from(creator));
        }
        builder.push(" ORDER BY p.id");
        if let Some((offset, limit)) = query.window() {
            builder
                .push(" OFFSET ")
                .push_bind(i64::try_from(offset).unwrap_or(i64::MAX))
                .push(" LIMIT ")
                .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows: Vec<PageRow> = builder
            .build_query_as()
            .fetch_all(&mut *conn)
            .await
            .map_err(db_error)?;

        let mut pages = Vec::with_capacity(rows.len());
        for row in rows {
            pages.push(Self::hydrate(&mut conn, row).await?);
        }
        Ok(pages)
    }

    #[instrument(skip(self, ctx, page), fields(page_id = %page.id()))]
    async fn save(&self, ctx: &Context, page: &Page) -> Result<(), PageError> {
        self.conn
            .run_in_transaction(ctx, |ctx| async move { self.write(&ctx, page).await })
            .await?;
        Ok(())
    }

    #[instrument(skip(self, ctx))]
    async fn delete(&self, ctx: &Context, id: PageId) -> Result<(), PageError> {
        let mut conn = self
            .conn
            .write_client(ctx)
            .acquire()
            .await
            .map_err(PageError::repository)?;

        sqlx::query("DELETE FROM pages WHERE id = $1")
            .bind(Uuid::from(id))
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
        Ok(())
    }
}
