//! Page use cases
//!
//! Every mutation loads the page, applies the aggregate rule and saves it
//! inside one unit of work, so a caller already in a transaction gets it
//! folded into a savepoint.

use std::sync::Arc;

use core_kernel::{Context, PageId, TransactionService};
use domain_user::{user_from_context, User};
use tracing::{debug, info, instrument};

use crate::error::PageError;
use crate::link::Link;
use crate::page::Page;
use crate::ports::{PageQuery, PageRepository};

pub struct PageService<T> {
    pages: Arc<dyn PageRepository>,
    txn: Arc<T>,
}

impl<T: TransactionService> PageService<T> {
    pub fn new(pages: Arc<dyn PageRepository>, txn: Arc<T>) -> Self {
        Self { pages, txn }
    }

    /// Creates a page owned by the request's user
    #[instrument(skip(self, ctx))]
    pub async fn create(&self, ctx: &Context, title: &str) -> Result<Page, PageError> {
        let user = current_user(ctx)?;
        let page = Page::new(title, user)?;
        info!(page_id = %page.id(), "Creating page");

        let page = self
            .txn
            .run_in_transaction(ctx, |ctx| async move {
                self.pages.save(&ctx, &page).await?;
                Ok::<_, PageError>(page)
            })
            .await?;
        Ok(page)
    }

    #[instrument(skip(self, ctx))]
    pub async fn get(&self, ctx: &Context, id: PageId) -> Result<Page, PageError> {
        current_user(ctx)?;
        self.load(ctx, id).await
    }

    /// Lists the request user's own pages, narrowed by `query`
    #[instrument(skip(self, ctx))]
    pub async fn list(&self, ctx: &Context, query: PageQuery) -> Result<Vec<Page>, PageError> {
        let user = current_user(ctx)?;
        let query = query.created_by(user.id());
        self.pages.list(ctx, &query).await
    }

    #[instrument(skip(self, ctx, links))]
    pub async fn edit(
        &self,
        ctx: &Context,
        id: PageId,
        title: &str,
        links: Vec<Link>,
    ) -> Result<Page, PageError> {
        self.update(ctx, id, move |page, user| page.edit(user, title, links))
            .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn delete(&self, ctx: &Context, id: PageId) -> Result<(), PageError> {
        let user = current_user(ctx)?.clone();

        self.txn
            .run_in_transaction(ctx, |ctx| async move {
                let page = self.load(&ctx, id).await?;
                page.authorize(&user)?;
                self.pages.delete(&ctx, id).await?;
                Ok::<_, PageError>(())
            })
            .await?;
        Ok(())
    }

    /// Joins the request's user to a page using its invite code
    #[instrument(skip(self, ctx, invite_code))]
    pub async fn join(&self, ctx: &Context, id: PageId, invite_code: &str) -> Result<Page, PageError> {
        self.update(ctx, id, move |page, user| page.join(user, invite_code))
            .await
    }

    #[instrument(skip(self, ctx, memo))]
    pub async fn add_link(
        &self,
        ctx: &Context,
        id: PageId,
        url: &str,
        memo: &str,
    ) -> Result<Page, PageError> {
        self.update(ctx, id, move |page, user| page.add_link(user, url, memo))
            .await
    }

    #[instrument(skip(self, ctx))]
    pub async fn remove_link(&self, ctx: &Context, id: PageId, url: &str) -> Result<Page, PageError> {
        self.update(ctx, id, move |page, user| page.remove_link(user, url))
            .await
    }

    async fn load(&self, ctx: &Context, id: PageId) -> Result<Page, PageError> {
        self.pages
            .get(ctx, id)
            .await?
            .ok_or(PageError::PageNotFound)
    }

    /// Loads, mutates and saves a page in one unit of work
    async fn update<F>(&self, ctx: &Context, id: PageId, mutate: F) -> Result<Page, PageError>
    where
        F: FnOnce(&mut Page, &User) -> Result<(), PageError> + Send,
    {
        let user = current_user(ctx)?.clone();

        let page = self
            .txn
            .run_in_transaction(ctx, |ctx| async move {
                let mut page = self.load(&ctx, id).await?;
                mutate(&mut page, &user)?;
                debug!(page_id = %id, links = page.links().len(), "Saving page");
                self.pages.save(&ctx, &page).await?;
                Ok::<_, PageError>(page)
            })
            .await?;
        Ok(page)
    }
}

fn current_user(ctx: &Context) -> Result<&User, PageError> {
    user_from_context(ctx).ok_or(PageError::UserNotFound)
}
