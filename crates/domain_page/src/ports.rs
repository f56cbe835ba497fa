//! Storage port for pages

use async_trait::async_trait;
use core_kernel::{Context, PageId, UserId};

use crate::error::PageError;
use crate::page::Page;

/// Filters for [`PageRepository::list`]
///
/// Empty filters match every page. Results are ordered by page id, which
/// follows creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageQuery {
    pub ids: Vec<PageId>,
    pub created_by: Option<UserId>,
    /// 1-based page number; ignored unless `page_size` is set
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(mut self, ids: Vec<PageId>) -> Self {
        self.ids = ids;
        self
    }

    pub fn created_by(mut self, user: UserId) -> Self {
        self.created_by = Some(user);
        self
    }

    pub fn paginate(mut self, page: u32, page_size: u32) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    /// Row offset and limit, when paginated
    pub fn window(&self) -> Option<(u64, u64)> {
        let size = u64::from(self.page_size.filter(|s| *s > 0)?);
        let page = u64::from(self.page.unwrap_or(1).max(1));
        Some(((page - 1) * size, size))
    }

    /// Returns true if `page` passes the id and creator filters
    pub fn matches(&self, page: &Page) -> bool {
        (self.ids.is_empty() || self.ids.contains(&page.id()))
            && self.created_by.map_or(true, |id| page.created_by().id() == id)
    }
}

/// Persistence for [`Page`]s
///
/// Every method takes the request context so that calls made inside a unit of
/// work run in its transaction.
#[async_trait]
pub trait PageRepository: Send + Sync {
    async fn get(&self, ctx: &Context, id: PageId) -> Result<Option<Page>, PageError>;

    async fn list(&self, ctx: &Context, query: &PageQuery) -> Result<Vec<Page>, PageError>;

    /// Inserts or updates the page together with its links and invited users
    async fn save(&self, ctx: &Context, page: &Page) -> Result<(), PageError>;

    async fn delete(&self, ctx: &Context, id: PageId) -> Result<(), PageError>;
}

/// In-memory implementation of PageRepository for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    #[derive(Debug, Default)]
    pub struct MockPageRepository {
        pages: Arc<RwLock<BTreeMap<PageId, Page>>>,
    }

    impl MockPageRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates with pages for testing
        pub async fn with_pages(pages: Vec<Page>) -> Self {
            let repo = Self::new();
            for page in pages {
                repo.pages.write().await.insert(page.id(), page);
            }
            repo
        }

        pub async fn count(&self) -> usize {
            self.pages.read().await.len()
        }
    }

    #[async_trait]
    impl PageRepository for MockPageRepository {
        async fn get(&self, _ctx: &Context, id: PageId) -> Result<Option<Page>, PageError> {
            Ok(self.pages.read().await.get(&id).cloned())
        }

        async fn list(&self, _ctx: &Context, query: &PageQuery) -> Result<Vec<Page>, PageError> {
            let pages = self.pages.read().await;
            let matching = pages.values().filter(|p| query.matches(p)).cloned();
            Ok(match query.window() {
                Some((offset, limit)) => matching
                    .skip(offset as usize)
                    .take(limit as usize)
                    .collect(),
                None => matching.collect(),
            })
        }

        async fn save(&self, _ctx: &Context, page: &Page) -> Result<(), PageError> {
            self.pages.write().await.insert(page.id(), page.clone());
            Ok(())
        }

        async fn delete(&self, _ctx: &Context, id: PageId) -> Result<(), PageError> {
            self.pages.write().await.remove(&id);
            Ok(())
        }
    }
}
