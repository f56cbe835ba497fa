//! Ordered links of a page
//!
//! Priorities order the links of a page. New links are appended with the
//! current link count as priority; removing or reordering links renumbers the
//! remaining ones from 1.

use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::error::PageError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    url: String,
    memo: String,
    priority: i32,
}

impl Link {
    pub fn new(url: impl Into<String>, memo: impl Into<String>, priority: i32) -> Self {
        Self {
            url: url.into(),
            memo: memo.into(),
            priority,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn memo(&self) -> &str {
        &self.memo
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Links(Vec<Link>);

impl Links {
    pub fn new(links: Vec<Link>) -> Self {
        Self(links)
    }

    pub fn into_vec(self) -> Vec<Link> {
        self.0
    }

    pub(crate) fn add(&mut self, url: &str, memo: &str) {
        let priority = i32::try_from(self.0.len()).unwrap_or(i32::MAX);
        self.0.push(Link::new(url, memo, priority));
    }

    pub(crate) fn remove(&mut self, url: &str) -> Result<(), PageError> {
        let index = self.index_of(url)?;
        self.0.remove(index);
        self.renumber();
        Ok(())
    }

    /// Replaces the links with `links`, which must hold exactly the same URLs
    ///
    /// The new order follows the given priorities; memos are taken from `links`.
    pub(crate) fn edit(&mut self, mut links: Vec<Link>) -> Result<(), PageError> {
        if links.len() != self.0.len() {
            return Err(PageError::InvalidLinksLength);
        }
        links.sort_by_key(|link| link.priority);
        for link in &links {
            self.index_of(&link.url)?;
        }

        self.0 = links;
        self.renumber();
        Ok(())
    }

    fn renumber(&mut self) {
        for (priority, link) in (1..).zip(self.0.iter_mut()) {
            link.priority = priority;
        }
    }

    fn index_of(&self, url: &str) -> Result<usize, PageError> {
        self.0
            .iter()
            .position(|link| link.url == url)
            .ok_or_else(|| PageError::LinkNotFound(url.to_string()))
    }
}

impl Deref for Links {
    type Target = [Link];

    fn deref(&self) -> &[Link] {
        &self.0
    }
}
