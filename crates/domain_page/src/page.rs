//! The page aggregate

use core_kernel::PageId;
use domain_user::User;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::PageError;
use crate::link::{Link, Links};

pub const MAX_TITLE_LENGTH: usize = 50;
pub const INVITE_CODE_LENGTH: usize = 8;
pub const INVITE_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    id: PageId,
    title: String,
    created_by: User,
    invite_code: String,
    links: Links,
    invited_users: Vec<User>,
}

impl Page {
    /// Creates an empty page owned by `created_by` with a fresh invite code
    pub fn new(title: impl Into<String>, created_by: &User) -> Result<Self, PageError> {
        let title = title.into();
        validate_title(&title)?;

        Ok(Self {
            id: PageId::new(),
            title,
            created_by: created_by.clone(),
            invite_code: generate_invite_code(),
            links: Links::default(),
            invited_users: Vec::new(),
        })
    }

    /// Rebuilds a page from stored fields
    pub fn reconstruct(
        id: PageId,
        title: impl Into<String>,
        created_by: User,
        invite_code: impl Into<String>,
        links: Links,
        invited_users: Vec<User>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            created_by,
            invite_code: invite_code.into(),
            links,
            invited_users,
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn created_by(&self) -> &User {
        &self.created_by
    }

    pub fn invite_code(&self) -> &str {
        &self.invite_code
    }

    pub fn links(&self) -> &Links {
        &self.links
    }

    pub fn invited_users(&self) -> &[User] {
        &self.invited_users
    }

    /// Checks that `user` is the creator or an invited user
    pub fn authorize(&self, user: &User) -> Result<(), PageError> {
        if self.is_invited(user) || self.created_by.id() == user.id() {
            return Ok(());
        }
        Err(PageError::NotCreatedByUser)
    }

    /// Renames the page and replaces its links with a reordering of them
    pub fn edit(&mut self, user: &User, title: &str, links: Vec<Link>) -> Result<(), PageError> {
        self.authorize(user)?;
        validate_title(title)?;
        self.links.edit(links)?;
        self.title = title.to_string();
        Ok(())
    }

    pub fn add_link(&mut self, user: &User, url: &str, memo: &str) -> Result<(), PageError> {
        self.authorize(user)?;
        self.links.add(url, memo);
        Ok(())
    }

    pub fn remove_link(&mut self, user: &User, url: &str) -> Result<(), PageError> {
        self.authorize(user)?;
        self.links.remove(url)
    }

    /// Adds `user` to the invited users if `invite_code` matches
    pub fn join(&mut self, user: &User, invite_code: &str) -> Result<(), PageError> {
        if invite_code != self.invite_code {
            return Err(PageError::InvalidInviteCode);
        }
        if self.created_by.id() == user.id() {
            return Err(PageError::CreatorCannotJoin);
        }
        if self.is_invited(user) {
            return Err(PageError::AlreadyJoined);
        }

        self.invited_users.push(user.clone());
        Ok(())
    }

    fn is_invited(&self, user: &User) -> bool {
        self.invited_users.iter().any(|u| u.id() == user.id())
    }
}

fn validate_title(title: &str) -> Result<(), PageError> {
    if title.is_empty() {
        return Err(PageError::NoTitleProvided);
    }
    let length = title.chars().count();
    if length > MAX_TITLE_LENGTH {
        return Err(PageError::TitleTooLong {
            length,
            max: MAX_TITLE_LENGTH,
        });
    }
    Ok(())
}

fn generate_invite_code() -> String {
    let mut rng = rand::thread_rng();
    (0..INVITE_CODE_LENGTH)
        .map(|_| char::from(INVITE_CODE_ALPHABET[rng.gen_range(0..INVITE_CODE_ALPHABET.len())]))
        .collect()
}
