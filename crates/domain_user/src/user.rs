//! The user aggregate

use std::fmt;
use std::str::FromStr;

use core_kernel::{PageId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::UserError;

/// Identity provider a user signed in with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anonymous,
    Google,
    Facebook,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Anonymous => "anonymous",
            Provider::Google => "google",
            Provider::Facebook => "facebook",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = UserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anonymous" => Ok(Provider::Anonymous),
            "google" => Ok(Provider::Google),
            "facebook" => Ok(Provider::Facebook),
            other => Err(UserError::InvalidProvider(other.to_string())),
        }
    }
}

/// A user of the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    uid: String,
    provider: Provider,
    email: Option<String>,
    joined_page_ids: Vec<PageId>,
}

impl User {
    /// Creates a new anonymous user for an identity-provider uid
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            uid: uid.into(),
            provider: Provider::Anonymous,
            email: None,
            joined_page_ids: Vec::new(),
        }
    }

    /// Rebuilds a user from stored fields
    pub fn reconstruct(
        id: UserId,
        uid: impl Into<String>,
        provider: Provider,
        email: Option<String>,
        joined_page_ids: Vec<PageId>,
    ) -> Self {
        Self {
            id,
            uid: uid.into(),
            provider,
            email,
            joined_page_ids,
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Pages this user was invited to
    pub fn joined_page_ids(&self) -> &[PageId] {
        &self.joined_page_ids
    }

    /// Links an anonymous user to an identity provider
    ///
    /// # Errors
    ///
    /// - `NoSpecifiedEmail` when `email` is missing
    /// - `InvalidProvider` for an unknown provider name
    /// - `AlreadyLoggedIn` when the user already logged in once
    pub fn login(&mut self, provider: &str, email: Option<String>) -> Result<(), UserError> {
        let email = email.ok_or(UserError::NoSpecifiedEmail)?;
        let provider: Provider = provider.parse()?;

        if self.provider != Provider::Anonymous {
            return Err(UserError::AlreadyLoggedIn(self.provider));
        }

        self.provider = provider;
        self.email = Some(email);
        Ok(())
    }
}
