//! Storage port for users

use async_trait::async_trait;
use core_kernel::{Context, UserId};

use crate::error::UserError;
use crate::user::User;

/// Persistence for [`User`]s
///
/// Every method takes the request context so that calls made inside a unit of
/// work run in its transaction.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, ctx: &Context, id: UserId) -> Result<Option<User>, UserError>;

    async fn get_by_uid(&self, ctx: &Context, uid: &str) -> Result<Option<User>, UserError>;

    /// Inserts a new user or updates an existing one
    async fn save(&self, ctx: &Context, user: &User) -> Result<(), UserError>;
}

/// In-memory implementation of UserRepository for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    #[derive(Debug, Default)]
    pub struct MockUserRepository {
        users: Arc<RwLock<HashMap<UserId, User>>>,
    }

    impl MockUserRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates with users for testing
        pub async fn with_users(users: Vec<User>) -> Self {
            let repo = Self::new();
            for user in users {
                repo.users.write().await.insert(user.id(), user);
            }
            repo
        }

        pub async fn count(&self) -> usize {
            self.users.read().await.len()
        }
    }

    #[async_trait]
    impl UserRepository for MockUserRepository {
        async fn get(&self, _ctx: &Context, id: UserId) -> Result<Option<User>, UserError> {
            Ok(self.users.read().await.get(&id).cloned())
        }

        async fn get_by_uid(&self, _ctx: &Context, uid: &str) -> Result<Option<User>, UserError> {
            Ok(self
                .users
                .read()
                .await
                .values()
                .find(|u| u.uid() == uid)
                .cloned())
        }

        async fn save(&self, _ctx: &Context, user: &User) -> Result<(), UserError> {
            self.users.write().await.insert(user.id(), user.clone());
            Ok(())
        }
    }
}
