//! User use cases
//!
//! Writes go through the [`TransactionService`] so that a caller who is
//! already inside a unit of work gets them folded into it.

use std::sync::Arc;

use core_kernel::{Context, TransactionService};
use tracing::{debug, info, instrument};

use crate::context::user_from_context;
use crate::error::UserError;
use crate::ports::UserRepository;
use crate::user::User;

pub struct UserService<T> {
    users: Arc<dyn UserRepository>,
    txn: Arc<T>,
}

impl<T: TransactionService> UserService<T> {
    pub fn new(users: Arc<dyn UserRepository>, txn: Arc<T>) -> Self {
        Self { users, txn }
    }

    /// Registers a new anonymous user
    #[instrument(skip(self, ctx))]
    pub async fn create(&self, ctx: &Context, uid: &str) -> Result<User, UserError> {
        if uid.is_empty() {
            return Err(UserError::NoUidProvided);
        }

        let user = User::new(uid);
        debug!(user_id = %user.id(), "Creating user");

        let user = self
            .txn
            .run_in_transaction(ctx, |ctx| async move {
                self.users.save(&ctx, &user).await?;
                Ok::<_, UserError>(user)
            })
            .await?;
        Ok(user)
    }

    /// Logs the request's user in with an identity provider
    #[instrument(skip(self, ctx, email))]
    pub async fn login(
        &self,
        ctx: &Context,
        provider: &str,
        email: Option<String>,
    ) -> Result<User, UserError> {
        let mut user = user_from_context(ctx)
            .cloned()
            .ok_or(UserError::UserNotFound)?;

        info!(user_id = %user.id(), provider, "Logging in user");
        user.login(provider, email)?;

        let user = self
            .txn
            .run_in_transaction(ctx, |ctx| async move {
                self.users.save(&ctx, &user).await?;
                Ok::<_, UserError>(user)
            })
            .await?;
        Ok(user)
    }

    /// Loads the request's user as currently stored
    #[instrument(skip(self, ctx))]
    pub async fn get(&self, ctx: &Context) -> Result<User, UserError> {
        let current = user_from_context(ctx).ok_or(UserError::UserNotFound)?;
        debug!(uid = current.uid(), "Fetching user");

        self.users
            .get_by_uid(ctx, current.uid())
            .await?
            .ok_or(UserError::UserNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::with_user;
    use crate::ports::mock::MockUserRepository;
    use crate::user::Provider;
    use core_kernel::ports::mock::InlineTransactions;

    fn service(repo: Arc<MockUserRepository>) -> (UserService<InlineTransactions>, Arc<InlineTransactions>) {
        let txn = Arc::new(InlineTransactions::new());
        (UserService::new(repo, Arc::clone(&txn)), txn)
    }

    #[tokio::test]
    async fn test_create_saves_in_a_unit_of_work() {
        let repo = Arc::new(MockUserRepository::new());
        let (svc, txn) = service(Arc::clone(&repo));

        let user = svc.create(&Context::background(), "uid-1").await.unwrap();

        assert_eq!(user.uid(), "uid-1");
        assert_eq!(user.provider(), Provider::Anonymous);
        assert_eq!(txn.calls(), 1);
        assert_eq!(repo.count().await, 1);
    }

    #[tokio::test]
    async fn test_create_requires_uid() {
        let repo = Arc::new(MockUserRepository::new());
        let (svc, txn) = service(repo);

        let err = svc.create(&Context::background(), "").await.unwrap_err();
        assert!(matches!(err, UserError::NoUidProvided));
        assert_eq!(txn.calls(), 0);
    }

    #[tokio::test]
    async fn test_login_updates_stored_user() {
        let stored = User::new("uid-1");
        let repo = Arc::new(MockUserRepository::with_users(vec![stored.clone()]).await);
        let (svc, _) = service(Arc::clone(&repo));
        let ctx = with_user(&Context::background(), stored);

        let user = svc
            .login(&ctx, "google", Some("ann@example.com".into()))
            .await
            .unwrap();
        assert_eq!(user.provider(), Provider::Google);

        let fetched = svc.get(&ctx).await.unwrap();
        assert_eq!(fetched.email(), Some("ann@example.com"));
    }

    #[tokio::test]
    async fn test_login_without_request_user() {
        let (svc, txn) = service(Arc::new(MockUserRepository::new()));

        let err = svc
            .login(&Context::background(), "google", Some("a@b.c".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::UserNotFound));
        assert_eq!(txn.calls(), 0);
    }

    #[tokio::test]
    async fn test_login_rule_errors_skip_the_unit_of_work() {
        let user = User::new("uid-1");
        let (svc, txn) = service(Arc::new(MockUserRepository::new()));
        let ctx = with_user(&Context::background(), user);

        let err = svc.login(&ctx, "github", Some("a@b.c".into())).await.unwrap_err();
        assert!(matches!(err, UserError::InvalidProvider(p) if p == "github"));
        assert_eq!(txn.calls(), 0);
    }

    #[tokio::test]
    async fn test_get_unknown_user() {
        let (svc, _) = service(Arc::new(MockUserRepository::new()));
        let ctx = with_user(&Context::background(), User::new("ghost"));

        assert!(matches!(svc.get(&ctx).await, Err(UserError::UserNotFound)));
    }
}
