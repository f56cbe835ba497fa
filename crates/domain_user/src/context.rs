//! The authenticated user of the current request

use core_kernel::Context;

use crate::user::User;

struct CurrentUser(User);

/// Derives a context carrying `user` as the request's user
pub fn with_user(ctx: &Context, user: User) -> Context {
    ctx.with_value(CurrentUser(user))
}

/// Returns the request's user, if one was bound
pub fn user_from_context(ctx: &Context) -> Option<&User> {
    ctx.value::<CurrentUser>().map(|current| &current.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let user = User::new("uid-1");
        let ctx = with_user(&Context::background(), user.clone());

        assert_eq!(user_from_context(&ctx), Some(&user));
        assert!(user_from_context(&Context::background()).is_none());
    }
}
