//! Binding the active transaction to a request context

use std::sync::Arc;

use core_kernel::Context;

use crate::client::RelationalTx;
use crate::txn::TxnHandle;

/// Context key for the active transaction; private so only this crate can bind one
struct ActiveTransaction<T>(Arc<TxnHandle<T>>);

/// Derives a context that carries `handle`
pub fn bind_transaction<T: RelationalTx>(ctx: &Context, handle: Arc<TxnHandle<T>>) -> Context {
    ctx.with_value(ActiveTransaction(handle))
}

/// Returns the transaction bound to `ctx`, if any
pub fn lookup_transaction<T: RelationalTx>(ctx: &Context) -> Option<Arc<TxnHandle<T>>> {
    ctx.value::<ActiveTransaction<T>>()
        .map(|active| Arc::clone(&active.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RelationalPool;
    use crate::mock::{MockPool, MockTx};

    #[tokio::test]
    async fn test_binding_is_visible_in_derived_context_only() {
        let pool = MockPool::new("write");
        let handle = Arc::new(TxnHandle::new(pool.begin().await.unwrap()));
        let root = Context::background();

        let bound = bind_transaction(&root, Arc::clone(&handle));

        let found = lookup_transaction::<MockTx>(&bound).unwrap();
        assert!(Arc::ptr_eq(&found, &handle));
        assert!(lookup_transaction::<MockTx>(&root).is_none());
    }
}
