//! Integration tests against a real PostgreSQL server
//!
//! Each test starts its own container, so they need Docker and are ignored by
//! default. Run with `cargo test -p infra_db -- --ignored`.

use std::sync::Arc;

use core_kernel::{Context, TransactionError, TransactionService};
use domain_page::{PageQuery, PageRepository};
use domain_user::UserRepository;
use infra_db::{Connection, DatabaseError, PgPageRepository, PgUserRepository, PoolConfig};
use test_utils::{
    anonymous_user, create_isolated_test_database, google_user, page_with_links, TestDatabase,
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
enum TestError {
    #[error("boom")]
    Boom,
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

async fn setup() -> (TestDatabase, Arc<Connection>) {
    let db = create_isolated_test_database()
        .await
        .expect("Failed to start test database");
    let config = PoolConfig::new(db.config.connection_url()).max_connections(5);
    let connection = Connection::connect(&config, &config)
        .await
        .expect("Failed to connect pool pair");
    (db, Arc::new(connection))
}

/// Inserts an anonymous user row through the write client of `ctx`
async fn insert_user(connection: &Connection, ctx: &Context, uid: &str) -> Result<(), TestError> {
    let mut conn = connection.write_client(ctx).acquire().await?;
    sqlx::query("INSERT INTO users (id, uid) VALUES ($1, $2)")
        .bind(Uuid::now_v7())
        .bind(uid)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn user_exists(connection: &Connection, ctx: &Context, uid: &str) -> bool {
    let mut conn = connection
        .read_client(ctx)
        .acquire()
        .await
        .expect("acquire read connection");
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE uid = $1")
        .bind(uid)
        .fetch_one(&mut *conn)
        .await
        .expect("count users");
    count == 1
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_ping_and_close() {
    let (_db, connection) = setup().await;

    connection.ping().await.unwrap();
    connection.close().await.unwrap();

    assert!(connection.ping().await.is_err());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_commit_makes_writes_visible() {
    let (db, connection) = setup().await;
    let ctx = Context::background();

    connection
        .run_in_transaction(&ctx, |ctx| {
            let connection = Arc::clone(&connection);
            async move { insert_user(&connection, &ctx, "committed").await }
        })
        .await
        .unwrap();

    assert!(user_exists(&connection, &ctx, "committed").await);
    assert_eq!(db.count_rows("users").await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_closure_error_rolls_back() {
    let (db, connection) = setup().await;
    let ctx = Context::background();

    let result: Result<(), _> = connection
        .run_in_transaction(&ctx, |ctx| {
            let connection = Arc::clone(&connection);
            async move {
                insert_user(&connection, &ctx, "discarded").await?;
                Err(TestError::Boom)
            }
        })
        .await;

    assert!(matches!(result, Err(TransactionError::Aborted(TestError::Boom))));
    assert_eq!(db.count_rows("users").await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_read_client_sees_uncommitted_writes_of_its_unit() {
    let (_db, connection) = setup().await;
    let root = Context::background();

    connection
        .run_in_transaction(&root, |ctx| {
            let connection = Arc::clone(&connection);
            let root = root.clone();
            async move {
                insert_user(&connection, &ctx, "pending").await?;
                assert!(user_exists(&connection, &ctx, "pending").await);
                assert!(!user_exists(&connection, &root, "pending").await);
                Ok::<_, TestError>(())
            }
        })
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_nested_units_commit_together() {
    let (db, connection) = setup().await;
    let ctx = Context::background();

    connection
        .run_in_transaction(&ctx, |ctx| {
            let connection = Arc::clone(&connection);
            async move {
                insert_user(&connection, &ctx, "outer").await?;
                connection
                    .run_in_transaction(&ctx, |ctx| {
                        let connection = Arc::clone(&connection);
                        async move { insert_user(&connection, &ctx, "inner").await }
                    })
                    .await
                    .map_err(|e| e.into_source().unwrap_or(TestError::Boom))?;
                Ok::<_, TestError>(())
            }
        })
        .await
        .unwrap();

    assert_eq!(db.count_rows("users").await.unwrap(), 2);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_failed_nested_unit_keeps_outer_writes() {
    let (db, connection) = setup().await;
    let ctx = Context::background();

    connection
        .run_in_transaction(&ctx, |ctx| {
            let connection = Arc::clone(&connection);
            async move {
                insert_user(&connection, &ctx, "outer").await?;
                let nested: Result<(), _> = connection
                    .run_in_transaction(&ctx, |ctx| {
                        let connection = Arc::clone(&connection);
                        async move {
                            insert_user(&connection, &ctx, "inner").await?;
                            Err(TestError::Boom)
                        }
                    })
                    .await;
                assert!(matches!(nested, Err(TransactionError::Aborted(TestError::Boom))));

                // The transaction is still usable after the savepoint rollback
                insert_user(&connection, &ctx, "after").await?;
                Ok::<_, TestError>(())
            }
        })
        .await
        .unwrap();

    assert!(user_exists(&connection, &ctx, "outer").await);
    assert!(user_exists(&connection, &ctx, "after").await);
    assert!(!user_exists(&connection, &ctx, "inner").await);
    assert_eq!(db.count_rows("users").await.unwrap(), 2);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_constraint_violation_inside_nested_unit_is_recoverable() {
    let (_db, connection) = setup().await;
    let ctx = Context::background();

    connection
        .run_in_transaction(&ctx, |ctx| {
            let connection = Arc::clone(&connection);
            async move {
                insert_user(&connection, &ctx, "taken").await?;
                let duplicate = connection
                    .run_in_transaction(&ctx, |ctx| {
                        let connection = Arc::clone(&connection);
                        async move { insert_user(&connection, &ctx, "taken").await }
                    })
                    .await;
                match duplicate {
                    Err(TransactionError::Aborted(TestError::Sql(e))) => {
                        assert!(matches!(
                            DatabaseError::classify(e),
                            DatabaseError::DuplicateEntry(_)
                        ));
                    }
                    other => panic!("expected a unique violation, got {other:?}"),
                }
                insert_user(&connection, &ctx, "free").await
            }
        })
        .await
        .unwrap();

    assert!(user_exists(&connection, &ctx, "free").await);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_user_repository_round_trip() {
    let (_db, connection) = setup().await;
    let users = PgUserRepository::new(Arc::clone(&connection));
    let ctx = Context::background();

    let mut user = anonymous_user("uid-1");
    users.save(&ctx, &user).await.unwrap();

    user.login("google", Some("ann@example.com".to_string())).unwrap();
    users.save(&ctx, &user).await.unwrap();

    let loaded = users.get_by_uid(&ctx, "uid-1").await.unwrap().unwrap();
    assert_eq!(loaded.id(), user.id());
    assert_eq!(loaded.email(), Some("ann@example.com"));
    assert_eq!(loaded, users.get(&ctx, user.id()).await.unwrap().unwrap());
    assert!(users.get_by_uid(&ctx, "missing").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_page_repository_round_trip() {
    let (_db, connection) = setup().await;
    let users = PgUserRepository::new(Arc::clone(&connection));
    let pages = PgPageRepository::new(Arc::clone(&connection));
    let ctx = Context::background();

    let owner = google_user("owner");
    let guest = anonymous_user("guest");
    users.save(&ctx, &owner).await.unwrap();
    users.save(&ctx, &guest).await.unwrap();

    let mut page = page_with_links(&owner, "Reading", &["https://a", "https://b"]);
    let code = page.invite_code().to_string();
    page.join(&guest, &code).unwrap();
    pages.save(&ctx, &page).await.unwrap();

    let loaded = pages.get(&ctx, page.id()).await.unwrap().unwrap();
    assert_eq!(loaded.title(), "Reading");
    assert_eq!(loaded.created_by().id(), owner.id());
    assert_eq!(loaded.links(), page.links());
    assert_eq!(loaded.invited_users().len(), 1);

    let joined = users.get(&ctx, guest.id()).await.unwrap().unwrap();
    assert_eq!(joined.joined_page_ids(), &[page.id()]);

    page.remove_link(&owner, "https://a").unwrap();
    pages.save(&ctx, &page).await.unwrap();
    let loaded = pages.get(&ctx, page.id()).await.unwrap().unwrap();
    assert_eq!(loaded.links().len(), 1);
    assert_eq!(loaded.links()[0].priority(), 1);

    pages.delete(&ctx, page.id()).await.unwrap();
    assert!(pages.get(&ctx, page.id()).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_page_list_filters_and_paginates() {
    let (_db, connection) = setup().await;
    let users = PgUserRepository::new(Arc::clone(&connection));
    let pages = PgPageRepository::new(Arc::clone(&connection));
    let ctx = Context::background();

    let ann = anonymous_user("ann");
    let bob = anonymous_user("bob");
    users.save(&ctx, &ann).await.unwrap();
    users.save(&ctx, &bob).await.unwrap();

    for title in ["one", "two", "three"] {
        pages
            .save(&ctx, &page_with_links(&ann, title, &[]))
            .await
            .unwrap();
    }
    pages
        .save(&ctx, &page_with_links(&bob, "other", &[]))
        .await
        .unwrap();

    let all = pages.list(&ctx, &PageQuery::new()).await.unwrap();
    assert_eq!(all.len(), 4);

    let query = PageQuery::new().created_by(ann.id());
    assert_eq!(pages.list(&ctx, &query).await.unwrap().len(), 3);

    let second = pages
        .list(&ctx, &query.clone().paginate(2, 2))
        .await
        .unwrap();
    assert_eq!(second.len(), 1);

    let by_id = pages
        .list(&ctx, &PageQuery::new().ids(vec![all[0].id()]))
        .await
        .unwrap();
    assert_eq!(by_id.len(), 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_page_save_inside_failed_unit_is_discarded() {
    let (db, connection) = setup().await;
    let users = PgUserRepository::new(Arc::clone(&connection));
    let pages = PgPageRepository::new(Arc::clone(&connection));
    let ctx = Context::background();

    let owner = anonymous_user("owner");
    users.save(&ctx, &owner).await.unwrap();
    let page = page_with_links(&owner, "Draft", &["https://a"]);

    let result: Result<(), _> = connection
        .run_in_transaction(&ctx, |ctx| {
            let pages = pages.clone();
            let page = page.clone();
            async move {
                pages.save(&ctx, &page).await.map_err(|_| TestError::Boom)?;
                Err(TestError::Boom)
            }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(db.count_rows("pages").await.unwrap(), 0);
    assert_eq!(db.count_rows("link_items").await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_swallowed_nested_failure_keeps_user_and_drops_page() {
    let (db, connection) = setup().await;
    let users = PgUserRepository::new(Arc::clone(&connection));
    let pages = PgPageRepository::new(Arc::clone(&connection));
    let ctx = Context::background();

    let owner = anonymous_user("owner");
    let page = page_with_links(&owner, "Inner", &["https://a"]);

    connection
        .run_in_transaction(&ctx, |ctx| {
            let connection = Arc::clone(&connection);
            let (users, pages) = (users.clone(), pages.clone());
            let (owner, page) = (owner.clone(), page.clone());
            async move {
                users.save(&ctx, &owner).await.map_err(|_| TestError::Boom)?;
                let inner: Result<(), TransactionError<TestError>> = connection
                    .run_in_transaction(&ctx, |ctx| async move {
                        pages.save(&ctx, &page).await.map_err(|_| TestError::Boom)?;
                        Err(TestError::Boom)
                    })
                    .await;
                assert!(inner.is_err());
                Ok::<_, TestError>(())
            }
        })
        .await
        .unwrap();

    assert!(users.get(&ctx, owner.id()).await.unwrap().is_some());
    assert!(pages.get(&ctx, page.id()).await.unwrap().is_none());
    assert_eq!(db.count_rows("pages").await.unwrap(), 0);
}
