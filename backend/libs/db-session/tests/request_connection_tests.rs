//! Lifecycle tests for request-scoped connections against a live PostgreSQL
//!
//! Run with `DATABASE_URL` pointing at a disposable database.

use db_session::{DbConfig, DbError, RequestConnection};
use std::sync::Arc;

fn live_config() -> Option<Arc<DbConfig>> {
    let url = std::env::var("DATABASE_URL").ok()?;
    Some(Arc::new(DbConfig::new("db-session-it", url)))
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_connection_opens_lazily_and_is_reused() {
    let Some(config) = live_config() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let conn = RequestConnection::new(config);
    assert!(!conn.is_open().await);

    let pid_first: i32 = {
        let mut guard = conn.acquire().await.expect("first acquire");
        sqlx::query_scalar("SELECT pg_backend_pid()")
            .fetch_one(&mut *guard)
            .await
            .expect("query")
    };
    let pid_second: i32 = {
        let mut guard = conn.acquire().await.expect("second acquire");
        sqlx::query_scalar("SELECT pg_backend_pid()")
            .fetch_one(&mut *guard)
            .await
            .expect("query")
    };

    // Same backend: one physical connection per request
    assert_eq!(pid_first, pid_second);
    assert!(conn.is_open().await);

    conn.release().await;
    assert!(!conn.is_open().await);
    assert!(matches!(conn.acquire().await, Err(DbError::Released)));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_separate_requests_get_separate_connections() {
    let Some(config) = live_config() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let first = RequestConnection::new(config.clone());
    let second = RequestConnection::new(config);

    let pid_a: i32 = sqlx::query_scalar("SELECT pg_backend_pid()")
        .fetch_one(&mut *first.acquire().await.expect("acquire"))
        .await
        .expect("query");
    let pid_b: i32 = sqlx::query_scalar("SELECT pg_backend_pid()")
        .fetch_one(&mut *second.acquire().await.expect("acquire"))
        .await
        .expect("query");

    assert_ne!(pid_a, pid_b);

    first.release().await;
    second.release().await;
}
