/// Session registry tests
///
/// Binding isolation, pairing lifecycle and database drop policy.
/// Run with: cargo test --test session_registry_tests

use modestdb::{DbError, SessionRegistry, StorageEngine};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Barrier;

#[tokio::test]
async fn test_bindings_are_independent_per_session() {
    let root = TempDir::new().unwrap();
    let registry = SessionRegistry::new();
    registry.create_database(1, "alpha", root.path(), 64).await.unwrap();
    registry.create_database(2, "beta", root.path(), 64).await.unwrap();

    registry.pair(1, "beta").await.unwrap();

    assert_eq!(registry.get_pair(1).await.unwrap().name(), "beta");
    assert_eq!(registry.get_pair(2).await.unwrap().name(), "beta");

    registry.pair(2, "alpha").await.unwrap();
    assert_eq!(registry.get_pair(1).await.unwrap().name(), "beta");
    assert_eq!(registry.get_pair(2).await.unwrap().name(), "alpha");
}

#[tokio::test]
async fn test_sessions_share_one_handle() {
    let root = TempDir::new().unwrap();
    let registry = SessionRegistry::new();
    let created = registry.create_database(1, "shared", root.path(), 64).await.unwrap();
    let paired = registry.pair(2, "shared").await.unwrap();

    assert!(Arc::ptr_eq(&created, &paired));
    assert_eq!(registry.paired_sessions("shared").await, vec![1, 2]);
}

#[tokio::test]
async fn test_unpair_then_get_pair_fails() {
    let root = TempDir::new().unwrap();
    let registry = SessionRegistry::new();
    registry.create_database(1, "d", root.path(), 64).await.unwrap();

    registry.unpair(1).await.unwrap();
    assert!(matches!(registry.get_pair(1).await, Err(DbError::NoActiveDatabase)));
}

#[tokio::test]
async fn test_second_unpair_reports_not_found() {
    let root = TempDir::new().unwrap();
    let registry = SessionRegistry::new();
    registry.create_database(3, "d", root.path(), 64).await.unwrap();

    registry.unpair(3).await.unwrap();
    assert!(matches!(registry.unpair(3).await, Err(DbError::NotFound(3))));

    // The database outlives the binding
    assert_eq!(registry.database_names().await, vec!["d"]);
    assert!(registry.get_pair(3).await.is_err());
}

#[tokio::test]
async fn test_created_database_shows_in_metadata() {
    let root = TempDir::new().unwrap();
    let registry = SessionRegistry::new();
    registry.create_database(1, "fresh", root.path(), 64).await.unwrap();

    let metadata = registry.get_metadata().await;
    assert_eq!(metadata.len(), 1);
    assert_eq!(metadata[0].name, "fresh");
    assert!(metadata[0].tables.is_empty());
}

#[tokio::test]
async fn test_create_fails_when_file_exists() {
    let root = TempDir::new().unwrap();
    std::fs::write(root.path().join("taken"), b"something else").unwrap();

    let registry = SessionRegistry::new();
    let err = registry.create_database(1, "taken", root.path(), 64).await.unwrap_err();
    assert!(matches!(err, DbError::Storage(_)));
    assert!(registry.database_names().await.is_empty());
    assert!(registry.get_pair(1).await.is_err());
}

#[tokio::test]
async fn test_load_all_registers_without_pairing() {
    let root = TempDir::new().unwrap();
    {
        let registry = SessionRegistry::new();
        registry.create_database(1, "one", root.path(), 64).await.unwrap();
        registry.create_database(1, "two", root.path(), 128).await.unwrap();
    }

    let registry = SessionRegistry::new();
    assert_eq!(registry.load_all_databases(root.path()).await.unwrap(), 2);
    assert_eq!(registry.database_names().await, vec!["one", "two"]);
    assert!(registry.paired_sessions("one").await.is_empty());
    assert_eq!(registry.pair(9, "two").await.unwrap().block_size(), 128);
}

#[tokio::test]
async fn test_load_all_creates_missing_root() {
    let root = TempDir::new().unwrap();
    let nested = root.path().join("a").join("b");

    let registry = SessionRegistry::new();
    assert_eq!(registry.load_all_databases(&nested).await.unwrap(), 0);
    assert!(nested.is_dir());
}

#[tokio::test]
async fn test_load_all_fails_on_foreign_file() {
    let root = TempDir::new().unwrap();
    std::fs::write(root.path().join("readme"), b"not a database").unwrap();

    let registry = SessionRegistry::new();
    assert!(registry.load_all_databases(root.path()).await.is_err());
}

#[tokio::test]
async fn test_drop_refused_while_paired() {
    let root = TempDir::new().unwrap();
    let registry = SessionRegistry::new();
    registry.create_database(1, "busy", root.path(), 64).await.unwrap();
    registry.pair(2, "busy").await.unwrap();

    assert!(matches!(
        registry.drop_database("busy").await,
        Err(DbError::DatabaseInUse(name, 2)) if name == "busy"
    ));

    registry.unpair(1).await.unwrap();
    registry.evict(2).await;
    registry.drop_database("busy").await.unwrap();

    assert!(registry.database_names().await.is_empty());
    assert!(!root.path().join("busy").exists());
    assert!(matches!(registry.pair(1, "busy").await, Err(DbError::NotLoaded(_))));
}

#[tokio::test]
async fn test_drop_unknown_database() {
    let registry = SessionRegistry::new();
    assert!(matches!(registry.drop_database("ghost").await, Err(DbError::NotLoaded(_))));
}

#[tokio::test]
async fn test_concurrent_pairing() {
    let root = TempDir::new().unwrap();
    let registry = Arc::new(SessionRegistry::new());
    registry.create_database(0, "a", root.path(), 64).await.unwrap();
    registry.create_database(0, "b", root.path(), 64).await.unwrap();

    let num_tasks = 32;
    let barrier = Arc::new(Barrier::new(num_tasks));
    let mut handles = vec![];

    for session in 1..=num_tasks as u64 {
        let registry = Arc::clone(&registry);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let name = if session % 2 == 0 { "a" } else { "b" };
            for _ in 0..20 {
                registry.pair(session, name).await.unwrap();
                let _ = registry.get_metadata().await;
                assert_eq!(registry.get_pair(session).await.unwrap().name(), name);
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(registry.paired_sessions("a").await.len(), 16);
    // Session 0 stayed on "b", its last create
    assert_eq!(registry.paired_sessions("b").await.len(), 17);
}
