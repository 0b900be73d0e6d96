//! Tests for `Pooled` guard return-on-drop and `Pool::checkin`.

use std::time::Duration;

use respool::error::Error;
use respool::pool::{Pool, PoolConfig};
use respool::testing::MockFactory;

fn config() -> PoolConfig {
    PoolConfig {
        initial_size: 0,
        max_idle: 2,
        max_active: 2,
        idle_timeout: Duration::ZERO,
    }
}

#[tokio::test]
async fn drop_returns_to_idle() {
    let pool = Pool::new(config(), MockFactory::new()).await.unwrap();

    {
        let guard = pool.get().await.unwrap();
        assert_eq!(guard.id(), 0);
    }
    // Give the spawned release a moment to run
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(pool.size(), 1);
    assert_eq!(pool.open_count(), 1);
    assert_eq!(pool.get().await.unwrap().id(), 0, "reused after drop");
}

#[tokio::test]
async fn checkin_waits_for_release() {
    let pool = Pool::new(config(), MockFactory::new()).await.unwrap();

    let guard = pool.get().await.unwrap();
    pool.checkin(guard).await.unwrap();

    assert_eq!(pool.size(), 1);
    assert_eq!(pool.stats().releases, 1);
}

#[tokio::test]
async fn checkin_to_foreign_pool_is_rejected() {
    let home = Pool::new(config(), MockFactory::new()).await.unwrap();
    let other = Pool::new(config(), MockFactory::new()).await.unwrap();

    let guard = home.get().await.unwrap();
    let err = other.checkin(guard).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }), "{err:?}");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(other.size(), 0);
    assert_eq!(other.open_count(), 0);
    assert_eq!(home.size(), 1, "the rejected guard went back to its own pool");
    assert_eq!(home.open_count(), 1);
}

#[tokio::test]
async fn held_for_grows() {
    let pool = Pool::new(config(), MockFactory::new()).await.unwrap();
    let guard = pool.get().await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(guard.held_for() >= Duration::from_millis(5));
}
