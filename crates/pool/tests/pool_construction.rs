//! Pool construction: configuration checks, initial fill and rollback.

use std::time::Duration;

use respool::error::{Error, FactoryOperation};
use respool::pool::{Pool, PoolBuilder, PoolConfig};
use respool::testing::{MockError, MockFactory};
use test_case::test_case;

fn config(initial_size: usize, max_idle: usize, max_active: usize) -> PoolConfig {
    PoolConfig {
        initial_size,
        max_idle,
        max_active,
        idle_timeout: Duration::ZERO,
    }
}

#[test_case(0, 0, 0)]
#[test_case(0, 0, 1)]
#[test_case(1, 1, 1)]
#[test_case(2, 4, 4)]
#[test_case(3, 5, 9)]
#[tokio::test]
async fn open_count_equals_initial_size(initial: usize, idle: usize, active: usize) {
    let factory = MockFactory::new();
    let pool = Pool::new(config(initial, idle, active), factory.clone())
        .await
        .expect("valid configuration");

    assert_eq!(pool.open_count(), initial);
    assert_eq!(pool.size(), initial);
    assert_eq!(factory.created(), initial as u64);
}

#[test_case(3, 2, 4 ; "initial above idle")]
#[test_case(1, 5, 4 ; "idle above active")]
#[test_case(5, 4, 3 ; "fully inverted")]
#[tokio::test]
async fn invalid_bounds_construct_nothing(initial: usize, idle: usize, active: usize) {
    let factory = MockFactory::new();
    let err = Pool::new(config(initial, idle, active), factory.clone())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidConfiguration { .. }), "{err:?}");
    assert_eq!(factory.create_calls(), 0, "no resource may be built");
}

#[tokio::test]
async fn builder_without_factory_is_rejected() {
    let err = PoolBuilder::<MockFactory>::new()
        .max_active(4)
        .build()
        .await
        .unwrap_err();

    match err {
        Error::InvalidConfiguration { message } => assert!(message.contains("factory")),
        other => panic!("expected InvalidConfiguration, got {other:?}"),
    }
}

#[tokio::test]
async fn builder_applies_settings() {
    let pool = Pool::builder()
        .factory(MockFactory::new())
        .initial_size(2)
        .max_idle(3)
        .max_active(5)
        .idle_timeout(Duration::from_secs(1))
        .build()
        .await
        .unwrap();

    assert_eq!(
        pool.config(),
        &PoolConfig {
            initial_size: 2,
            max_idle: 3,
            max_active: 5,
            idle_timeout: Duration::from_secs(1),
        }
    );
    assert_eq!(pool.open_count(), 2);
}

#[tokio::test]
async fn failed_fill_destroys_everything_built() {
    let factory = MockFactory::new();
    factory.fail_create_call(2);

    let err = Pool::new(config(4, 4, 4), factory.clone())
        .await
        .unwrap_err();

    assert_eq!(err.factory_operation(), Some(FactoryOperation::Create));
    assert_eq!(
        err.factory_source::<MockError>(),
        Some(&MockError::Create { call: 2 })
    );

    let mut destroyed = factory.destroyed();
    destroyed.sort_unstable();
    assert_eq!(destroyed, vec![0, 1], "both resources built before the failure");
    assert_eq!(factory.live(), 0);
}

#[tokio::test]
async fn failed_fill_on_first_call_destroys_nothing() {
    let factory = MockFactory::new();
    factory.fail_create_call(0);

    let err = Pool::new(config(2, 2, 2), factory.clone())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Factory { .. }));
    assert!(factory.destroyed().is_empty());
}
