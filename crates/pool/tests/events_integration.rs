//! Pools publish lifecycle events on an attached bus.

use std::sync::Arc;
use std::time::Duration;

use respool::events::{DestroyReason, EventBus, PoolEvent};
use respool::pool::Pool;
use respool::testing::MockFactory;
use tokio::sync::broadcast;

fn drain(rx: &mut broadcast::Receiver<PoolEvent>) -> Vec<PoolEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn lifecycle_emits_in_order() {
    let bus = Arc::new(EventBus::new(64));
    let mut rx = bus.subscribe();
    let pool = Pool::builder()
        .factory(MockFactory::new())
        .initial_size(1)
        .max_idle(1)
        .max_active(2)
        .idle_timeout(Duration::ZERO)
        .event_bus(Arc::clone(&bus))
        .build()
        .await
        .unwrap();
    let pool_id = pool.id();

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    assert!(pool.acquire().await.is_err());
    pool.release(a).await.unwrap();
    pool.release(b).await.unwrap();
    pool.shutdown().await;

    assert_eq!(
        drain(&mut rx),
        vec![
            PoolEvent::Created { pool_id },
            PoolEvent::Acquired {
                pool_id,
                reused: true
            },
            PoolEvent::Created { pool_id },
            PoolEvent::Acquired {
                pool_id,
                reused: false
            },
            PoolEvent::Exhausted {
                pool_id,
                open: 2,
                max_active: 2
            },
            PoolEvent::Released { pool_id },
            PoolEvent::Destroyed {
                pool_id,
                reason: DestroyReason::Overflow
            },
            PoolEvent::Destroyed {
                pool_id,
                reason: DestroyReason::Shutdown
            },
            PoolEvent::ShutDown {
                pool_id,
                drained: 1
            },
        ]
    );
}

#[tokio::test]
async fn validation_failure_is_reported() {
    let bus = Arc::new(EventBus::new(16));
    let mut rx = bus.subscribe();
    let factory = MockFactory::new();
    let pool = Pool::builder()
        .factory(factory.clone())
        .initial_size(1)
        .max_idle(1)
        .max_active(1)
        .event_bus(bus)
        .build()
        .await
        .unwrap();
    factory.invalidate(0);

    let conn = pool.acquire().await.unwrap();
    assert_eq!(conn.id(), 1);

    let events = drain(&mut rx);
    assert!(events.contains(&PoolEvent::Destroyed {
        pool_id: pool.id(),
        reason: DestroyReason::ValidationFailed,
    }));
}
