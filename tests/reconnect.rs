use amqp_transport::{
    config::AmqpConfig,
    connection::{ConnectionManager, ConnectionState},
    errors::AmqpError,
};
use std::time::Duration;

fn unreachable_config() -> AmqpConfig {
    AmqpConfig {
        host: "127.0.0.1".to_owned(),
        // nothing listens on port 1; connects fail immediately
        port: 1,
        reconnect_max_attempts: 2,
        reconnect_delay: Duration::from_millis(20),
        ..AmqpConfig::default()
    }
}

#[tokio::test]
async fn first_connect_failure_surfaces_connection_error() {
    let manager = ConnectionManager::new(unreachable_config());

    let err = manager.connect().await.expect_err("broker is unreachable");
    assert_eq!(err, AmqpError::ConnectionError);
}

#[tokio::test]
async fn recovery_is_bounded_and_ends_disconnected() {
    let manager = ConnectionManager::new(unreachable_config());
    let mut state_rx = manager.subscribe_state();

    let _ = manager.connect().await;

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if state_rx.changed().await.is_err() {
                break;
            }
            if *state_rx.borrow() == ConnectionState::Disconnected {
                break;
            }
        }
    })
    .await
    .expect("recovery must give up within the attempt bound");

    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn operations_fail_fast_after_recovery_is_exhausted() {
    let manager = ConnectionManager::new(unreachable_config());
    let mut state_rx = manager.subscribe_state();

    let _ = manager.connect().await;

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if state_rx.changed().await.is_err() {
                break;
            }
            if *state_rx.borrow() == ConnectionState::Disconnected {
                break;
            }
        }
    })
    .await
    .expect("recovery must give up within the attempt bound");

    assert_eq!(
        manager.channel().await.expect_err("transport is down"),
        AmqpError::NotConnectedError
    );
}

#[tokio::test]
async fn close_before_connect_is_a_no_op() {
    let manager = ConnectionManager::new(unreachable_config());

    manager.close().await;

    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(
        manager.channel().await.expect_err("never connected"),
        AmqpError::NotConnectedError
    );
}
