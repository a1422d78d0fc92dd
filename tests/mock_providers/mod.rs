//! Shared mock infrastructure for integration tests.

#![allow(dead_code)]

pub mod websocket_mock;

pub use websocket_mock::{MockBehavior, MockServer, spawn_mock};

use std::time::Duration;

/// Poll a condition until it holds or the timeout expires.
pub async fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
