//! Shared E2E test helpers.

pub mod config;
pub mod sinks;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use dropwatch_core::event::WriteMsg;

/// Receive the next exported message or fail after one second.
pub async fn recv_msg(rx: &mut mpsc::UnboundedReceiver<Arc<WriteMsg>>) -> Arc<WriteMsg> {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for exported message")
        .expect("capture channel closed")
}

/// Assert that nothing more is exported within 100ms.
pub async fn assert_no_msg(rx: &mut mpsc::UnboundedReceiver<Arc<WriteMsg>>) {
    let result = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(
        !matches!(result, Ok(Some(_))),
        "unexpected message exported"
    );
}

/// Poll `condition` every 10ms until it holds, failing after two seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
