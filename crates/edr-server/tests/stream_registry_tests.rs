use edr_server::stream_registry::{StreamHandle, StreamRegistry};
use tokio::sync::oneshot;

#[tokio::test]
async fn registering_a_second_stream_closes_the_first() {
    let registry = StreamRegistry::new();

    let (close_tx_1, close_rx_1) = oneshot::channel();
    let handle_1 = StreamHandle::new(close_tx_1);
    registry.register("agent-1", handle_1).await;
    assert!(registry.is_registered("agent-1").await);

    let (close_tx_2, _close_rx_2) = oneshot::channel();
    let handle_2 = StreamHandle::new(close_tx_2);
    registry.register("agent-1", handle_2).await;

    assert!(
        close_rx_1.await.is_ok(),
        "displacing a stream must signal the previous handle's close channel"
    );
    assert!(registry.is_registered("agent-1").await);
}

#[tokio::test]
async fn deregister_with_stale_generation_is_ignored() {
    let registry = StreamRegistry::new();

    let (close_tx_1, _close_rx_1) = oneshot::channel();
    let handle_1 = StreamHandle::new(close_tx_1);
    let generation_1 = handle_1.generation();
    registry.register("agent-1", handle_1).await;

    let (close_tx_2, _close_rx_2) = oneshot::channel();
    let handle_2 = StreamHandle::new(close_tx_2);
    registry.register("agent-1", handle_2).await;

    // The displaced stream's own cleanup path must not evict the new one.
    registry.deregister("agent-1", generation_1).await;
    assert!(
        registry.is_registered("agent-1").await,
        "stale-generation deregister must not remove the current stream"
    );
}

#[tokio::test]
async fn deregister_with_current_generation_removes_it() {
    let registry = StreamRegistry::new();

    let (close_tx, _close_rx) = oneshot::channel();
    let handle = StreamHandle::new(close_tx);
    let generation = handle.generation();
    registry.register("agent-1", handle).await;

    registry.deregister("agent-1", generation).await;
    assert!(!registry.is_registered("agent-1").await);
}
