mod common;

use std::time::Duration;

use courier::queue::{ConsumerError, RetryConsumer};

use common::notification;
use common::queues::{
    DLQ, LONG, PRIMARY, SHORT, ScriptedHandler, Topology, fail_ids, settings, succeed_all,
};

#[tokio::test(start_paused = true)]
async fn short_queue_failure_moves_to_long_queue() {
    let topology = Topology::new().await;
    let handler = ScriptedHandler::new(fail_ids(&["n1"]));
    let consumer = RetryConsumer::new(
        topology.shared(),
        topology.producer.clone(),
        topology.router.clone(),
        handler.clone(),
        settings(SHORT, 5, Duration::from_millis(20)),
    )
    .unwrap();
    consumer.start().await.unwrap();

    topology.publish(SHORT, &notification("n1"), 1).await;
    topology.publish(SHORT, &notification("n2"), 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    consumer.shutdown().await;

    assert_eq!(handler.batches(), vec![vec!["n1", "n2"]]);
    assert_eq!(topology.waiting(LONG).await, vec![("n1".to_string(), 2)]);
    assert_eq!(topology.broker.unacked_len(SHORT).await, 0);
    assert_eq!(topology.broker.ready_len(SHORT).await, 0);
}

#[tokio::test(start_paused = true)]
async fn long_queue_failure_is_dead_lettered_and_acked() {
    let topology = Topology::new().await;
    let handler = ScriptedHandler::new(fail_ids(&["n1"]));
    let consumer = RetryConsumer::new(
        topology.shared(),
        topology.producer.clone(),
        topology.router.clone(),
        handler.clone(),
        settings(LONG, 1, Duration::from_millis(20)),
    )
    .unwrap();
    consumer.start().await.unwrap();

    topology.publish(LONG, &notification("n1"), 2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    consumer.shutdown().await;

    assert_eq!(topology.waiting(DLQ).await, vec![("n1".to_string(), 3)]);
    assert!(topology.waiting(LONG).await.is_empty());
    assert_eq!(topology.broker.unacked_len(LONG).await, 0);
    assert_eq!(handler.batches().len(), 1);
}

#[tokio::test]
async fn rejects_queues_outside_the_retry_chain() {
    let topology = Topology::new().await;
    for queue in [PRIMARY, DLQ] {
        let result = RetryConsumer::new(
            topology.shared(),
            topology.producer.clone(),
            topology.router.clone(),
            ScriptedHandler::new(succeed_all()),
            settings(queue, 1, Duration::from_secs(1)),
        );
        assert!(matches!(result, Err(ConsumerError::NotARetryQueue(name)) if name == queue));
    }
}
