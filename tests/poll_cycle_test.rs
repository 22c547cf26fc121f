//! Poll cycle behavior against the in-memory provider

mod common;

use std::time::Duration;

use common::{credential, Harness, QUEUE};
use serde_json::json;
use servicebus_consumer::consumer::ConsumerState;
use servicebus_consumer::messaging::InMemoryQueueProvider;
use servicebus_consumer::ConsumerError;

#[tokio::test]
async fn test_empty_queue_updates_only_check_time() {
    let harness = Harness::new();

    let result = harness
        .controller()
        .run_cycle(&harness.config, &credential())
        .await;

    assert!(result.is_ok());
    assert_eq!(result.received_count, 0);
    assert!(harness.sink.is_empty());

    let state = ConsumerState::load(&harness.store).await.unwrap();
    assert!(state.last_check_time.is_some());
    assert!(state.last_message_received_time.is_none());
}

#[tokio::test]
async fn test_all_acknowledged_messages_emitted_in_order() {
    let harness = Harness::new();
    harness.seed(&[r#"{"n":1}"#, "plain text", r#"[1,2]"#]);

    let result = harness
        .controller()
        .run_cycle(&harness.config, &credential())
        .await;

    assert!(result.is_ok());
    assert_eq!(result.received_count, 3);

    let emitted = harness.sink.drain();
    let ids: Vec<_> = emitted.iter().map(|m| m.message_id.as_str()).collect();
    assert_eq!(ids, ["m-1", "m-2", "m-3"]);
    assert_eq!(emitted[0].body, json!({"n": 1}));
    assert_eq!(emitted[1].body, json!("plain text"));
    assert_eq!(emitted[2].raw_body.as_deref(), Some("[1,2]"));
    assert_eq!(emitted, result.messages);

    assert_eq!(harness.memory.completed_count(QUEUE), 3);
    assert_eq!(harness.memory.queue_length(QUEUE), 0);

    let state = ConsumerState::load(&harness.store).await.unwrap();
    assert!(state.last_check_time.is_some());
    assert_eq!(state.last_message_received_time, state.last_check_time);
}

#[tokio::test]
async fn test_ack_failure_aborts_remaining_batch() {
    let harness = Harness::new();
    harness.seed(&["a", "b", "c", "d"]);
    harness.memory.reject_ack("m-3");

    let result = harness
        .controller()
        .run_cycle(&harness.config, &credential())
        .await;

    assert_eq!(result.received_count, 4);
    assert_eq!(result.messages.len(), 2);
    assert!(matches!(
        result.error(),
        Some(ConsumerError::Acknowledgment { message_id, .. }) if message_id == "m-3"
    ));
    assert!(result.diagnostic().unwrap().contains("m-3"));

    let ids: Vec<_> = harness.sink.drain().into_iter().map(|m| m.message_id).collect();
    assert_eq!(ids, ["m-1", "m-2"]);
    assert_eq!(harness.memory.completed_count(QUEUE), 2);
    assert_eq!(harness.memory.locked_count(QUEUE), 2);
    assert_eq!(harness.memory.open_sessions(), 0);

    let state = ConsumerState::load(&harness.store).await.unwrap();
    assert!(state.last_check_time.is_some());
    assert!(state.last_message_received_time.is_some());
}

#[tokio::test]
async fn test_unacknowledged_messages_are_redelivered_after_lock_expiry() {
    let mut harness = Harness::new();
    harness.memory =
        InMemoryQueueProvider::with_queues(&[QUEUE]).with_lock_duration(Duration::from_millis(40));
    harness.seed(&["a", "b", "c"]);
    harness.memory.reject_ack("m-2");

    let first = harness
        .controller()
        .run_cycle(&harness.config, &credential())
        .await;
    assert_eq!(first.messages.len(), 1);

    tokio::time::sleep(Duration::from_millis(80)).await;

    let second = harness
        .controller()
        .run_cycle(&harness.config, &credential())
        .await;
    assert_eq!(second.received_count, 2);
    assert!(!second.is_ok());
    assert!(second.messages.is_empty());
}

#[tokio::test]
async fn test_receive_transport_failure() {
    let harness = Harness::new();
    harness.seed(&["a"]);
    harness.memory.fail_receive(Some("connection reset by peer"));

    let result = harness
        .controller()
        .run_cycle(&harness.config, &credential())
        .await;

    assert_eq!(result.received_count, 0);
    assert!(matches!(result.error(), Some(ConsumerError::Connectivity(_))));
    assert!(harness.sink.is_empty());
    assert_eq!(harness.memory.completed_count(QUEUE), 0);
    assert_eq!(harness.memory.locked_count(QUEUE), 0);
    assert_eq!(harness.memory.open_sessions(), 0);

    let state = ConsumerState::load(&harness.store).await.unwrap();
    assert!(state.last_check_time.is_some());
    assert!(state.last_message_received_time.is_none());
}

#[tokio::test]
async fn test_open_failure_reports_connectivity() {
    let harness = Harness::new();
    harness.memory.fail_open(Some("dns lookup failed"));

    let result = harness
        .controller()
        .run_cycle(&harness.config, &credential())
        .await;

    assert!(matches!(result.error(), Some(ConsumerError::Connectivity(_))));
    assert_eq!(harness.memory.sessions_opened(), 0);
}

#[tokio::test]
async fn test_batch_size_clamped_to_ceiling() {
    let harness = Harness::new();
    let bodies: Vec<String> = (0..2100).map(|n| format!(r#"{{"n":{n}}}"#)).collect();
    let refs: Vec<&str> = bodies.iter().map(String::as_str).collect();
    harness.seed(&refs);
    let config = harness.config.clone().with_max_messages(5000);

    let result = harness.controller().run_cycle(&config, &credential()).await;

    assert!(result.is_ok());
    assert_eq!(result.received_count, 2047);
    assert_eq!(result.messages.len(), 2047);
    assert_eq!(harness.memory.queue_length(QUEUE), 53);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("2047"));
}

#[tokio::test]
async fn test_oversized_receive_timeout_is_configuration_error() {
    let harness = Harness::new();
    harness.seed(&["a"]);
    let config = harness.config.clone().with_receive_timeout_seconds(1e20);

    let result = harness.controller().run_cycle(&config, &credential()).await;

    assert!(matches!(result.error(), Some(ConsumerError::Configuration(_))));
    assert_eq!(result.received_count, 0);
    assert_eq!(harness.memory.sessions_opened(), 0);
    assert_eq!(harness.memory.queue_length(QUEUE), 1);

    let state = ConsumerState::load(&harness.store).await.unwrap();
    assert!(state.last_check_time.is_some());
}

#[tokio::test]
async fn test_batch_bounded_by_max_messages() {
    let harness = Harness::new();
    harness.seed(&["a", "b", "c"]);
    let config = harness.config.clone().with_max_messages(2);

    let result = harness.controller().run_cycle(&config, &credential()).await;

    assert_eq!(result.received_count, 2);
    assert_eq!(harness.memory.queue_length(QUEUE), 1);
}

#[tokio::test]
async fn test_close_failure_never_masks_outcome() {
    let harness = Harness::new();
    harness.seed(&["a"]);
    harness.memory.fail_close(true);

    let result = harness
        .controller()
        .run_cycle(&harness.config, &credential())
        .await;

    assert!(result.is_ok());
    assert_eq!(result.messages.len(), 1);
    assert_eq!(harness.memory.sessions_closed(), 1);
}

#[tokio::test]
async fn test_missing_queue_is_configuration_error() {
    let harness = Harness::new();
    let mut config = harness.config.clone();
    config.queue_name = "does-not-exist".to_string();

    let result = harness.controller().run_cycle(&config, &credential()).await;

    assert!(matches!(result.error(), Some(ConsumerError::Configuration(_))));
}

#[tokio::test]
async fn test_sessions_released_across_many_cycles() {
    let harness = Harness::new();
    let controller = harness.controller();

    for round in 0..20 {
        if round % 3 == 0 {
            harness.memory.fail_receive(Some("flaky"));
        } else {
            harness.memory.fail_receive(None);
        }
        harness.seed(&["x"]);
        let _ = controller.run_cycle(&harness.config, &credential()).await;
    }

    assert_eq!(harness.memory.sessions_opened(), 20);
    assert_eq!(harness.memory.open_sessions(), 0);
}
