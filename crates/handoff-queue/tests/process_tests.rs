// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batch draining behavior of the inbound queue.

use std::sync::Arc;

use handoff_core::{HandoffError, QueuedMessage};
use handoff_queue::InboundQueue;
use tokio::sync::Mutex;

fn msg(text: &str) -> QueuedMessage {
    QueuedMessage::new("u1".into(), "s1".into(), text, "en")
}

#[tokio::test]
async fn drains_at_most_batch_size() {
    let queue = InboundQueue::new(100);
    for i in 0..5 {
        queue.enqueue(msg(&format!("m{i}"))).await.unwrap();
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let handled = queue
        .process_queue(
            |m| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.lock().await.push(m.text);
                    Ok(())
                }
            },
            3,
        )
        .await
        .unwrap();

    assert_eq!(handled, 3);
    assert_eq!(*seen.lock().await, vec!["m0", "m1", "m2"]);
    assert_eq!(queue.size().await, 2);
}

#[tokio::test]
async fn failed_item_is_requeued_at_tail_and_error_propagates() {
    let queue = InboundQueue::new(100);
    queue.enqueue(msg("bad")).await.unwrap();
    queue.enqueue(msg("good")).await.unwrap();

    let result = queue
        .process_queue(
            |m| async move {
                if m.text == "bad" {
                    Err(HandoffError::Internal("handler exploded".into()))
                } else {
                    Ok(())
                }
            },
            10,
        )
        .await;

    assert!(matches!(result, Err(HandoffError::Internal(_))));
    // "good" was not touched; "bad" sits behind it with one recorded attempt.
    assert_eq!(queue.size().await, 2);
    assert_eq!(queue.dequeue().await.unwrap().text, "good");
    let requeued = queue.dequeue().await.unwrap();
    assert_eq!(requeued.text, "bad");
    assert_eq!(requeued.attempts, 1);
}

#[tokio::test]
async fn empty_queue_processes_nothing() {
    let queue = InboundQueue::new(1);
    let handled = queue
        .process_queue(|_| async { Ok(()) }, 10)
        .await
        .unwrap();
    assert_eq!(handled, 0);
}
