//! Tests for the status sink state machine

use super::*;
use futures::StreamExt;

fn sink_with(messages: Vec<Message<u32>>) -> StatusSink<u32> {
    let (tx, rx) = mpsc::unbounded_channel();
    for message in messages {
        tx.send(message).unwrap();
    }
    StatusSink::unbounded(rx)
}

#[tokio::test]
async fn test_was_empty_before_end_is_premature() {
    let (tx, rx) = mpsc::channel(4);
    let mut sink = StatusSink::bounded(rx);

    assert!(matches!(sink.was_empty(), Err(PipelineError::PrematureQuery)));

    tx.send(Ok(1u32)).await.unwrap();
    assert_eq!(sink.recv().await.unwrap().unwrap(), 1);
    assert!(sink.received_any());
    assert!(matches!(sink.was_empty(), Err(PipelineError::PrematureQuery)));

    drop(tx);
    assert!(sink.recv().await.is_none());
    assert!(!sink.was_empty().unwrap());
}

#[tokio::test]
async fn test_empty_stream_was_empty() {
    let mut sink = sink_with(Vec::new());

    assert!(sink.recv().await.is_none());
    assert!(sink.is_finished());
    assert!(sink.was_empty().unwrap());
    assert!(matches!(sink.state(), SinkState::Finished(c) if c.was_empty()));
}

#[tokio::test]
async fn test_finished_state_is_final() {
    let mut sink = sink_with(vec![Ok(7)]);

    let items: Vec<_> = (&mut sink).collect().await;
    assert_eq!(items.len(), 1);
    assert!(!sink.was_empty().unwrap());

    // Polling past the end changes nothing
    assert!(sink.recv().await.is_none());
    assert!(sink.recv().await.is_none());
    assert!(!sink.was_empty().unwrap());
}

#[tokio::test]
async fn test_error_signal_fails_sink() {
    let mut sink = sink_with(vec![
        Ok(1),
        Err(PipelineError::upstream("lost connection")),
        Ok(2),
    ]);

    assert!(sink.recv().await.unwrap().is_ok());
    assert!(sink.recv().await.unwrap().is_err());

    // The stream ends after the error, later chunks are not delivered
    assert!(sink.recv().await.is_none());
    assert!(matches!(sink.state(), SinkState::Failed(e) if e.is_upstream()));

    let err = sink.was_empty().unwrap_err();
    assert!(err.to_string().contains("lost connection"));
}
