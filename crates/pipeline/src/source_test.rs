//! Tests for sources

use super::*;
use crate::processor::Processor;
use std::convert::Infallible;

async fn drain<T>(source: Source<T>) -> Vec<Message<T>> {
    source.collect().await
}

#[tokio::test]
async fn test_iter_and_vec() {
    let messages = drain(Source::iter([1, 2, 3])).await;
    assert_eq!(messages.len(), 3);

    let items: Vec<u32> = drain(Source::from(vec![4, 5]))
        .await
        .into_iter()
        .map(|m| m.unwrap())
        .collect();
    assert_eq!(items, vec![4, 5]);

    assert!(drain(Source::<u32>::empty()).await.is_empty());

    let collected: Source<u32> = (1..=3).collect();
    assert_eq!(drain(collected).await.len(), 3);
}

#[tokio::test]
async fn test_from_results_maps_errors_to_upstream() {
    let source = Source::from_results(stream::iter(vec![
        Ok(1u32),
        Err("bad line 2".to_string()),
    ]));

    let messages = drain(source).await;
    assert!(matches!(messages[0], Ok(1)));
    let err = messages[1].as_ref().unwrap_err();
    assert!(err.is_upstream());
    assert!(err.to_string().contains("bad line 2"));
}

#[tokio::test]
async fn test_channel_send_and_end() {
    let (sender, source) = Source::channel(2);
    assert_eq!(sender.capacity(), 2);

    sender.send(1u32).await.unwrap();
    sender.send(2).await.unwrap();
    drop(sender);

    let items: Vec<u32> = drain(source).await.into_iter().map(|m| m.unwrap()).collect();
    assert_eq!(items, vec![1, 2]);
}

#[tokio::test]
async fn test_channel_fail_raises_error() {
    let (sender, source) = Source::channel(4);
    sender.send("a").await.unwrap();
    sender.fail("producer crashed").await.unwrap();

    let messages = drain(source).await;
    assert_eq!(messages.len(), 2);
    assert!(matches!(&messages[1], Err(e) if e.is_upstream()));
}

#[tokio::test]
async fn test_send_after_chain_gone_returns_item() {
    let (sender, source) = Source::channel(1);
    drop(source);

    assert!(sender.is_closed());
    assert_eq!(sender.send(42u32).await, Err(42));
    assert!(sender.fail("late").await.is_err());
}

#[tokio::test]
async fn test_from_receiver() {
    let (tx, rx) = mpsc::channel(4);
    tx.send(10u32).await.unwrap();
    drop(tx);

    let messages = drain(Source::from(rx)).await;
    assert!(matches!(messages.as_slice(), [Ok(10)]));
}

#[tokio::test]
async fn test_fan_out_copies_every_chunk() {
    let branches = Source::iter(vec![1u32, 2, 3]).fan_out(2);
    assert_eq!(branches.len(), 2);

    for branch in branches {
        let items: Vec<u32> = drain(branch).await.into_iter().map(|m| m.unwrap()).collect();
        assert_eq!(items, vec![1, 2, 3]);
    }
}

#[tokio::test]
async fn test_sink_feeds_next_chain() {
    let first = Processor::new().map(|x: u32, _| Ok::<_, Infallible>(x + 1));
    let second = Processor::new().map(|x: u32, _| Ok::<_, Infallible>(x * 10));

    let sink = first.start(vec![1, 2]);
    let items = second.collect(sink).await.unwrap();

    assert_eq!(items, vec![20, 30]);
}
