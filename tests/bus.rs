mod common;

use common::{test_bus, test_bus_with};
use msgflow::bus::BusConfig;
use proptest::prelude::*;
use serde_json::json;

#[tokio::test]
async fn get_data_returns_oldest_first() {
    let (_, bus) = test_bus();
    for i in 1..=5 {
        bus.send_data("k", json!(i)).await.unwrap();
    }
    for i in 1..=5 {
        assert_eq!(bus.get_data("k").await.unwrap(), Some(json!(i)));
    }
    assert_eq!(bus.get_data("k").await.unwrap(), None);
}

#[tokio::test]
async fn get_data_many_returns_what_is_available() {
    let (_, bus) = test_bus();
    bus.send_data("k", json!("x")).await.unwrap();
    bus.send_data("k", json!("y")).await.unwrap();

    let values = bus.get_data_many("k", 10).await.unwrap();
    assert_eq!(values, vec![json!("x"), json!("y")]);
    assert!(bus.get_data_many("k", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn has_data_checks_count_threshold() {
    let (_, bus) = test_bus();
    assert!(!bus.has_data("k", 1).await.unwrap());

    bus.send_data("k", json!(1)).await.unwrap();
    bus.send_data("k", json!(2)).await.unwrap();

    assert!(bus.has_data("k", 1).await.unwrap());
    assert!(bus.has_data("k", 2).await.unwrap());
    assert!(!bus.has_data("k", 3).await.unwrap());
}

#[tokio::test]
async fn overflow_evicts_oldest_entries() {
    let (_, bus) = test_bus_with(BusConfig::default().with_queue_maxlen(5));
    for i in 0..8 {
        bus.send_data("k", json!(i)).await.unwrap();
    }

    let remaining = bus.get_data_many("k", 100).await.unwrap();
    assert_eq!(
        remaining,
        vec![json!(3), json!(4), json!(5), json!(6), json!(7)],
        "only the newest maxlen entries survive, oldest are unrecoverable"
    );
}

#[tokio::test]
async fn keys_are_independent() {
    let (_, bus) = test_bus();
    bus.send_data("one", json!(1)).await.unwrap();
    bus.send_data("two", json!(2)).await.unwrap();

    assert_eq!(bus.get_data("one").await.unwrap(), Some(json!(1)));
    assert_eq!(bus.get_data("two").await.unwrap(), Some(json!(2)));
}

proptest! {
    #[test]
    fn queue_preserves_fifo(values in proptest::collection::vec(any::<u32>(), 0..50)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            let (_, bus) = test_bus();
            for v in &values {
                bus.send_data("k", json!(v)).await.unwrap();
            }
            let popped = bus.get_data_many("k", values.len().max(1)).await.unwrap();
            let expected: Vec<_> = values.iter().map(|v| json!(v)).collect();
            assert_eq!(popped, expected);
        });
    }

    #[test]
    fn overflow_keeps_newest_suffix(values in proptest::collection::vec(any::<u32>(), 0..150)) {
        const MAXLEN: usize = 64;
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            let (_, bus) = test_bus_with(BusConfig::default().with_queue_maxlen(MAXLEN));
            for v in &values {
                bus.send_data("k", json!(v)).await.unwrap();
            }
            let kept = bus.get_data_many("k", values.len().max(1)).await.unwrap();
            let start = values.len().saturating_sub(MAXLEN);
            let expected: Vec<_> = values[start..].iter().map(|v| json!(v)).collect();
            assert_eq!(kept, expected);
        });
    }
}
