//! HTTP-level tests for the tracker, backed by the in-memory store.

use contribute_common::contribution::NewContribution;
use contribute_common::network::Network;
use contribute_integration::{spawn_tracker, ALICE};
use contribute_tracker::store::MemoryContributionStore;
use contribute_wallet::tracker_api::{TrackerClient, TrackerError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

fn contribution(tx_hash: &str, sender: &str, amount: Decimal) -> NewContribution {
    NewContribution {
        sender: sender.to_string(),
        tx_hash: tx_hash.to_string(),
        network: Network::Ethereum,
        native_amount: amount,
        converted_amount: None,
        recorded_at: None,
    }
}

#[tokio::test]
async fn test_create_returns_201_with_record() {
    let tracker = spawn_tracker(MemoryContributionStore::new()).await;
    let resp = reqwest::Client::new()
        .post(tracker.url("/contributions"))
        .json(&json!({
            "from": "0xAbC",
            "txHash": "0x01",
            "network": "ethereum",
            "amountEth": 0.05,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["from"], "0xabc");
    assert_eq!(body["txHash"], "0x01");
    assert_eq!(body["network"], "ethereum");
    assert_eq!(body["amountEth"], "0.05");
    assert_eq!(body["tokenAmount"], "50");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_duplicate_hash_is_409() {
    let tracker = spawn_tracker(MemoryContributionStore::new()).await;
    let client = TrackerClient::new(tracker.base_url());

    client
        .save_contribution(&contribution("0xdup", ALICE, dec!(1)))
        .await
        .unwrap();
    let err = client
        .save_contribution(&contribution("0xdup", "0xother", dec!(2)))
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::DuplicateTransaction(_)), "{err}");

    let totals = client.totals().await.unwrap();
    assert_eq!(totals.count, 1);
    assert_eq!(totals.total_native, dec!(1));
}

#[tokio::test]
async fn test_duplicate_hash_differing_in_case_is_409() {
    let tracker = spawn_tracker(MemoryContributionStore::new()).await;
    let http = reqwest::Client::new();
    let body = |tx_hash: &str| {
        json!({ "from": ALICE, "txHash": tx_hash, "network": "ethereum", "amountEth": 1 })
    };

    let first = http
        .post(tracker.url("/contributions"))
        .json(&body("0xABCDEF01"))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 201);
    let stored: Value = first.json().await.unwrap();
    assert_eq!(stored["txHash"], "0xabcdef01");

    let second = http
        .post(tracker.url("/contributions"))
        .json(&body("0xabcdef01"))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 409);

    let totals = TrackerClient::new(tracker.base_url()).totals().await.unwrap();
    assert_eq!(totals.count, 1);
}

#[tokio::test]
async fn test_amounts_keep_full_precision_over_http() {
    let tracker = spawn_tracker(MemoryContributionStore::new()).await;
    let client = TrackerClient::new(tracker.base_url());
    let stored = client
        .save_contribution(&contribution("0x01", ALICE, dec!(0.123456789012345678)))
        .await
        .unwrap();
    assert_eq!(stored.native_amount, dec!(0.123456789012345678));
    assert_eq!(
        client.totals().await.unwrap().total_native,
        dec!(0.123456789012345678)
    );
}

#[tokio::test]
async fn test_validation_errors_are_400() {
    let tracker = spawn_tracker(MemoryContributionStore::new()).await;
    let http = reqwest::Client::new();

    let cases = [
        json!({ "txHash": "0x1", "network": "ethereum", "amountEth": 1 }),
        json!({ "from": "0xa", "network": "ethereum", "amountEth": 1 }),
        json!({ "from": "0xa", "txHash": "0x1", "network": "bitcoin", "amountEth": 1 }),
        json!({ "from": "0xa", "txHash": "0x1", "network": "ethereum" }),
        json!({ "from": "0xa", "txHash": "0x1", "network": "ethereum", "amountEth": -1 }),
    ];
    for case in cases {
        let resp = http
            .post(tracker.url("/contributions"))
            .json(&case)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "{case}");
        let body: Value = resp.json().await.unwrap();
        assert!(body["message"].is_string(), "{case}");
    }

    let resp = http
        .post(tracker.url("/contributions"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let totals = TrackerClient::new(tracker.base_url()).totals().await.unwrap();
    assert_eq!(totals.count, 0);
}

#[tokio::test]
async fn test_history_is_case_insensitive_and_newest_first() {
    let tracker = spawn_tracker(MemoryContributionStore::new()).await;
    let client = TrackerClient::new(tracker.base_url());

    let mut first = contribution("0x01", "0xAbC", dec!(0.01));
    first.recorded_at = Some("2024-01-01T00:00:00Z".parse().unwrap());
    let mut second = contribution("0x02", "0xabc", dec!(0.02));
    second.recorded_at = Some("2024-01-02T00:00:00Z".parse().unwrap());
    client.save_contribution(&first).await.unwrap();
    client.save_contribution(&second).await.unwrap();
    client
        .save_contribution(&contribution("0x03", "0xdef", dec!(5)))
        .await
        .unwrap();

    let mine = client.my_contributions("0xABC").await.unwrap();
    let hashes: Vec<_> = mine.iter().map(|c| c.tx_hash.as_str()).collect();
    assert_eq!(hashes, ["0x02", "0x01"]);
    assert!(mine.iter().all(|c| c.sender == "0xabc"));

    assert!(client.my_contributions("0xnobody").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_history_without_address_is_empty() {
    let tracker = spawn_tracker(MemoryContributionStore::new()).await;
    TrackerClient::new(tracker.base_url())
        .save_contribution(&contribution("0x01", ALICE, dec!(1)))
        .await
        .unwrap();

    let body: Value = reqwest::get(tracker.url("/contributions/me"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_totals_match_example() {
    let tracker = spawn_tracker(MemoryContributionStore::new()).await;
    let client = TrackerClient::new(tracker.base_url());

    let empty = client.totals().await.unwrap();
    assert_eq!(empty.total_native, Decimal::ZERO);
    assert_eq!(empty.total_converted, Decimal::ZERO);

    client
        .save_contribution(&contribution("0x01", ALICE, dec!(0.05)))
        .await
        .unwrap();
    let totals = client.totals().await.unwrap();
    assert_eq!(totals.total_native, dec!(0.05));
    assert_eq!(totals.total_converted, dec!(50));
    assert_eq!(totals.count, 1);

    let raw: Value = reqwest::get(tracker.url("/contributions/total"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(raw["totalEth"], "0.05");
    assert_eq!(raw["totalTokens"], "50");
}

#[tokio::test]
async fn test_racing_duplicate_posts_record_once() {
    let tracker = spawn_tracker(MemoryContributionStore::new()).await;
    let client = TrackerClient::new(tracker.base_url());

    let attempts = (0..8).map(|i| {
        let client = client.clone();
        async move {
            client
                .save_contribution(&contribution("0xrace", &format!("0x{i}"), dec!(1)))
                .await
        }
    });
    let results = futures::future::join_all(attempts).await;

    let ok = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(TrackerError::DuplicateTransaction(_))))
        .count();
    assert_eq!(ok, 1);
    assert_eq!(duplicates, 7);
    assert_eq!(client.totals().await.unwrap().count, 1);
}

#[tokio::test]
async fn test_health_reports_store() {
    let tracker = spawn_tracker(MemoryContributionStore::new()).await;
    let body: Value = reqwest::get(tracker.url("/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
}
