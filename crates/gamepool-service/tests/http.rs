//! HTTP adapter integration tests.

mod common;

use common::TestHarness;
use gamepool_core::GameName;
use serde_json::{json, Value};

fn ids(body: &Value) -> Vec<i64> {
    body["data"]
        .as_array()
        .map(|rows| rows.iter().filter_map(|r| r["ID"].as_i64()).collect())
        .unwrap_or_default()
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn health_check() {
    let harness = TestHarness::new();

    let response = harness.server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "gamepool");
}

// ============================================================================
// Tables and inserts
// ============================================================================

#[tokio::test]
async fn create_game_rejects_bad_names() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/createNewGame")
        .json(&json!({ "game_name": "drop table" }))
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn store_failure_is_a_bad_request() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/query")
        .json(&json!({ "game_name": "nope", "cnt": 1 }))
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "store_error");
}

#[tokio::test]
async fn insert_persists_account() {
    let harness = TestHarness::new();
    harness.seed("fifa", 2).await;

    let rows = harness.store.rows(&GameName::new("fifa").unwrap()).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|a| a.online_time.is_some()));
}

#[tokio::test]
async fn insert_without_account_fails() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/insert")
        .json(&json!({ "game_name": "fifa" }))
        .await
        .assert_status_bad_request();
}

// ============================================================================
// Cursor consumption
// ============================================================================

#[tokio::test]
async fn query_no_update_walks_forward_then_exhausts() {
    let harness = TestHarness::new();
    harness.seed("fifa", 10).await;

    let response = harness
        .server
        .post("/queryNoUpdate")
        .json(&json!({ "game_name": "fifa", "cnt": 4 }))
        .await;
    response.assert_status_ok();
    assert_eq!(ids(&response.json()), vec![1, 2, 3, 4]);

    let response = harness
        .server
        .post("/queryNoUpdate")
        .json(&json!({ "game_name": "fifa", "cnt": 4 }))
        .await;
    assert_eq!(ids(&response.json()), vec![5, 6, 7, 8]);

    let response = harness
        .server
        .post("/queryNoUpdate")
        .json(&json!({ "game_name": "fifa", "cnt": 4 }))
        .await;
    response.assert_status_unauthorized();
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "exhausted");
}

#[tokio::test]
async fn descending_consumption_and_reset() {
    let harness = TestHarness::new();
    harness.seed("fifa", 10).await;

    let response = harness
        .server
        .post("/queryNoUpdate")
        .json(&json!({ "game_name": "fifa", "cnt": 3, "is_desc": true }))
        .await;
    assert_eq!(ids(&response.json()), vec![8, 9, 10]);

    let response = harness
        .server
        .post("/resetQueryCounter")
        .json(&json!({ "game_name": "fifa" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"], json!({ "asc": 0, "desc": 10 }));

    let response = harness
        .server
        .post("/queryNoUpdate")
        .json(&json!({ "game_name": "fifa", "cnt": 1, "is_desc": true }))
        .await;
    assert_eq!(ids(&response.json()), vec![10]);
}

// ============================================================================
// Filter query and cooldown channels
// ============================================================================

#[tokio::test]
async fn query_filters_on_zone_and_rating() {
    let harness = TestHarness::new();
    harness.seed("fifa", 0).await;

    for (name, zone, rating) in [("a1", "eu", 5), ("a2", "eu", 7), ("a3", "na", 5)] {
        harness
            .server
            .post("/insert")
            .json(&json!({
                "game_name": "fifa",
                "account": name,
                "b_zone": zone,
                "rating": rating,
            }))
            .await
            .assert_status_ok();
    }

    let response = harness
        .server
        .post("/query")
        .json(&json!({ "game_name": "fifa", "b_zone": "eu", "rating": 5, "cnt": 10 }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["account"], "a1");
}

#[tokio::test]
async fn query_rejects_unknown_channel() {
    let harness = TestHarness::new();
    harness.seed("fifa", 1).await;

    harness
        .server
        .post("/query")
        .json(&json!({ "game_name": "fifa", "talk_channel": 7 }))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn clear_talk_channel_reports_rows() {
    let harness = TestHarness::new();
    harness.seed("fifa", 3).await;

    let response = harness
        .server
        .post("/clearTalkChannel")
        .json(&json!({ "game_name": "fifa", "talk_channel": 3 }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["rows"], 3);
}

// ============================================================================
// Update and delete
// ============================================================================

#[tokio::test]
async fn update_then_delete() {
    let harness = TestHarness::new();
    harness.seed("fifa", 1).await;

    let response = harness
        .server
        .post("/update")
        .json(&json!({ "game_name": "fifa", "account": "acc1", "s_zone": "s9", "rating": 3 }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["rows"], 1);

    let game = GameName::new("fifa").unwrap();
    let row = harness.store.get_account(&game, "acc1").unwrap().unwrap();
    assert_eq!(row.s_zone, "s9");
    assert_eq!(row.rating, 3);

    let response = harness
        .server
        .post("/delete")
        .json(&json!({ "game_name": "fifa", "account": "acc1" }))
        .await;
    response.assert_status_ok();
    assert!(harness.store.rows(&game).unwrap().is_empty());
}
