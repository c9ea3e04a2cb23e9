use super::*;
use crate::state::test_helpers::{connect_client, test_app_state};
use serde_json::json;

#[tokio::test]
async fn healthz_reports_connection_counts() {
    let state = test_app_state();
    let (a, _rx_a) = connect_client(&state).await;
    let (_b, _rx_b) = connect_client(&state).await;
    state.registry.set_name(a, "Alice").await.unwrap();

    let Json(body) = healthz(State(state)).await;
    assert_eq!(body, json!({"status": "ok", "connections": 2, "named": 1}));
}

#[tokio::test]
async fn users_lists_only_named_connections() {
    let state = test_app_state();
    let (a, _rx_a) = connect_client(&state).await;
    let (_b, _rx_b) = connect_client(&state).await;
    state.registry.set_name(a, "Alice").await.unwrap();

    let Json(roster) = users(State(state)).await;
    assert_eq!(roster, vec![(a, "Alice".to_owned())]);
}

#[tokio::test]
async fn users_is_empty_without_connections() {
    let Json(roster) = users(State(test_app_state())).await;
    assert!(roster.is_empty());
}
