use super::*;
use crate::config::{EchoPolicies, EchoPolicy, RelayConfig};
use crate::event::Point;
use crate::state::test_helpers::{connect_client, drain, test_app_state, test_app_state_with};
use serde_json::json;

fn stroke() -> Stroke {
    Stroke {
        last_pos: Point { x: 0.0, y: 0.0 },
        pos: Point { x: 10.0, y: 10.0 },
        color: "#FF0000".into(),
        size: 5.0,
        username: None,
        extra: Extra::new(),
    }
}

fn cursor() -> CursorSample {
    CursorSample { x: 3.0, y: 4.0, color: Some("#00FF00".into()), extra: Extra::new() }
}

async fn relay_draw(state: &AppState, sender: Uuid, stroke: Stroke, stamp: Stamp) -> usize {
    relay(state, EventKind::Draw, sender, &stamp_stroke(stroke, stamp)).await
}

async fn relay_cursor(state: &AppState, sender: Uuid, sample: CursorSample) -> usize {
    let username = state.registry.name_of(sender).await;
    relay(state, EventKind::Cursor, sender, &stamp_cursor(sample, Stamp::now(sender), username)).await
}

async fn relay_clear(state: &AppState, sender: Uuid) -> usize {
    relay(state, EventKind::Clear, sender, &stamp_clear(Stamp::now(sender))).await
}

// =============================================================================
// Stamping
// =============================================================================

#[test]
fn stamp_stroke_drops_spoofed_id_and_timestamp() {
    let mut s = stroke();
    s.extra.insert("id".into(), json!("spoofed"));
    s.extra.insert("timestamp".into(), json!(1));
    s.extra.insert("pressure".into(), json!(0.5));
    let stamp = Stamp { id: Uuid::new_v4(), timestamp: 100 };

    let Outbound::Draw(out) = stamp_stroke(s, stamp) else {
        panic!("expected draw");
    };
    assert_eq!(out.stamp, stamp);
    assert!(!out.stroke.extra.contains_key("id"));
    assert!(!out.stroke.extra.contains_key("timestamp"));
    assert_eq!(out.stroke.extra.get("pressure"), Some(&json!(0.5)));

    let value = serde_json::to_value(Outbound::Draw(out)).unwrap();
    assert_eq!(value["data"]["id"], stamp.id.to_string());
    assert_eq!(value["data"]["timestamp"], 100);
}

#[test]
fn stamp_cursor_takes_username_from_registry_only() {
    let mut sample = cursor();
    sample.extra.insert("username".into(), json!("Mallory"));
    let stamp = Stamp { id: Uuid::new_v4(), timestamp: 5 };

    let Outbound::Cursor(out) = stamp_cursor(sample.clone(), stamp, None) else {
        panic!("expected cursor");
    };
    assert_eq!(out.username, None);
    assert!(!out.sample.extra.contains_key("username"));

    let Outbound::Cursor(out) = stamp_cursor(sample, stamp, Some("Alice".into())) else {
        panic!("expected cursor");
    };
    assert_eq!(out.username.as_deref(), Some("Alice"));
}

#[test]
fn stamp_clear_is_bare_stamp() {
    let stamp = Stamp { id: Uuid::new_v4(), timestamp: 1 };
    assert_eq!(stamp_clear(stamp), Outbound::Clear(stamp));
}

// =============================================================================
// Fan-out
// =============================================================================

#[tokio::test]
async fn draw_reaches_everyone_including_sender_by_default() {
    let state = test_app_state();
    let (a, mut rx_a) = connect_client(&state).await;
    let (_b, mut rx_b) = connect_client(&state).await;
    drain(&mut rx_a);
    drain(&mut rx_b);

    let stamp = Stamp::now(a);
    assert_eq!(relay_draw(&state, a, stroke(), stamp).await, 2);

    let expected = Outbound::Draw(StampedStroke { stroke: stroke(), stamp });
    assert_eq!(drain(&mut rx_a), vec![expected.clone()]);
    assert_eq!(drain(&mut rx_b), vec![expected]);
}

#[tokio::test]
async fn exclude_policy_skips_sender_for_that_kind_only() {
    let config = RelayConfig {
        echo: EchoPolicies { draw: EchoPolicy::ExcludeSender, ..EchoPolicies::default() },
        ..RelayConfig::default()
    };
    let state = test_app_state_with(config);
    let (a, mut rx_a) = connect_client(&state).await;
    let (_b, mut rx_b) = connect_client(&state).await;
    drain(&mut rx_a);
    drain(&mut rx_b);

    assert_eq!(relay_draw(&state, a, stroke(), Stamp::now(a)).await, 1);
    assert!(drain(&mut rx_a).is_empty());
    assert_eq!(drain(&mut rx_b).len(), 1);

    assert_eq!(relay_clear(&state, a).await, 2);
    assert_eq!(drain(&mut rx_a).len(), 1);
}

#[tokio::test]
async fn cursor_from_unnamed_sender_is_anonymous() {
    let state = test_app_state();
    let (a, mut rx_a) = connect_client(&state).await;
    drain(&mut rx_a);

    relay_cursor(&state, a, cursor()).await;

    let events = drain(&mut rx_a);
    let [Outbound::Cursor(out)] = events.as_slice() else {
        panic!("expected one cursor event, got {events:?}");
    };
    assert_eq!(out.username, None);
    assert_eq!(out.stamp.id, a);
}

#[tokio::test]
async fn cursor_from_named_sender_carries_name() {
    let state = test_app_state();
    let (a, mut rx_a) = connect_client(&state).await;
    let (_b, mut rx_b) = connect_client(&state).await;
    state.registry.set_name(a, "Alice").await.unwrap();
    drain(&mut rx_a);
    drain(&mut rx_b);

    relay_cursor(&state, a, cursor()).await;

    let events = drain(&mut rx_b);
    let [Outbound::Cursor(out)] = events.as_slice() else {
        panic!("expected one cursor event, got {events:?}");
    };
    assert_eq!(out.username.as_deref(), Some("Alice"));
}

#[tokio::test]
async fn clear_twice_yields_two_broadcasts() {
    let state = test_app_state();
    let (a, mut rx_a) = connect_client(&state).await;
    drain(&mut rx_a);

    relay_clear(&state, a).await;
    relay_clear(&state, a).await;

    let events = drain(&mut rx_a);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| matches!(e, Outbound::Clear(s) if s.id == a)));
}
