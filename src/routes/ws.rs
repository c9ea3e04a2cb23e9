//! WebSocket handler — per-connection relay loop.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID, registers an outbound queue, and
//! enters a `select!` loop:
//! - Incoming client events → parse + dispatch by event kind
//! - Queued events from the registry → forward to client
//! - Keepalive tick → ping, or drop the socket if it has gone silent
//!
//! Handler functions only build an `Outcome`. The dispatch layer decides
//! recipients from the kind's echo policy and hands the event to the
//! registry. Events from one connection are handled strictly in receipt
//! order, so peers see one sender's strokes in the order they were drawn.
//!
//! LIFECYCLE
//! =========
//! 1. Origin check → upgrade or 403
//! 2. Send `connected { id }`, register → `userCount` to all
//! 3. `setUsername` → `userList` to all; draw/cursor/clear → stamped fan-out
//! 4. Close, error, idle timeout, or task abort → `Registration` dropped →
//!    unregister → `userList` + `userCount`

use axum::body::Bytes;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::event::{EventKind, Inbound, Outbound, Stamp};
use crate::services::registry::Registry;
use crate::services::relay;
use crate::state::AppState;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result of handling one inbound event.
#[derive(Debug)]
enum Outcome {
    /// Fan out to all connections, subject to the kind's echo policy.
    Relay { kind: EventKind, event: Outbound },
    /// The registry already notified everyone.
    Handled,
}

// =============================================================================
// REGISTRATION
// =============================================================================

/// A connection's registry entry. Dropping it unregisters the connection,
/// so the entry goes away however the socket task ends.
struct Registration {
    registry: Registry,
    client_id: Uuid,
}

impl Registration {
    /// Register `client_id` and return the guard with the new connection count.
    async fn register(registry: Registry, client_id: Uuid, tx: mpsc::Sender<Outbound>) -> (Self, usize) {
        let connections = registry.register(client_id, tx).await;
        (Self { registry, client_id }, connections)
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(client_id = %self.client_id, "ws: no runtime to unregister on");
            return;
        };
        let registry = self.registry.clone();
        let client_id = self.client_id;
        handle.spawn(async move {
            registry.unregister(client_id).await;
            info!(%client_id, "ws: client disconnected");
        });
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, headers: HeaderMap, ws: WebSocketUpgrade) -> Response {
    // Browsers always send Origin; other clients may not and are let through.
    if let Some(origin) = headers.get(header::ORIGIN) {
        let permitted = origin
            .to_str()
            .is_ok_and(|o| state.config.allowed_origins.permits(o));
        if !permitted {
            warn!(origin = ?origin, "ws: origin rejected");
            return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
        }
    }

    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();

    // Per-connection queue fed by registry broadcasts.
    let (client_tx, mut client_rx) = mpsc::channel::<Outbound>(state.config.client_queue_capacity);

    if send_event(&mut socket, &Outbound::Connected { id: client_id })
        .await
        .is_err()
    {
        return;
    }

    let (_registration, connections) = Registration::register(state.registry.clone(), client_id, client_tx).await;
    info!(%client_id, connections, "ws: client connected");

    let ping_interval = state.config.ping_interval;
    let idle_limit = state.config.idle_limit();
    let mut keepalive = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                last_seen = Instant::now();
                match msg {
                    Message::Text(text) => process_inbound_text(&state, client_id, text.as_str()).await,
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(event) = client_rx.recv() => {
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
            _ = keepalive.tick() => {
                if last_seen.elapsed() > idle_limit {
                    info!(%client_id, "ws: client timed out");
                    break;
                }
                if socket.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Parse one inbound text message, handle it, and apply the outcome.
///
/// Malformed events are logged and dropped; nothing is sent back and the
/// connection stays open.
async fn process_inbound_text(state: &AppState, client_id: Uuid, text: &str) {
    let event: Inbound = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: dropping malformed event");
            return;
        }
    };
    let stamp = Stamp::now(client_id);

    // Cursor traffic is too chatty to log per event.
    if event.kind() != Some(EventKind::Cursor) {
        debug!(%client_id, kind = ?event.kind(), "ws: recv event");
    }

    let outcome = match event {
        Inbound::SetUsername(name) => handle_set_username(state, client_id, name).await,
        Inbound::Draw(stroke) => Outcome::Relay { kind: EventKind::Draw, event: relay::stamp_stroke(stroke, stamp) },
        Inbound::Cursor(sample) => {
            let username = state.registry.name_of(client_id).await;
            Outcome::Relay { kind: EventKind::Cursor, event: relay::stamp_cursor(sample, stamp, username) }
        }
        Inbound::Clear => Outcome::Relay { kind: EventKind::Clear, event: relay::stamp_clear(stamp) },
    };

    if let Outcome::Relay { kind, event } = outcome {
        relay::relay(state, kind, client_id, &event).await;
    }
}

async fn handle_set_username(state: &AppState, client_id: Uuid, name: String) -> Outcome {
    if let Err(e) = state.registry.set_name(client_id, name).await {
        // Only possible when a rename races this connection's own teardown.
        debug!(%client_id, error = %e, "ws: rename ignored");
    }
    Outcome::Handled
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_event(socket: &mut WebSocket, event: &Outbound) -> Result<(), ()> {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, event = event.name(), "ws: failed to serialize event");
            return Err(());
        }
    };
    if !event.is_chatty() {
        debug!(event = event.name(), "ws: send event");
    }
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
