//! Event — the wire vocabulary of the drawing relay.
//!
//! ARCHITECTURE
//! ============
//! Every websocket text message carries exactly one named event, encoded as
//! `{"event": <name>, "data": <payload>}`. Clients send `Inbound` events; the
//! relay stamps them with the sender's connection id and a receipt timestamp
//! and fans them out as `Outbound` events.
//!
//! DESIGN
//! ======
//! - Geometry is required. A stroke without both endpoints, or a cursor
//!   without `x`/`y`, fails to parse and is dropped by the caller.
//! - Everything else in a stroke or cursor payload is passed through
//!   untouched via the flattened `extra` map.
//! - The relay never stores any of these values past one dispatch.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// FIELD CONSTANTS
// =============================================================================

/// Outbound key carrying the sender's connection id.
pub const FIELD_ID: &str = "id";

/// Outbound key carrying the server receipt time.
pub const FIELD_TIMESTAMP: &str = "timestamp";

/// Outbound cursor key carrying the sender's registered display name.
pub const FIELD_USERNAME: &str = "username";

// =============================================================================
// PAYLOADS
// =============================================================================

/// Unrecognised payload keys, forwarded verbatim.
pub type Extra = HashMap<String, serde_json::Value>;

/// A canvas coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// One freehand segment: the line from `last_pos` to `pos`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub last_pos: Point,
    pub pos: Point,
    pub color: String,
    pub size: f64,
    /// Name the client attached itself. Not checked against the registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A live pointer position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorSample {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Identification the relay adds to every forwarded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    pub id: Uuid,
    /// Milliseconds since Unix epoch, taken when the relay received the event.
    pub timestamp: i64,
}

impl Stamp {
    /// Stamp an event from `id` received right now.
    #[must_use]
    pub fn now(id: Uuid) -> Self {
        Self { id, timestamp: now_ms() }
    }
}

/// A stroke as rebroadcast to peers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StampedStroke {
    #[serde(flatten)]
    pub stroke: Stroke,
    #[serde(flatten)]
    pub stamp: Stamp,
}

/// A cursor sample as rebroadcast to peers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StampedCursor {
    #[serde(flatten)]
    pub sample: CursorSample,
    #[serde(flatten)]
    pub stamp: Stamp,
    /// Registry name of the sender; omitted while the sender is unnamed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

// =============================================================================
// EVENTS
// =============================================================================

/// Relayed event kinds. Each has its own echo policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Draw,
    Cursor,
    Clear,
}

impl EventKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draw => "draw",
            Self::Cursor => "cursor",
            Self::Clear => "clear",
        }
    }
}

/// Client → server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum Inbound {
    /// Set or replace this connection's display name.
    SetUsername(String),
    Draw(Stroke),
    Cursor(CursorSample),
    /// No payload; `data` may be absent or `null`.
    Clear,
}

impl Inbound {
    /// The relayed kind, or `None` for registry-only events.
    #[must_use]
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            Self::SetUsername(_) => None,
            Self::Draw(_) => Some(EventKind::Draw),
            Self::Cursor(_) => Some(EventKind::Cursor),
            Self::Clear => Some(EventKind::Clear),
        }
    }
}

/// Server → client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum Outbound {
    /// First message on every socket: the connection's own id.
    Connected { id: Uuid },
    Draw(StampedStroke),
    Cursor(StampedCursor),
    Clear(Stamp),
    /// Roster of named connections as `[id, name]` pairs.
    UserList(Vec<(Uuid, String)>),
    /// Number of open connections, named or not.
    UserCount(usize),
}

impl Outbound {
    /// Wire name, for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Draw(_) => "draw",
            Self::Cursor(_) => "cursor",
            Self::Clear(_) => "clear",
            Self::UserList(_) => "userList",
            Self::UserCount(_) => "userCount",
        }
    }

    /// High-volume events that are not logged per send.
    #[must_use]
    pub fn is_chatty(&self) -> bool {
        matches!(self, Self::Draw(_) | Self::Cursor(_))
    }
}

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

#[cfg(test)]
#[path = "event_test.rs"]
mod tests;
