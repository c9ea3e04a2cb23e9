//! Relay service — stamp inbound drawing events and fan them out.
//!
//! DESIGN
//! ======
//! Stateless: nothing here outlives one call. Each relayed kind gets the
//! sender's connection id and the receipt timestamp; cursors additionally
//! get the sender's registry name. Recipients are every connection, minus
//! the sender when that kind's `EchoPolicy` says so.
//!
//! Client-supplied keys that collide with stamped ones are dropped so the
//! forwarded object never carries two `id` or `timestamp` fields.

use tracing::debug;
use uuid::Uuid;

use crate::event::{
    CursorSample, EventKind, Extra, FIELD_ID, FIELD_TIMESTAMP, FIELD_USERNAME, Outbound, Stamp, StampedCursor,
    StampedStroke, Stroke,
};
use crate::state::AppState;

/// Build the forwarded draw event.
#[must_use]
pub fn stamp_stroke(mut stroke: Stroke, stamp: Stamp) -> Outbound {
    strip_reserved(&mut stroke.extra);
    Outbound::Draw(StampedStroke { stroke, stamp })
}

/// Build the forwarded cursor event. `username` comes from the registry,
/// never from the payload.
#[must_use]
pub fn stamp_cursor(mut sample: CursorSample, stamp: Stamp, username: Option<String>) -> Outbound {
    strip_reserved(&mut sample.extra);
    sample.extra.remove(FIELD_USERNAME);
    Outbound::Cursor(StampedCursor { sample, stamp, username })
}

/// Build the forwarded clear signal.
#[must_use]
pub fn stamp_clear(stamp: Stamp) -> Outbound {
    Outbound::Clear(stamp)
}

fn strip_reserved(extra: &mut Extra) {
    extra.remove(FIELD_ID);
    extra.remove(FIELD_TIMESTAMP);
}

/// Fan an already-stamped event out according to the kind's echo policy.
/// Returns the number of connections it was queued for.
pub async fn relay(state: &AppState, kind: EventKind, sender: Uuid, event: &Outbound) -> usize {
    let exclude = state.config.echo.for_kind(kind).excluded(sender);
    let delivered = state.registry.broadcast(event, exclude).await;
    debug!(client_id = %sender, event = kind.as_str(), delivered, "relay: fanned out");
    delivered
}

#[cfg(test)]
#[path = "relay_test.rs"]
mod tests;
