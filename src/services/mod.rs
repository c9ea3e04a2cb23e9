//! Domain services used by the websocket route.
//!
//! ARCHITECTURE
//! ============
//! `registry` owns connection membership and fan-out; `relay` turns inbound
//! drawing events into stamped outbound ones. The route layer only parses,
//! dispatches, and moves bytes on and off the socket.

pub mod registry;
pub mod relay;
