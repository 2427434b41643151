//! The real-time fan-out hub.
//!
//! One coordinator task owns the connection registry and all room
//! subscriptions; per-connection read and write loops talk to it over an
//! intent channel. See `coordinator` for the actor, `server` for the
//! WebSocket plumbing.

pub mod connection;
pub mod coordinator;
pub mod events;
pub mod server;
