//! Real-time updates for the agent console
//!
//! Desk services publish events on a broadcast channel; the optional
//! WebSocket server forwards them to connected consoles.

mod events;
mod server;

pub use events::{EventType, RealtimeEvent, SubscriptionFilter};
pub use server::{RealtimeManager, RealtimeServer};
