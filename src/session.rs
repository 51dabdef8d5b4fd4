//! Per-conversation session context
//!
//! Ephemeral, in-memory only. Losing a session means the user restarts the
//! flow they were in; nothing durable lives here.

mod reaper;
mod record;
mod store;

#[cfg(test)]
mod proptests;

pub use reaper::{Reaper, DEFAULT_SWEEP_INTERVAL};
pub use record::{MessageRef, Session, HISTORY_LIMIT};
pub use store::{ChatId, MemorySessionStore, SessionStore, StoreStats, DEFAULT_CAPACITY, DEFAULT_TTL};
