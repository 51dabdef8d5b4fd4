//! Runtime for executing conversation turns
//!
//! The dispatcher owns all I/O around the pure state machine: session
//! reads and writes, persistence and weather calls, and outbound messages.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{
    DispatchSettings, Dispatcher, DEFAULT_NOTE_PACING, DEFAULT_REQUEST_TIMEOUT,
};
pub use traits::*;

use crate::session::MemorySessionStore;
use crate::telegram::TelegramClient;
use crate::weather::OpenWeatherClient;

/// Type alias for the production dispatcher with concrete implementations
pub type ProductionDispatcher =
    Dispatcher<MemorySessionStore, DatabasePersistence, OpenWeatherClient, TelegramClient>;
