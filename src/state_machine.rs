//! Conversation flow state machine
//!
//! Pure transitions over one chat's flow state. The dispatcher in
//! `runtime` owns I/O and feeds collaborator results back in as events.

mod effect;
pub mod event;
pub mod menu;
pub mod state;
pub mod text;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{CategoryIntent, Effect, Listing, NoteListing, StoreFailure, StoreRequest};
pub use event::{Event, Inbound, Media, Sender, StoreOutcome};
pub use menu::{Command, Keyboard};
pub use state::{CategoryPurpose, FlowState, NotePurpose, Pending, Purpose, TurnContext};
pub use transition::{transition, FlowError, TransitionResult};
