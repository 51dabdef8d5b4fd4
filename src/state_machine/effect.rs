//! Effects produced by state transitions

use super::menu::Keyboard;
use super::state::{CategoryPurpose, NotePurpose};
use crate::db::{NewNote, NewUser, Note};
use thiserror::Error;

/// Effects to be executed after a transition.
///
/// `Store` and `FetchWeather` run during the turn and feed their results
/// back as events. Everything else is outbound and is only emitted once the
/// session has been written.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send a message with a reply keyboard
    Reply { text: String, keyboard: Keyboard },

    /// Send a header, one preview per note (paced), then an optional footer
    ShowNotes {
        header: String,
        notes: Vec<Note>,
        footer: Option<String>,
        keyboard: Keyboard,
    },

    /// Delete the most recent message the bot sent to this chat
    DeleteLastReply,

    /// Call the persistence collaborator
    Store(StoreRequest),

    /// Call the weather collaborator
    FetchWeather { city: String },
}

impl Effect {
    pub fn reply(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Effect::Reply {
            text: text.into(),
            keyboard,
        }
    }

    pub fn store(request: StoreRequest) -> Self {
        Effect::Store(request)
    }

    /// Whether this effect talks to the transport
    pub fn is_outbound(&self) -> bool {
        matches!(
            self,
            Effect::Reply { .. } | Effect::ShowNotes { .. } | Effect::DeleteLastReply
        )
    }
}

/// Which category list is being loaded, and for what
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    /// Management overview with note counts
    Overview,
    /// Keyboard of categories for a shared selection step
    Select(CategoryPurpose),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryIntent {
    Rename,
    Delete,
}

/// Which notes are being loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteListing {
    /// Every note in the named category
    Category(String),
    /// Photo, video and voice notes from all categories
    Media,
    /// Numbered list to pick a note from
    Select(NotePurpose),
}

/// Requests to the persistence collaborator, scoped to the turn's chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreRequest {
    RegisterUser(NewUser),
    SaveName { name: String, onboarding: bool },
    SaveCity { city: String, onboarding: bool },
    LoadProfile { for_weather: bool },
    ToggleWeatherNotifications,
    ListCategories(Listing),
    FindCategory { name: String, intent: CategoryIntent },
    CreateCategory { name: String, color: String },
    RenameCategory { id: i64, name: String },
    DeleteCategory { id: i64 },
    CreateNote {
        category: String,
        note: NewNote,
        captured: bool,
    },
    ListNotes(NoteListing),
    FindNote { id: i64, purpose: NotePurpose },
    UpdateNote { id: i64, content: String },
    DeleteNote { id: i64 },
}

impl StoreRequest {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            StoreRequest::RegisterUser(_) => "register_user",
            StoreRequest::SaveName { .. } => "save_name",
            StoreRequest::SaveCity { .. } => "save_city",
            StoreRequest::LoadProfile { .. } => "load_profile",
            StoreRequest::ToggleWeatherNotifications => "toggle_weather_notifications",
            StoreRequest::ListCategories(_) => "list_categories",
            StoreRequest::FindCategory { .. } => "find_category",
            StoreRequest::CreateCategory { .. } => "create_category",
            StoreRequest::RenameCategory { .. } => "rename_category",
            StoreRequest::DeleteCategory { .. } => "delete_category",
            StoreRequest::CreateNote { .. } => "create_note",
            StoreRequest::ListNotes(_) => "list_notes",
            StoreRequest::FindNote { .. } => "find_note",
            StoreRequest::UpdateNote { .. } => "update_note",
            StoreRequest::DeleteNote { .. } => "delete_note",
        }
    }
}

/// Why a persistence request failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreFailure {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    Conflict(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
}
