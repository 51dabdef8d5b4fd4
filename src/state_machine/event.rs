//! Events that drive a conversation turn

use super::effect::{CategoryIntent, Listing, NoteListing, StoreFailure, StoreRequest};
use super::state::NotePurpose;
use crate::db::{Category, CategorySummary, NewNote, NewUser, Note, NoteKind, User};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    /// Something the user sent
    Message(Inbound),

    /// Result of a persistence request issued earlier in the same turn
    Stored(StoreOutcome),

    /// Result of a weather lookup
    Forecast {
        city: String,
        result: Result<String, String>,
    },
}

/// An inbound message as delivered by the transport
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inbound {
    pub chat_id: i64,
    /// Message text, empty for media without caption
    pub text: String,
    pub media: Option<Media>,
    /// Forwarded from another chat
    pub forwarded: bool,
    pub forwarded_from: Option<String>,
    pub sender: Sender,
}

impl Inbound {
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn media(chat_id: i64, media: Media) -> Self {
        Self {
            chat_id,
            media: Some(media),
            ..Self::default()
        }
    }

    /// Trimmed text, or the caption for media
    pub fn body(&self) -> &str {
        match &self.media {
            Some(Media {
                caption: Some(caption),
                ..
            }) if self.text.trim().is_empty() => caption.trim(),
            _ => self.text.trim(),
        }
    }

    /// Turn the message into a note ready to be filed
    pub fn to_note(&self) -> Option<NewNote> {
        let mut content = self.body().to_string();
        if let Some(source) = self.forwarded_from.as_deref().filter(|_| self.forwarded) {
            if !content.is_empty() {
                content = format!("{content}\n\n↪️ {source}");
            }
        }

        match &self.media {
            Some(media) => Some(NewNote {
                kind: media.kind,
                content,
                file_id: Some(media.file_id.clone()),
            }),
            None if content.is_empty() => None,
            None => {
                let kind = if is_link(self.body()) {
                    NoteKind::Link
                } else {
                    NoteKind::Text
                };
                Some(NewNote {
                    kind,
                    content,
                    file_id: None,
                })
            }
        }
    }
}

fn is_link(text: &str) -> bool {
    (text.starts_with("http://") || text.starts_with("https://")) && !text.contains(char::is_whitespace)
}

/// Attached media reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    pub kind: NoteKind,
    pub file_id: String,
    pub caption: Option<String>,
}

/// Transport-reported identity of whoever sent the message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sender {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl Sender {
    pub fn to_new_user(&self, chat_id: i64) -> NewUser {
        NewUser {
            chat_id,
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

/// Outcome of each persistence request, paired with what asked for it
#[derive(Debug, Clone)]
pub enum StoreOutcome {
    Registered(Result<bool, StoreFailure>),
    NameSaved {
        onboarding: bool,
        result: Result<User, StoreFailure>,
    },
    CitySaved {
        onboarding: bool,
        result: Result<User, StoreFailure>,
    },
    Profile {
        for_weather: bool,
        result: Result<User, StoreFailure>,
    },
    WeatherToggled(Result<bool, StoreFailure>),
    Categories {
        listing: Listing,
        result: Result<Vec<CategorySummary>, StoreFailure>,
    },
    CategoryFound {
        intent: CategoryIntent,
        result: Result<CategorySummary, StoreFailure>,
    },
    CategoryCreated(Result<Category, StoreFailure>),
    CategoryRenamed(Result<Category, StoreFailure>),
    CategoryDeleted(Result<usize, StoreFailure>),
    NoteCreated {
        captured: bool,
        result: Result<Note, StoreFailure>,
    },
    Notes {
        listing: NoteListing,
        result: Result<Vec<Note>, StoreFailure>,
    },
    NoteFound {
        purpose: NotePurpose,
        result: Result<Note, StoreFailure>,
    },
    NoteUpdated(Result<Note, StoreFailure>),
    NoteDeleted(Result<(), StoreFailure>),
}

impl StoreOutcome {
    /// The outcome `request` would have produced had it failed with `failure`
    pub fn failed(request: &StoreRequest, failure: StoreFailure) -> Self {
        match request {
            StoreRequest::RegisterUser(_) => StoreOutcome::Registered(Err(failure)),
            StoreRequest::SaveName { onboarding, .. } => StoreOutcome::NameSaved {
                onboarding: *onboarding,
                result: Err(failure),
            },
            StoreRequest::SaveCity { onboarding, .. } => StoreOutcome::CitySaved {
                onboarding: *onboarding,
                result: Err(failure),
            },
            StoreRequest::LoadProfile { for_weather } => StoreOutcome::Profile {
                for_weather: *for_weather,
                result: Err(failure),
            },
            StoreRequest::ToggleWeatherNotifications => StoreOutcome::WeatherToggled(Err(failure)),
            StoreRequest::ListCategories(listing) => StoreOutcome::Categories {
                listing: listing.clone(),
                result: Err(failure),
            },
            StoreRequest::FindCategory { intent, .. } => StoreOutcome::CategoryFound {
                intent: *intent,
                result: Err(failure),
            },
            StoreRequest::CreateCategory { .. } => StoreOutcome::CategoryCreated(Err(failure)),
            StoreRequest::RenameCategory { .. } => StoreOutcome::CategoryRenamed(Err(failure)),
            StoreRequest::DeleteCategory { .. } => StoreOutcome::CategoryDeleted(Err(failure)),
            StoreRequest::CreateNote { captured, .. } => StoreOutcome::NoteCreated {
                captured: *captured,
                result: Err(failure),
            },
            StoreRequest::ListNotes(listing) => StoreOutcome::Notes {
                listing: listing.clone(),
                result: Err(failure),
            },
            StoreRequest::FindNote { purpose, .. } => StoreOutcome::NoteFound {
                purpose: *purpose,
                result: Err(failure),
            },
            StoreRequest::UpdateNote { .. } => StoreOutcome::NoteUpdated(Err(failure)),
            StoreRequest::DeleteNote { .. } => StoreOutcome::NoteDeleted(Err(failure)),
        }
    }

    /// The failure carried by this outcome, if any
    pub fn failure(&self) -> Option<&StoreFailure> {
        match self {
            StoreOutcome::Registered(r) | StoreOutcome::WeatherToggled(r) => r.as_ref().err(),
            StoreOutcome::NameSaved { result, .. }
            | StoreOutcome::CitySaved { result, .. }
            | StoreOutcome::Profile { result, .. } => result.as_ref().err(),
            StoreOutcome::Categories { result, .. } => result.as_ref().err(),
            StoreOutcome::CategoryFound { result, .. } => result.as_ref().err(),
            StoreOutcome::CategoryCreated(r) | StoreOutcome::CategoryRenamed(r) => r.as_ref().err(),
            StoreOutcome::CategoryDeleted(r) => r.as_ref().err(),
            StoreOutcome::NoteCreated { result, .. }
            | StoreOutcome::NoteFound { result, .. } => result.as_ref().err(),
            StoreOutcome::Notes { result, .. } => result.as_ref().err(),
            StoreOutcome::NoteUpdated(r) => r.as_ref().err(),
            StoreOutcome::NoteDeleted(r) => r.as_ref().err(),
        }
    }
}
