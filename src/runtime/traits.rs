//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the dispatcher with mock implementations.

use crate::db::{CategorySummary, Database, DbError, NoteKind};
use crate::session::{ChatId, MessageRef};
use crate::state_machine::{Keyboard, NoteListing, StoreFailure, StoreOutcome, StoreRequest};
use crate::telegram::TelegramClient;
use crate::weather::OpenWeatherClient;
use async_trait::async_trait;
use std::sync::Arc;

/// Durable storage for profiles, categories and notes
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Perform one request on behalf of `chat`. Failures come back inside the outcome.
    async fn execute(&self, chat: ChatId, request: StoreRequest) -> StoreOutcome;
}

/// Turns a city name into a ready-to-send forecast
#[async_trait]
pub trait WeatherClient: Send + Sync {
    async fn forecast(&self, city: &str) -> Result<String, String>;
}

/// Outbound side of the messaging transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a text message, returning its reference
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<MessageRef, String>;

    /// Send a stored photo, video, voice message or file by its file id
    async fn send_media(
        &self,
        chat: ChatId,
        kind: NoteKind,
        file_id: &str,
        caption: &str,
        keyboard: &Keyboard,
    ) -> Result<MessageRef, String>;

    async fn delete_message(&self, chat: ChatId, message: MessageRef) -> Result<(), String>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: Persistence + ?Sized> Persistence for Arc<T> {
    async fn execute(&self, chat: ChatId, request: StoreRequest) -> StoreOutcome {
        (**self).execute(chat, request).await
    }
}

#[async_trait]
impl<T: WeatherClient + ?Sized> WeatherClient for Arc<T> {
    async fn forecast(&self, city: &str) -> Result<String, String> {
        (**self).forecast(city).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<MessageRef, String> {
        (**self).send_text(chat, text, keyboard).await
    }

    async fn send_media(
        &self,
        chat: ChatId,
        kind: NoteKind,
        file_id: &str,
        caption: &str,
        keyboard: &Keyboard,
    ) -> Result<MessageRef, String> {
        (**self)
            .send_media(chat, kind, file_id, caption, keyboard)
            .await
    }

    async fn delete_message(&self, chat: ChatId, message: MessageRef) -> Result<(), String> {
        (**self).delete_message(chat, message).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

impl From<DbError> for StoreFailure {
    fn from(e: DbError) -> Self {
        match e {
            DbError::UserNotFound(chat) => StoreFailure::NotFound(format!("user {chat}")),
            DbError::CategoryNotFound(category) => StoreFailure::NotFound(category),
            DbError::NoteNotFound(id) => StoreFailure::NotFound(format!("note {id}")),
            DbError::CategoryExists(name) => StoreFailure::Conflict(name),
            DbError::Sqlite(e) => StoreFailure::Unavailable(e.to_string()),
        }
    }
}

/// Adapter to use Database as Persistence
#[derive(Clone)]
pub struct DatabasePersistence {
    db: Database,
}

impl DatabasePersistence {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[allow(dead_code)] // Useful for tests
    pub fn inner(&self) -> &Database {
        &self.db
    }

    fn find_category(&self, chat: ChatId, name: &str) -> Result<CategorySummary, DbError> {
        self.db
            .list_categories(chat)?
            .into_iter()
            .find(|summary| summary.category.name == name)
            .ok_or_else(|| DbError::CategoryNotFound(name.to_string()))
    }

    fn execute_blocking(&self, chat: ChatId, request: StoreRequest) -> StoreOutcome {
        let db = &self.db;
        match request {
            StoreRequest::RegisterUser(user) => {
                StoreOutcome::Registered(db.register_user(&user).map_err(Into::into))
            }
            StoreRequest::SaveName { name, onboarding } => StoreOutcome::NameSaved {
                onboarding,
                result: db.set_user_name(chat, &name).map_err(Into::into),
            },
            StoreRequest::SaveCity { city, onboarding } => StoreOutcome::CitySaved {
                onboarding,
                result: db.set_user_city(chat, &city).map_err(Into::into),
            },
            StoreRequest::LoadProfile { for_weather } => StoreOutcome::Profile {
                for_weather,
                result: db.get_user(chat).map_err(Into::into),
            },
            StoreRequest::ToggleWeatherNotifications => {
                StoreOutcome::WeatherToggled(db.toggle_weather_notifications(chat).map_err(Into::into))
            }
            StoreRequest::ListCategories(listing) => StoreOutcome::Categories {
                listing,
                result: db.list_categories(chat).map_err(Into::into),
            },
            StoreRequest::FindCategory { name, intent } => StoreOutcome::CategoryFound {
                intent,
                result: self.find_category(chat, &name).map_err(Into::into),
            },
            StoreRequest::CreateCategory { name, color } => StoreOutcome::CategoryCreated(
                db.create_category(chat, &name, &color).map_err(Into::into),
            ),
            StoreRequest::RenameCategory { id, name } => {
                StoreOutcome::CategoryRenamed(db.rename_category(chat, id, &name).map_err(Into::into))
            }
            StoreRequest::DeleteCategory { id } => {
                StoreOutcome::CategoryDeleted(db.delete_category(chat, id).map_err(Into::into))
            }
            StoreRequest::CreateNote {
                category,
                note,
                captured,
            } => StoreOutcome::NoteCreated {
                captured,
                result: db
                    .find_category_by_name(chat, &category)
                    .and_then(|c| db.create_note(chat, c.id, &note))
                    .map_err(Into::into),
            },
            StoreRequest::ListNotes(listing) => {
                let result = match &listing {
                    NoteListing::Category(name) => db
                        .find_category_by_name(chat, name)
                        .and_then(|c| db.list_notes(chat, Some(c.id))),
                    NoteListing::Media => db.list_media_notes(chat),
                    NoteListing::Select(_) => db.list_notes(chat, None),
                };
                StoreOutcome::Notes {
                    listing,
                    result: result.map_err(Into::into),
                }
            }
            StoreRequest::FindNote { id, purpose } => StoreOutcome::NoteFound {
                purpose,
                result: db.get_note(chat, id).map_err(Into::into),
            },
            StoreRequest::UpdateNote { id, content } => StoreOutcome::NoteUpdated(
                db.update_note_content(chat, id, &content).map_err(Into::into),
            ),
            StoreRequest::DeleteNote { id } => {
                StoreOutcome::NoteDeleted(db.delete_note(chat, id).map_err(Into::into))
            }
        }
    }
}

#[async_trait]
impl Persistence for DatabasePersistence {
    /// SQLite calls block, so they run on the blocking pool where a caller's
    /// timeout can still fire
    async fn execute(&self, chat: ChatId, request: StoreRequest) -> StoreOutcome {
        let this = self.clone();
        let on_panic = request.clone();
        match tokio::task::spawn_blocking(move || this.execute_blocking(chat, request)).await {
            Ok(outcome) => outcome,
            Err(e) => StoreOutcome::failed(&on_panic, StoreFailure::Unavailable(e.to_string())),
        }
    }
}

#[async_trait]
impl WeatherClient for OpenWeatherClient {
    async fn forecast(&self, city: &str) -> Result<String, String> {
        let report = self.current(city).await.map_err(|e| e.to_string())?;
        Ok(report.to_string())
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<MessageRef, String> {
        self.send_message(chat, text, keyboard)
            .await
            .map_err(|e| e.to_string())
    }

    async fn send_media(
        &self,
        chat: ChatId,
        kind: NoteKind,
        file_id: &str,
        caption: &str,
        keyboard: &Keyboard,
    ) -> Result<MessageRef, String> {
        self.send_file(chat, kind, file_id, caption, keyboard)
            .await
            .map_err(|e| e.to_string())
    }

    async fn delete_message(&self, chat: ChatId, message: MessageRef) -> Result<(), String> {
        self.delete(chat, message).await.map_err(|e| e.to_string())
    }
}
