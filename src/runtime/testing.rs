//! Mock implementations for testing
//!
//! These mocks enable integration testing of the dispatcher without real I/O.

use super::traits::*;
use crate::db::NoteKind;
use crate::session::{ChatId, MessageRef};
use crate::state_machine::{Keyboard, StoreFailure, StoreOutcome, StoreRequest};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Recording Transport
// ============================================================================

/// Something the dispatcher handed to the transport
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        chat: ChatId,
        text: String,
        keyboard: Keyboard,
    },
    Media {
        chat: ChatId,
        kind: NoteKind,
        file_id: String,
        caption: String,
    },
    Deleted {
        chat: ChatId,
        message: MessageRef,
    },
}

/// Transport that records every call and hands out increasing message refs
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    next_ref: AtomicI32,
    /// When set, every send fails
    pub fail_sends: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Text messages sent to `chat`, in order
    pub fn texts(&self, chat: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { chat: c, text, .. } if c == chat => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn last_text(&self, chat: ChatId) -> Option<String> {
        self.texts(chat).pop()
    }

    pub fn last_keyboard(&self) -> Option<Keyboard> {
        self.sent().into_iter().rev().find_map(|s| match s {
            Sent::Text { keyboard, .. } => Some(keyboard),
            _ => None,
        })
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    fn next(&self) -> Result<MessageRef, String> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err("transport offline".to_string());
        }
        Ok(self.next_ref.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<MessageRef, String> {
        let message = self.next()?;
        self.sent.lock().unwrap().push(Sent::Text {
            chat,
            text: text.to_string(),
            keyboard: keyboard.clone(),
        });
        Ok(message)
    }

    async fn send_media(
        &self,
        chat: ChatId,
        kind: NoteKind,
        file_id: &str,
        caption: &str,
        _keyboard: &Keyboard,
    ) -> Result<MessageRef, String> {
        let message = self.next()?;
        self.sent.lock().unwrap().push(Sent::Media {
            chat,
            kind,
            file_id: file_id.to_string(),
            caption: caption.to_string(),
        });
        Ok(message)
    }

    async fn delete_message(&self, chat: ChatId, message: MessageRef) -> Result<(), String> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Deleted { chat, message });
        Ok(())
    }
}

// ============================================================================
// Scripted Weather
// ============================================================================

/// Weather client that returns queued forecasts
#[derive(Default)]
pub struct ScriptedWeather {
    forecasts: Mutex<VecDeque<Result<String, String>>>,
    /// Cities looked up, in order
    pub requests: Mutex<Vec<String>>,
}

impl ScriptedWeather {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, forecast: Result<String, String>) {
        self.forecasts.lock().unwrap().push_back(forecast);
    }

    pub fn recorded_requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl WeatherClient for ScriptedWeather {
    async fn forecast(&self, city: &str) -> Result<String, String> {
        self.requests.lock().unwrap().push(city.to_string());
        self.forecasts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("no forecast queued".to_string()))
    }
}

// ============================================================================
// Failing / Delayed Persistence
// ============================================================================

/// Persistence whose every request fails as unavailable
#[derive(Default)]
pub struct FailingPersistence {
    pub requests: Mutex<Vec<StoreRequest>>,
}

impl FailingPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded_requests(&self) -> Vec<StoreRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Persistence for FailingPersistence {
    async fn execute(&self, _chat: ChatId, request: StoreRequest) -> StoreOutcome {
        let outcome = StoreOutcome::failed(
            &request,
            StoreFailure::Unavailable("database offline".to_string()),
        );
        self.requests.lock().unwrap().push(request);
        outcome
    }
}

/// Wraps another persistence and answers only after a delay
pub struct DelayedPersistence<P> {
    inner: P,
    delay: Duration,
}

impl<P: Persistence> DelayedPersistence<P> {
    pub fn new(inner: P, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl<P: Persistence> Persistence for DelayedPersistence<P> {
    async fn execute(&self, chat: ChatId, request: StoreRequest) -> StoreOutcome {
        tokio::time::sleep(self.delay).await;
        self.inner.execute(chat, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, NewNote};
    use crate::runtime::{DispatchSettings, Dispatcher};
    use crate::session::{MemorySessionStore, SessionStore};
    use crate::state_machine::text;
    use crate::state_machine::{
        CategoryPurpose, FlowState, Inbound, Media, NotePurpose, Pending,
    };
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    const CHAT: ChatId = 100;

    type TestDispatcher<P> =
        Dispatcher<MemorySessionStore, P, Arc<ScriptedWeather>, Arc<RecordingTransport>>;

    struct Harness<P: Persistence + 'static> {
        dispatcher: TestDispatcher<P>,
        store: Arc<MemorySessionStore>,
        transport: Arc<RecordingTransport>,
        weather: Arc<ScriptedWeather>,
    }

    impl<P: Persistence + 'static> Harness<P> {
        fn with(persistence: P) -> Self {
            let store = Arc::new(MemorySessionStore::default());
            let transport = Arc::new(RecordingTransport::new());
            let weather = Arc::new(ScriptedWeather::new());
            let dispatcher = Dispatcher::new(
                Arc::clone(&store),
                persistence,
                Arc::clone(&weather),
                Arc::clone(&transport),
            )
            .with_settings(DispatchSettings {
                request_timeout: Duration::from_secs(2),
                note_pacing: Duration::ZERO,
            });
            Self {
                dispatcher,
                store,
                transport,
                weather,
            }
        }

        async fn say(&self, text: &str) -> FlowState {
            self.dispatcher.handle(Inbound::text(CHAT, text)).await
        }

        fn last_text(&self) -> String {
            self.transport.last_text(CHAT).unwrap_or_default()
        }
    }

    fn database() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn harness() -> (Harness<DatabasePersistence>, Database) {
        let db = database();
        (Harness::with(DatabasePersistence::new(db.clone())), db)
    }

    #[tokio::test]
    async fn test_onboarding() {
        let (h, db) = harness();

        assert_eq!(h.say("/start").await, FlowState::AwaitingName);
        assert!(h.transport.texts(CHAT)[0].contains("Welcome"));

        assert_eq!(h.say("Alex").await, FlowState::AwaitingCity);
        assert_eq!(db.get_user(CHAT).unwrap().first_name, "Alex");

        assert_eq!(h.say("Berlin").await, FlowState::Idle);
        let reply = h.last_text();
        assert!(reply.contains("Alex"), "{reply}");
        assert!(reply.contains("Berlin"), "{reply}");
        assert_eq!(db.get_user(CHAT).unwrap().city, "Berlin");
        assert_eq!(h.store.pending(CHAT), None);
    }

    #[tokio::test]
    async fn test_returning_user_is_not_onboarded_again() {
        let (h, _db) = harness();
        h.say("/start").await;
        h.say("Alex").await;
        h.say("Berlin").await;

        assert_eq!(h.say("/start").await, FlowState::Idle);
    }

    #[tokio::test]
    async fn test_delete_category_targets_selected_category() {
        let (h, db) = harness();
        let work = db.create_category(CHAT, "Work", "🔵").unwrap();
        let home = db.create_category(CHAT, "Home", "🟢").unwrap();

        assert_eq!(
            h.say("🗑️ Delete category").await,
            FlowState::AwaitingCategorySelection
        );
        assert_eq!(
            h.store.pending(CHAT),
            Some(Pending::SelectCategory(CategoryPurpose::DeleteCategory))
        );
        assert_eq!(
            h.transport.last_keyboard(),
            Some(Keyboard::Categories(vec!["Work".into(), "Home".into()]))
        );

        assert_eq!(h.say("Work").await, FlowState::ConfirmingCategoryDeletion);
        assert_eq!(
            h.store.pending(CHAT),
            Some(Pending::DeleteCategory {
                category_id: work.id.to_string()
            })
        );
        let prompt = h.store.last_message(CHAT).unwrap();

        assert_eq!(h.say("yes").await, FlowState::Idle);
        assert!(db.get_category(CHAT, work.id).is_err());
        assert!(db.get_category(CHAT, home.id).is_ok());
        assert!(h.transport.sent().contains(&Sent::Deleted {
            chat: CHAT,
            message: prompt
        }));
    }

    #[tokio::test]
    async fn test_expired_session_recovers_to_idle() {
        let (h, db) = harness();
        db.create_category(CHAT, "Work", "🔵").unwrap();

        h.store.commit(
            CHAT,
            FlowState::AwaitingNoteContent,
            Some(Pending::NoteContent {
                category: "Work".into(),
            }),
        );
        h.store.clear(CHAT);

        assert_eq!(h.say("buy milk").await, FlowState::Idle);
        assert_eq!(h.last_text(), text::session_expired());
        assert!(db.list_notes(CHAT, None).unwrap().is_empty());

        // The next message is ordinary idle input again
        h.say("buy milk").await;
        assert_eq!(h.store.state(CHAT), Some(FlowState::AwaitingCategorySelection));
    }

    #[tokio::test]
    async fn test_missing_pending_mid_flow() {
        let (h, _db) = harness();
        h.store.set_state(CHAT, FlowState::EditingNote);

        assert_eq!(h.say("new text").await, FlowState::Idle);
        assert_eq!(h.last_text(), text::session_expired());
        assert_eq!(h.store.pending(CHAT), None);
    }

    #[tokio::test]
    async fn test_collaborator_failure_returns_to_menu() {
        let persistence = Arc::new(FailingPersistence::new());
        let h = Harness::with(Arc::clone(&persistence));

        assert_eq!(h.say("📁 My notes").await, FlowState::Idle);
        assert_eq!(h.last_text(), text::try_later());
        assert_eq!(h.transport.last_keyboard(), Some(Keyboard::Notes));
        assert_eq!(persistence.recorded_requests().len(), 1);
        assert_eq!(h.store.state(CHAT), Some(FlowState::Idle));
    }

    #[tokio::test]
    async fn test_slow_persistence_times_out() {
        let slow = DelayedPersistence::new(
            DatabasePersistence::new(database()),
            Duration::from_millis(500),
        );
        let h = Harness::with(slow);
        let dispatcher = h.dispatcher.with_settings(DispatchSettings {
            request_timeout: Duration::from_millis(20),
            note_pacing: Duration::ZERO,
        });

        let state = dispatcher.handle(Inbound::text(CHAT, "👤 Profile")).await;
        assert_eq!(state, FlowState::Idle);
        assert_eq!(h.transport.last_text(CHAT).unwrap(), text::try_later());
    }

    #[tokio::test]
    async fn test_malformed_id_aborts_flow() {
        let persistence = Arc::new(FailingPersistence::new());
        let h = Harness::with(Arc::clone(&persistence));
        h.store.commit(
            CHAT,
            FlowState::ConfirmingNoteDeletion,
            Some(Pending::DeleteNote {
                note_id: "not-a-number".into(),
            }),
        );

        assert_eq!(h.say("✅ Yes").await, FlowState::Idle);
        assert_eq!(h.last_text(), text::flow_error());
        assert_eq!(h.transport.last_keyboard(), Some(Keyboard::NotesManagement));
        assert!(persistence.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_captured_content_is_filed() {
        let (h, db) = harness();
        db.create_category(CHAT, "Work", "🔵").unwrap();

        let forwarded = Inbound {
            forwarded: true,
            forwarded_from: Some("Team chat".into()),
            ..Inbound::text(CHAT, "standup moved to 10")
        };
        assert_eq!(
            h.dispatcher.handle(forwarded).await,
            FlowState::AwaitingCategorySelection
        );

        assert_eq!(h.say("Work").await, FlowState::Idle);
        let notes = db.list_notes(CHAT, None).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].content, "standup moved to 10\n\n↪️ Team chat");
    }

    #[tokio::test]
    async fn test_captured_media_keeps_file_reference() {
        let (h, db) = harness();
        db.create_category(CHAT, "Trips", "🔵").unwrap();

        let photo = Inbound::media(
            CHAT,
            Media {
                kind: NoteKind::Photo,
                file_id: "AgADphoto".into(),
                caption: Some("Alps".into()),
            },
        );
        h.dispatcher.handle(photo).await;
        h.say("Trips").await;

        let notes = db.list_media_notes(CHAT).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].file_id.as_deref(), Some("AgADphoto"));
        assert_eq!(notes[0].content, "Alps");
    }

    #[tokio::test]
    async fn test_view_notes_sends_previews_in_order() {
        let (h, db) = harness();
        let work = db.create_category(CHAT, "Work", "🔵").unwrap();
        db.create_note(CHAT, work.id, &NewNote::text("first")).unwrap();
        db.create_note(
            CHAT,
            work.id,
            &NewNote {
                kind: NoteKind::Photo,
                content: "whiteboard".into(),
                file_id: Some("AgADboard".into()),
            },
        )
        .unwrap();

        h.say("📁 My notes").await;
        h.transport.clear();
        assert_eq!(h.say("Work").await, FlowState::Idle);

        let sent = h.transport.sent();
        assert_eq!(sent.len(), 4);
        assert!(matches!(&sent[0], Sent::Text { text, .. } if text.contains("Work")));
        assert!(matches!(&sent[1], Sent::Text { text, .. } if text.contains("first")));
        assert!(matches!(
            &sent[2],
            Sent::Media { kind: NoteKind::Photo, file_id, .. } if file_id == "AgADboard"
        ));
        assert!(matches!(&sent[3], Sent::Text { keyboard: Keyboard::NotesView, .. }));
    }

    #[tokio::test]
    async fn test_long_note_is_split() {
        let (h, db) = harness();
        let work = db.create_category(CHAT, "Work", "🔵").unwrap();
        db.create_note(CHAT, work.id, &NewNote::text("ж".repeat(5000)))
            .unwrap();
        db.create_note(CHAT, work.id, &NewNote::text("😀".repeat(3000)))
            .unwrap();

        h.say("📁 My notes").await;
        h.transport.clear();
        h.say("Work").await;

        let texts = h.transport.texts(CHAT);
        assert!(texts.len() > 5);
        assert!(texts
            .iter()
            .all(|t| t.encode_utf16().count() <= text::MAX_MESSAGE_LEN));
        let body: usize = texts.iter().map(|t| t.matches('ж').count()).sum();
        assert_eq!(body, 5000);
        let emoji: usize = texts.iter().map(|t| t.matches('😀').count()).sum();
        assert_eq!(emoji, 3000);
    }

    #[tokio::test]
    async fn test_edit_note_flow() {
        let (h, db) = harness();
        let work = db.create_category(CHAT, "Work", "🔵").unwrap();
        let note = db.create_note(CHAT, work.id, &NewNote::text("draft")).unwrap();

        assert_eq!(h.say("✏️ Edit note").await, FlowState::AwaitingNoteSelection);
        assert_eq!(
            h.store.pending(CHAT),
            Some(Pending::SelectNote {
                purpose: NotePurpose::EditNote
            })
        );
        assert_eq!(h.say(&note.id.to_string()).await, FlowState::EditingNote);
        assert_eq!(h.say("final").await, FlowState::Idle);
        assert_eq!(db.get_note(CHAT, note.id).unwrap().content, "final");
    }

    #[tokio::test]
    async fn test_weather_uses_profile_city() {
        let (h, db) = harness();
        db.set_user_city(CHAT, "Berlin").unwrap();
        h.weather.queue(Ok("☀️ Berlin: 21°C".into()));

        assert_eq!(h.say("🌡️ Weather").await, FlowState::Idle);
        assert_eq!(h.weather.recorded_requests(), vec!["Berlin".to_string()]);
        assert_eq!(h.last_text(), "☀️ Berlin: 21°C");
    }

    #[tokio::test]
    async fn test_weather_asks_for_city_and_reports_failure() {
        let (h, _db) = harness();
        h.weather.queue(Err("city not found".into()));

        assert_eq!(h.say("🌡️ Weather").await, FlowState::AwaitingWeatherCity);
        assert_eq!(h.say("Atlantis").await, FlowState::Idle);
        assert!(h.last_text().contains("Atlantis"));
    }

    #[tokio::test]
    async fn test_sent_messages_are_tracked() {
        let (h, _db) = harness();
        h.say("ℹ️ Info").await;
        h.say("📞 Support").await;

        let history = h.store.history(CHAT);
        assert_eq!(history.len(), 2);
        assert_eq!(h.store.last_message(CHAT), history.last().copied());
    }

    #[tokio::test]
    async fn test_transport_failure_does_not_break_turn() {
        let (h, _db) = harness();
        h.transport.fail_sends.store(true, Ordering::SeqCst);

        assert_eq!(h.say("/start").await, FlowState::AwaitingName);
        assert!(h.store.history(CHAT).is_empty());
    }

    #[tokio::test]
    async fn test_run_processes_queue_in_order() {
        let (h, db) = harness();
        let (tx, rx) = mpsc::channel(8);
        for text in ["/start", "Alex", "Berlin"] {
            tx.send(Inbound::text(CHAT, text)).await.unwrap();
        }
        drop(tx);

        let store = Arc::clone(&h.store);
        h.dispatcher.run(rx, CancellationToken::new()).await;

        assert_eq!(store.state(CHAT), Some(FlowState::Idle));
        assert_eq!(db.get_user(CHAT).unwrap().city, "Berlin");
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let (h, _db) = harness();
        let (_tx, rx) = mpsc::channel::<Inbound>(1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), h.dispatcher.run(rx, cancel))
            .await
            .expect("dispatcher should stop");
    }
}
