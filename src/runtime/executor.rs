//! Conversation turn executor

use super::traits::{Persistence, Transport, WeatherClient};

use crate::session::{ChatId, MessageRef, SessionStore};
use crate::state_machine::text::{note_preview, split_message, MAX_MESSAGE_LEN};
use crate::state_machine::{
    transition, Effect, Event, FlowState, Inbound, Keyboard, StoreFailure, StoreOutcome,
    StoreRequest, TurnContext,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Default bound on a single collaborator call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default delay between note previews
pub const DEFAULT_NOTE_PACING: Duration = Duration::from_millis(300);

/// Tunables for the dispatcher
#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    pub request_timeout: Duration,
    pub note_pacing: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            note_pacing: DEFAULT_NOTE_PACING,
        }
    }
}

/// Runs conversation turns against any session store and collaborator set
pub struct Dispatcher<S, P, W, T>
where
    S: SessionStore + 'static,
    P: Persistence + 'static,
    W: WeatherClient + 'static,
    T: Transport + 'static,
{
    store: Arc<S>,
    persistence: P,
    weather: W,
    transport: T,
    settings: DispatchSettings,
}

impl<S, P, W, T> Dispatcher<S, P, W, T>
where
    S: SessionStore + 'static,
    P: Persistence + 'static,
    W: WeatherClient + 'static,
    T: Transport + 'static,
{
    pub fn new(store: Arc<S>, persistence: P, weather: W, transport: T) -> Self {
        Self {
            store,
            persistence,
            weather,
            transport,
            settings: DispatchSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: DispatchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Consume inbound messages in order until the channel closes or `cancel` fires
    pub async fn run(self, mut inbound: mpsc::Receiver<Inbound>, cancel: CancellationToken) {
        tracing::info!("Starting dispatcher");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                message = inbound.recv() => match message {
                    Some(message) => {
                        self.handle(message).await;
                    }
                    None => break,
                },
            }
        }

        tracing::info!("Dispatcher stopped");
    }

    /// Run one turn: read the session, compute and call collaborators, write
    /// the session, then emit. Returns the state the conversation was left in.
    pub async fn handle(&self, inbound: Inbound) -> FlowState {
        let chat = inbound.chat_id;

        // (1) read
        let mut ctx = TurnContext::new(chat);
        let (mut state, mut pending) = match self.store.snapshot(chat) {
            Some(session) => {
                ctx.history_len = session.history.len();
                (session.state, session.pending)
            }
            None => {
                ctx.interrupted = self.store.take_interrupted(chat);
                (FlowState::Idle, None)
            }
        };

        tracing::debug!(chat_id = chat, state = %state, interrupted = ctx.interrupted, "Turn started");

        // (2) compute, running collaborator calls as they are requested
        let mut outbound = Vec::new();
        let mut events_to_process = vec![Event::Message(inbound)];

        while let Some(current_event) = events_to_process.pop() {
            let result = transition(state, pending.as_ref(), &ctx, current_event);

            if let Some(error) = &result.recovered {
                tracing::warn!(
                    chat_id = chat,
                    state = %state,
                    purpose = pending.as_ref().map(|p| p.purpose().as_str()),
                    error = %error,
                    "Flow abandoned"
                );
            }
            if result.new_state != state {
                tracing::debug!(chat_id = chat, from = %state, to = %result.new_state, "State transition");
            }

            state = result.new_state;
            pending = result.pending;

            for effect in result.effects {
                match effect {
                    Effect::Store(request) => {
                        let outcome = self.execute_request(chat, request).await;
                        events_to_process.push(Event::Stored(outcome));
                    }
                    Effect::FetchWeather { city } => {
                        let event = self.fetch_weather(chat, city).await;
                        events_to_process.push(event);
                    }
                    effect => {
                        debug_assert!(effect.is_outbound());
                        outbound.push(effect);
                    }
                }
            }
        }

        // (3) write
        self.store.commit(chat, state, pending);

        // (4) emit
        for effect in outbound {
            self.emit(chat, effect).await;
        }

        state
    }

    async fn execute_request(&self, chat: ChatId, request: StoreRequest) -> StoreOutcome {
        let name = request.name();
        let on_timeout = StoreOutcome::failed(
            &request,
            StoreFailure::Unavailable(format!("{name} timed out")),
        );

        let outcome = match tokio::time::timeout(
            self.settings.request_timeout,
            self.persistence.execute(chat, request),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => on_timeout,
        };

        match outcome.failure() {
            Some(StoreFailure::Unavailable(e)) => {
                tracing::error!(chat_id = chat, request = name, error = %e, "Persistence request failed");
            }
            Some(failure) => {
                tracing::debug!(chat_id = chat, request = name, %failure, "Persistence request rejected");
            }
            None => tracing::debug!(chat_id = chat, request = name, "Persistence request done"),
        }
        outcome
    }

    async fn fetch_weather(&self, chat: ChatId, city: String) -> Event {
        let result = match tokio::time::timeout(
            self.settings.request_timeout,
            self.weather.forecast(&city),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err("weather lookup timed out".to_string()),
        };

        if let Err(e) = &result {
            tracing::error!(chat_id = chat, city = %city, error = %e, "Weather lookup failed");
        }
        Event::Forecast { city, result }
    }

    async fn emit(&self, chat: ChatId, effect: Effect) {
        match effect {
            Effect::Reply { text, keyboard } => self.send_text(chat, &text, &keyboard).await,
            Effect::ShowNotes {
                header,
                notes,
                footer,
                keyboard,
            } => {
                self.send_text(chat, &header, &keyboard).await;
                for note in &notes {
                    tokio::time::sleep(self.settings.note_pacing).await;
                    let preview = note_preview(note);
                    match preview.media {
                        Some((kind, file_id)) => {
                            let sent = self
                                .transport
                                .send_media(chat, kind, &file_id, &preview.text, &keyboard)
                                .await;
                            self.record_sent(chat, sent);
                        }
                        None => self.send_text(chat, &preview.text, &keyboard).await,
                    }
                }
                if let Some(footer) = footer {
                    tokio::time::sleep(self.settings.note_pacing).await;
                    self.send_text(chat, &footer, &keyboard).await;
                }
            }
            Effect::DeleteLastReply => {
                let Some(message) = self.store.last_message(chat) else {
                    return;
                };
                if let Err(e) = self.transport.delete_message(chat, message).await {
                    tracing::warn!(chat_id = chat, message_id = message, error = %e, "Failed to delete message");
                }
            }
            Effect::Store(_) | Effect::FetchWeather { .. } => {
                tracing::warn!(chat_id = chat, "Collaborator effect reached emit");
            }
        }
    }

    async fn send_text(&self, chat: ChatId, text: &str, keyboard: &Keyboard) {
        for part in split_message(text, MAX_MESSAGE_LEN) {
            let sent = self.transport.send_text(chat, &part, keyboard).await;
            self.record_sent(chat, sent);
        }
    }

    fn record_sent(&self, chat: ChatId, sent: Result<MessageRef, String>) {
        match sent {
            Ok(message) => self.store.record_outbound(chat, message),
            Err(e) => tracing::error!(chat_id = chat, error = %e, "Failed to send message"),
        }
    }
}
