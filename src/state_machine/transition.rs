//! Pure state transition function
//!
//! Given the current state, the pending payload and one event, decide the
//! next state, the next payload and the effects to run. No I/O happens here;
//! collaborator results come back in as [`Event::Stored`] and
//! [`Event::Forecast`].

use super::effect::{CategoryIntent, Listing, NoteListing, StoreFailure, StoreRequest};
use super::event::{Inbound, StoreOutcome};
use super::menu::{is_unknown_slash_command, Command, Keyboard};
use super::state::{CategoryPurpose, FlowState, NotePurpose, Pending, TurnContext};
use super::text;
use super::{Effect, Event};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: FlowState,
    pub pending: Option<Pending>,
    pub effects: Vec<Effect>,
    /// Set when the flow was abandoned because of a recoverable problem
    pub recovered: Option<FlowError>,
}

impl TransitionResult {
    pub fn new(state: FlowState, pending: Option<Pending>) -> Self {
        Self {
            new_state: state,
            pending,
            effects: vec![],
            recovered: None,
        }
    }

    /// Back to idle with nothing pending
    pub fn idle() -> Self {
        Self::new(FlowState::Idle, None)
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }

    fn reply(self, text: impl Into<String>, keyboard: Keyboard) -> Self {
        self.with_effect(Effect::reply(text, keyboard))
    }

    fn store(self, request: StoreRequest) -> Self {
        self.with_effect(Effect::store(request))
    }
}

/// Problems inside a flow that abort it without failing the turn
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("session data missing in state {0}")]
    SessionExpired(FlowState),
    #[error("malformed {slot} id: {value:?}")]
    MalformedId { slot: &'static str, value: String },
}

/// Pure transition function
pub fn transition(
    state: FlowState,
    pending: Option<&Pending>,
    ctx: &TurnContext,
    event: Event,
) -> TransitionResult {
    match event {
        Event::Message(inbound) => on_message(state, pending, ctx, &inbound),
        Event::Stored(outcome) => on_stored(state, pending, outcome),
        Event::Forecast { city, result } => {
            let text = result.unwrap_or_else(|_| text::weather_failed(&city));
            TransitionResult::idle().reply(text, Keyboard::Main)
        }
    }
}

// ============================================================
// Inbound messages
// ============================================================

fn on_message(
    state: FlowState,
    pending: Option<&Pending>,
    ctx: &TurnContext,
    inbound: &Inbound,
) -> TransitionResult {
    let command = if inbound.media.is_none() {
        Command::parse(&inbound.text)
    } else {
        None
    };

    if let Some(command) = command.filter(|c| c.is_escape()) {
        return escape(state, pending, command);
    }
    if state.is_idle() {
        return idle(ctx, inbound, command);
    }
    if let Some(command) = command.filter(|c| abandons_flow(state, *c)) {
        return idle_command(inbound, command);
    }

    match in_flow(state, pending, ctx, inbound, command) {
        Ok(result) => result,
        Err(e) => recover(state, pending, e),
    }
}

/// Whether a menu command pressed mid-flow starts over from idle
fn abandons_flow(state: FlowState, command: Command) -> bool {
    match command {
        Command::Start => true,
        Command::Yes | Command::No | Command::RemoveNote | Command::NewCategory => false,
        _ => !matches!(
            state,
            FlowState::ConfirmingCategoryDeletion | FlowState::ConfirmingNoteDeletion
        ),
    }
}

fn escape(state: FlowState, pending: Option<&Pending>, command: Command) -> TransitionResult {
    let keyboard = match command {
        Command::Home => Keyboard::Main,
        Command::BackToNotes => Keyboard::Notes,
        _ => owning_menu(state, pending),
    };
    let result = TransitionResult::idle();
    let result = if is_confirming(state) {
        result.with_effect(Effect::DeleteLastReply)
    } else {
        result
    };
    result.with_effect(menu_reply(keyboard))
}

fn idle(ctx: &TurnContext, inbound: &Inbound, command: Option<Command>) -> TransitionResult {
    if let Some(command) = command {
        return idle_command(inbound, command);
    }
    if ctx.interrupted {
        return TransitionResult {
            recovered: Some(FlowError::SessionExpired(FlowState::Idle)),
            ..TransitionResult::idle().reply(text::session_expired(), Keyboard::Main)
        };
    }
    if inbound.media.is_none() && is_unknown_slash_command(&inbound.text) {
        return TransitionResult::idle().reply(text::use_menu(), Keyboard::Main);
    }

    // Anything else is content to file away
    match inbound.to_note() {
        Some(content) => TransitionResult::idle().store(StoreRequest::ListCategories(
            Listing::Select(CategoryPurpose::SaveCaptured { content }),
        )),
        None => TransitionResult::idle().reply(text::nothing_to_save(), Keyboard::Main),
    }
}

fn idle_command(inbound: &Inbound, command: Command) -> TransitionResult {
    let idle = TransitionResult::idle();
    match command {
        Command::Start => idle
            .reply(text::welcome(), Keyboard::Main)
            .store(StoreRequest::RegisterUser(
                inbound.sender.to_new_user(inbound.chat_id),
            )),
        Command::Cancel | Command::Back | Command::Home | Command::BackToNotes => {
            escape(FlowState::Idle, None, command)
        }

        Command::Info => idle.reply(text::info(), Keyboard::Main),
        Command::Support => idle.reply(text::support(), Keyboard::Main),
        Command::Weather => idle.store(StoreRequest::LoadProfile { for_weather: true }),
        Command::Notes => menu_result(Keyboard::Notes),
        Command::Settings => menu_result(Keyboard::Settings),
        Command::Notifications => idle.reply(text::notifications(), Keyboard::Settings),
        Command::Profile => idle.store(StoreRequest::LoadProfile { for_weather: false }),
        Command::WeatherNotifications => idle.store(StoreRequest::ToggleWeatherNotifications),

        Command::YourName => TransitionResult::new(FlowState::AwaitingNameEdit, None)
            .reply(text::ask_name(), Keyboard::Back),
        Command::YourCity => TransitionResult::new(FlowState::AwaitingCityEdit, None)
            .reply(text::ask_city(), Keyboard::Back),

        Command::NewNote => idle.store(StoreRequest::ListCategories(Listing::Select(
            CategoryPurpose::NewNote,
        ))),
        Command::MyNotes => idle.store(StoreRequest::ListCategories(Listing::Select(
            CategoryPurpose::ViewNotes,
        ))),
        Command::MediaNotes => idle.store(StoreRequest::ListNotes(NoteListing::Media)),
        Command::ManageNotes => menu_result(Keyboard::NotesManagement),
        Command::ManageCategories => idle.store(StoreRequest::ListCategories(Listing::Overview)),

        Command::EditNote => idle.store(StoreRequest::ListNotes(NoteListing::Select(
            NotePurpose::EditNote,
        ))),
        Command::DeleteNote => idle.store(StoreRequest::ListNotes(NoteListing::Select(
            NotePurpose::DeleteNote,
        ))),

        Command::CreateCategory | Command::NewCategory => {
            TransitionResult::new(FlowState::AwaitingCategoryName, None)
                .reply(text::ask_category_name(), Keyboard::Back)
        }
        Command::EditCategories => idle.store(StoreRequest::ListCategories(Listing::Select(
            CategoryPurpose::EditCategory,
        ))),
        Command::DeleteCategory => idle.store(StoreRequest::ListCategories(Listing::Select(
            CategoryPurpose::DeleteCategory,
        ))),

        Command::Yes | Command::No | Command::RemoveNote => {
            idle.reply(text::use_menu(), Keyboard::Main)
        }
    }
}

#[allow(clippy::too_many_lines)] // One arm per flow state
fn in_flow(
    state: FlowState,
    pending: Option<&Pending>,
    ctx: &TurnContext,
    inbound: &Inbound,
    command: Option<Command>,
) -> Result<TransitionResult, FlowError> {
    let body = inbound.body();
    let has_text = inbound.media.is_none() && !body.is_empty();
    let stay = || TransitionResult::new(state, pending.cloned());

    let pending = if state.requires_pending() {
        Some(
            pending
                .filter(|p| p.fits(state))
                .ok_or(FlowError::SessionExpired(state))?,
        )
    } else {
        None
    };

    let result = match (state, pending) {
        (FlowState::Idle, _) => idle(ctx, inbound, command),

        (FlowState::AwaitingName | FlowState::AwaitingNameEdit, _) if has_text => {
            stay().store(StoreRequest::SaveName {
                name: body.to_string(),
                onboarding: state == FlowState::AwaitingName,
            })
        }
        (FlowState::AwaitingCity | FlowState::AwaitingCityEdit, _) if has_text => {
            stay().store(StoreRequest::SaveCity {
                city: body.to_string(),
                onboarding: state == FlowState::AwaitingCity,
            })
        }
        (FlowState::AwaitingWeatherCity, _) if has_text => stay().with_effect(Effect::FetchWeather {
            city: body.to_string(),
        }),
        (FlowState::AwaitingName | FlowState::AwaitingNameEdit, _) => {
            stay().reply(text::ask_name(), keyboard_for_text_input(state))
        }
        (FlowState::AwaitingCity | FlowState::AwaitingCityEdit, _) => {
            stay().reply(text::ask_city(), keyboard_for_text_input(state))
        }
        (FlowState::AwaitingWeatherCity, _) => {
            stay().reply(text::ask_weather_city(), Keyboard::Back)
        }

        (FlowState::AwaitingCategoryName, _) if has_text => {
            stay().store(StoreRequest::CreateCategory {
                name: body.to_string(),
                color: text::category_color(ctx.history_len).to_string(),
            })
        }
        (FlowState::AwaitingCategoryName, _) => {
            stay().reply(text::category_name_empty(), Keyboard::Back)
        }

        (FlowState::AwaitingCategorySelection, Some(Pending::SelectCategory(purpose))) => {
            if command == Some(Command::NewCategory) {
                TransitionResult::new(FlowState::AwaitingCategoryName, None)
                    .reply(text::ask_category_name(), Keyboard::Back)
            } else if has_text {
                select_category(purpose, body, stay())
            } else {
                stay().reply(text::choose_from_keyboard(), Keyboard::Back)
            }
        }

        (FlowState::AwaitingNoteContent, Some(Pending::NoteContent { category })) => {
            match inbound.to_note() {
                Some(note) => stay().store(StoreRequest::CreateNote {
                    category: category.clone(),
                    note,
                    captured: false,
                }),
                None => stay().reply(text::ask_note_content(category), Keyboard::Back),
            }
        }

        (FlowState::AwaitingNoteSelection, Some(Pending::SelectNote { purpose })) => {
            match parse_note_number(body).filter(|_| has_text) {
                Some(id) => stay().store(StoreRequest::FindNote {
                    id,
                    purpose: *purpose,
                }),
                None => stay().reply(text::ask_note_number(), Keyboard::Back),
            }
        }

        (FlowState::EditingNote, Some(Pending::ReviseNote { note_id })) => {
            if command == Some(Command::RemoveNote) {
                let id = parse_id("note", note_id)?;
                stay().store(StoreRequest::FindNote {
                    id,
                    purpose: NotePurpose::DeleteNote,
                })
            } else if has_text {
                let id = parse_id("note", note_id)?;
                stay().store(StoreRequest::UpdateNote {
                    id,
                    content: body.to_string(),
                })
            } else {
                stay().reply(text::enter_text(), Keyboard::NoteActions)
            }
        }

        (FlowState::EditingCategory, Some(Pending::RenameCategory { category_id })) => {
            if has_text {
                let id = parse_id("category", category_id)?;
                stay().store(StoreRequest::RenameCategory {
                    id,
                    name: body.to_string(),
                })
            } else {
                stay().reply(text::category_name_empty(), Keyboard::Back)
            }
        }

        (FlowState::ConfirmingCategoryDeletion, Some(Pending::DeleteCategory { category_id })) => {
            match Command::parse_confirmation(&inbound.text) {
                Some(Command::Yes) => {
                    let id = parse_id("category", category_id)?;
                    stay()
                        .with_effect(Effect::DeleteLastReply)
                        .store(StoreRequest::DeleteCategory { id })
                }
                Some(Command::No) => TransitionResult::idle()
                    .with_effect(Effect::DeleteLastReply)
                    .reply(text::deletion_cancelled(), Keyboard::CategoriesManagement),
                _ => stay().reply(text::answer_yes_or_no(), Keyboard::Confirmation),
            }
        }

        (FlowState::ConfirmingNoteDeletion, Some(Pending::DeleteNote { note_id })) => {
            match Command::parse_confirmation(&inbound.text) {
                Some(Command::Yes) => {
                    let id = parse_id("note", note_id)?;
                    stay()
                        .with_effect(Effect::DeleteLastReply)
                        .store(StoreRequest::DeleteNote { id })
                }
                Some(Command::No) => TransitionResult::idle()
                    .with_effect(Effect::DeleteLastReply)
                    .reply(text::deletion_cancelled(), Keyboard::NotesManagement),
                _ => stay().reply(text::answer_yes_or_no(), Keyboard::Confirmation),
            }
        }

        // `fits` guarantees the payload matches, so this is unreachable in practice
        (_, _) => return Err(FlowError::SessionExpired(state)),
    };
    Ok(result)
}

/// The shared category-selection step, dispatched on the purpose it was entered with
fn select_category(purpose: &CategoryPurpose, name: &str, stay: TransitionResult) -> TransitionResult {
    let name = name.to_string();
    match purpose {
        CategoryPurpose::NewNote => TransitionResult::new(
            FlowState::AwaitingNoteContent,
            Some(Pending::NoteContent {
                category: name.clone(),
            }),
        )
        .reply(text::ask_note_content(&name), Keyboard::Back),
        CategoryPurpose::ViewNotes => stay.store(StoreRequest::ListNotes(NoteListing::Category(name))),
        CategoryPurpose::DeleteCategory => stay.store(StoreRequest::FindCategory {
            name,
            intent: CategoryIntent::Delete,
        }),
        CategoryPurpose::EditCategory => stay.store(StoreRequest::FindCategory {
            name,
            intent: CategoryIntent::Rename,
        }),
        CategoryPurpose::SaveCaptured { content } => stay.store(StoreRequest::CreateNote {
            category: name,
            note: content.clone(),
            captured: true,
        }),
    }
}

fn recover(state: FlowState, pending: Option<&Pending>, error: FlowError) -> TransitionResult {
    let result = match &error {
        FlowError::SessionExpired(_) => {
            TransitionResult::idle().reply(text::session_expired(), Keyboard::Main)
        }
        FlowError::MalformedId { .. } => {
            TransitionResult::idle().reply(text::flow_error(), owning_menu(state, pending))
        }
    };
    TransitionResult {
        recovered: Some(error),
        ..result
    }
}

// ============================================================
// Collaborator results
// ============================================================

#[allow(clippy::too_many_lines)] // One arm per collaborator outcome
fn on_stored(state: FlowState, pending: Option<&Pending>, outcome: StoreOutcome) -> TransitionResult {
    match outcome {
        StoreOutcome::Registered(result) => match result {
            Ok(true) => TransitionResult::new(FlowState::AwaitingName, None)
                .reply(text::ask_name(), Keyboard::Remove),
            Ok(false) => TransitionResult::idle(),
            Err(_) => failed(Keyboard::Main),
        },

        StoreOutcome::NameSaved { onboarding, result } => match result {
            Ok(_) if onboarding => TransitionResult::new(FlowState::AwaitingCity, None)
                .reply(text::ask_city(), Keyboard::Remove),
            Ok(user) => TransitionResult::idle().reply(text::profile(&user), Keyboard::Profile),
            Err(_) => failed(if onboarding { Keyboard::Main } else { Keyboard::Profile }),
        },

        StoreOutcome::CitySaved { onboarding, result } => match result {
            Ok(user) if onboarding => {
                TransitionResult::idle().reply(text::profile_complete(&user), Keyboard::Main)
            }
            Ok(user) => TransitionResult::idle().reply(text::profile(&user), Keyboard::Profile),
            Err(_) => failed(if onboarding { Keyboard::Main } else { Keyboard::Profile }),
        },

        StoreOutcome::Profile {
            for_weather: true,
            result,
        } => match result {
            Ok(user) if user.has_city() => TransitionResult::new(state, pending.cloned())
                .with_effect(Effect::FetchWeather { city: user.city }),
            Ok(_) | Err(StoreFailure::NotFound(_)) => {
                TransitionResult::new(FlowState::AwaitingWeatherCity, None)
                    .reply(text::ask_weather_city(), Keyboard::Back)
            }
            Err(_) => failed(Keyboard::Main),
        },
        StoreOutcome::Profile {
            for_weather: false,
            result,
        } => match result {
            Ok(user) => TransitionResult::idle().reply(text::profile(&user), Keyboard::Profile),
            Err(StoreFailure::NotFound(_)) => {
                TransitionResult::idle().reply(text::profile_missing(), Keyboard::Main)
            }
            Err(_) => failed(Keyboard::Settings),
        },

        StoreOutcome::WeatherToggled(result) => match result {
            Ok(enabled) => {
                TransitionResult::idle().reply(text::weather_toggled(enabled), Keyboard::Settings)
            }
            Err(StoreFailure::NotFound(_)) => {
                TransitionResult::idle().reply(text::profile_missing(), Keyboard::Main)
            }
            Err(_) => failed(Keyboard::Settings),
        },

        StoreOutcome::Categories { listing, result } => categories_loaded(listing, result),

        StoreOutcome::CategoryFound { intent, result } => match (intent, result) {
            (CategoryIntent::Delete, Ok(summary)) => TransitionResult::new(
                FlowState::ConfirmingCategoryDeletion,
                Some(Pending::DeleteCategory {
                    category_id: summary.category.id.to_string(),
                }),
            )
            .reply(text::confirm_category_deletion(&summary), Keyboard::Confirmation),
            (CategoryIntent::Rename, Ok(summary)) => TransitionResult::new(
                FlowState::EditingCategory,
                Some(Pending::RenameCategory {
                    category_id: summary.category.id.to_string(),
                }),
            )
            .reply(text::rename_category(&summary.category), Keyboard::Back),
            (_, Err(StoreFailure::NotFound(_))) => TransitionResult::idle()
                .reply(text::category_not_found(), Keyboard::CategoriesManagement),
            (_, Err(_)) => failed(Keyboard::CategoriesManagement),
        },

        StoreOutcome::CategoryCreated(result) => match result {
            Ok(category) => TransitionResult::idle()
                .reply(text::category_created(&category), Keyboard::CategoriesManagement),
            Err(StoreFailure::Conflict(name)) => TransitionResult::idle()
                .reply(text::category_exists(&name), Keyboard::CategoriesManagement),
            Err(_) => failed(Keyboard::CategoriesManagement),
        },

        StoreOutcome::CategoryRenamed(result) => match result {
            Ok(category) => TransitionResult::idle()
                .reply(text::category_renamed(&category), Keyboard::CategoriesManagement),
            Err(StoreFailure::Conflict(name)) => TransitionResult::idle()
                .reply(text::category_exists(&name), Keyboard::CategoriesManagement),
            Err(StoreFailure::NotFound(_)) => TransitionResult::idle()
                .reply(text::category_not_found(), Keyboard::CategoriesManagement),
            Err(_) => failed(Keyboard::CategoriesManagement),
        },

        StoreOutcome::CategoryDeleted(result) => match result {
            Ok(notes) => TransitionResult::idle()
                .reply(text::category_deleted(notes), Keyboard::CategoriesManagement),
            Err(StoreFailure::NotFound(_)) => TransitionResult::idle()
                .reply(text::category_not_found(), Keyboard::CategoriesManagement),
            Err(_) => failed(Keyboard::CategoriesManagement),
        },

        StoreOutcome::NoteCreated { captured, result } => {
            let keyboard = if captured { Keyboard::Main } else { Keyboard::Notes };
            match result {
                Ok(note) if captured => {
                    TransitionResult::idle().reply(text::captured_saved(&note), keyboard)
                }
                Ok(note) => {
                    TransitionResult::idle().reply(text::note_saved(&note.category_name), keyboard)
                }
                Err(StoreFailure::NotFound(_)) => {
                    TransitionResult::idle().reply(text::category_not_found(), keyboard)
                }
                Err(_) => failed(keyboard),
            }
        }

        StoreOutcome::Notes { listing, result } => notes_loaded(listing, result),

        StoreOutcome::NoteFound { purpose, result } => match (purpose, result) {
            (NotePurpose::EditNote, Ok(note)) => TransitionResult::new(
                FlowState::EditingNote,
                Some(Pending::ReviseNote {
                    note_id: note.id.to_string(),
                }),
            )
            .reply(text::edit_note(&note), Keyboard::NoteActions),
            (NotePurpose::DeleteNote, Ok(note)) => TransitionResult::new(
                FlowState::ConfirmingNoteDeletion,
                Some(Pending::DeleteNote {
                    note_id: note.id.to_string(),
                }),
            )
            .reply(text::confirm_note_deletion(&note), Keyboard::Confirmation),
            (_, Err(StoreFailure::NotFound(_))) => TransitionResult::idle()
                .reply(text::note_not_found(), Keyboard::NotesManagement),
            (_, Err(_)) => failed(Keyboard::NotesManagement),
        },

        StoreOutcome::NoteUpdated(result) => match result {
            Ok(_) => TransitionResult::idle().reply(text::note_updated(), Keyboard::NotesManagement),
            Err(StoreFailure::NotFound(_)) => TransitionResult::idle()
                .reply(text::note_not_found(), Keyboard::NotesManagement),
            Err(_) => failed(Keyboard::NotesManagement),
        },

        StoreOutcome::NoteDeleted(result) => match result {
            Ok(()) => TransitionResult::idle().reply(text::note_deleted(), Keyboard::NotesManagement),
            Err(StoreFailure::NotFound(_)) => TransitionResult::idle()
                .reply(text::note_not_found(), Keyboard::NotesManagement),
            Err(_) => failed(Keyboard::NotesManagement),
        },
    }
}

fn categories_loaded(
    listing: Listing,
    result: Result<Vec<crate::db::CategorySummary>, StoreFailure>,
) -> TransitionResult {
    match (listing, result) {
        (Listing::Overview, Ok(categories)) => TransitionResult::idle().reply(
            text::categories_overview(&categories),
            Keyboard::CategoriesManagement,
        ),
        (Listing::Overview, Err(_)) => failed(Keyboard::CategoriesManagement),

        (Listing::Select(_), Ok(categories)) if categories.is_empty() => {
            TransitionResult::idle().reply(text::no_categories(), Keyboard::CategoriesManagement)
        }
        (Listing::Select(purpose), Ok(categories)) => {
            let names = categories.iter().map(|c| c.category.name.clone()).collect();
            let prompt = text::choose_category(&purpose, &categories);
            TransitionResult::new(
                FlowState::AwaitingCategorySelection,
                Some(Pending::SelectCategory(purpose)),
            )
            .reply(prompt, Keyboard::Categories(names))
        }
        (Listing::Select(purpose), Err(_)) => failed(purpose_menu(&purpose)),
    }
}

fn notes_loaded(
    listing: NoteListing,
    result: Result<Vec<crate::db::Note>, StoreFailure>,
) -> TransitionResult {
    match (listing, result) {
        (NoteListing::Category(name), Ok(notes)) if notes.is_empty() => {
            TransitionResult::idle().reply(text::no_notes_in(&name), Keyboard::Notes)
        }
        (NoteListing::Category(name), Ok(notes)) => TransitionResult::idle().with_effect(
            Effect::ShowNotes {
                header: text::notes_header(&name, notes.len()),
                notes,
                footer: Some(text::notes_footer().to_string()),
                keyboard: Keyboard::NotesView,
            },
        ),
        (NoteListing::Category(_), Err(StoreFailure::NotFound(_))) => {
            TransitionResult::idle().reply(text::category_not_found(), Keyboard::Notes)
        }
        (NoteListing::Category(_), Err(_)) => failed(Keyboard::Notes),

        (NoteListing::Media, Ok(notes)) if notes.is_empty() => {
            TransitionResult::idle().reply(text::no_media_notes(), Keyboard::NotesView)
        }
        (NoteListing::Media, Ok(notes)) => TransitionResult::idle().with_effect(Effect::ShowNotes {
            header: text::media_header(notes.len()),
            notes,
            footer: None,
            keyboard: Keyboard::NotesView,
        }),
        (NoteListing::Media, Err(_)) => failed(Keyboard::NotesView),

        (NoteListing::Select(_), Ok(notes)) if notes.is_empty() => {
            TransitionResult::idle().reply(text::no_notes(), Keyboard::NotesManagement)
        }
        (NoteListing::Select(purpose), Ok(notes)) => TransitionResult::new(
            FlowState::AwaitingNoteSelection,
            Some(Pending::SelectNote { purpose }),
        )
        .reply(text::note_selection(purpose, &notes), Keyboard::Back),
        (NoteListing::Select(_), Err(_)) => failed(Keyboard::NotesManagement),
    }
}

// ============================================================
// Helpers
// ============================================================

/// Collaborator failure: tell the user, land on a menu
fn failed(keyboard: Keyboard) -> TransitionResult {
    TransitionResult::idle().reply(text::try_later(), keyboard)
}

fn menu_result(keyboard: Keyboard) -> TransitionResult {
    TransitionResult::idle().with_effect(menu_reply(keyboard))
}

fn menu_reply(keyboard: Keyboard) -> Effect {
    let title = match keyboard {
        Keyboard::Settings => text::settings(),
        Keyboard::Notes | Keyboard::NotesView => text::notes_menu(),
        Keyboard::NotesManagement => text::notes_management(),
        Keyboard::CategoriesManagement => "📂 Manage categories",
        Keyboard::Profile => "👤 Profile",
        _ => text::main_menu(),
    };
    Effect::reply(title, keyboard)
}

/// The menu a flow returns to when it is left
fn owning_menu(state: FlowState, pending: Option<&Pending>) -> Keyboard {
    match state {
        FlowState::Idle
        | FlowState::AwaitingName
        | FlowState::AwaitingCity
        | FlowState::AwaitingWeatherCity => Keyboard::Main,
        FlowState::AwaitingNameEdit | FlowState::AwaitingCityEdit => Keyboard::Profile,
        FlowState::AwaitingCategoryName
        | FlowState::EditingCategory
        | FlowState::ConfirmingCategoryDeletion => Keyboard::CategoriesManagement,
        FlowState::AwaitingCategorySelection => match pending {
            Some(Pending::SelectCategory(purpose)) => purpose_menu(purpose),
            _ => Keyboard::Notes,
        },
        FlowState::AwaitingNoteContent => Keyboard::Notes,
        FlowState::AwaitingNoteSelection
        | FlowState::EditingNote
        | FlowState::ConfirmingNoteDeletion => Keyboard::NotesManagement,
    }
}

fn purpose_menu(purpose: &CategoryPurpose) -> Keyboard {
    match purpose {
        CategoryPurpose::NewNote | CategoryPurpose::ViewNotes => Keyboard::Notes,
        CategoryPurpose::DeleteCategory | CategoryPurpose::EditCategory => {
            Keyboard::CategoriesManagement
        }
        CategoryPurpose::SaveCaptured { .. } => Keyboard::Main,
    }
}

fn keyboard_for_text_input(state: FlowState) -> Keyboard {
    if matches!(state, FlowState::AwaitingName | FlowState::AwaitingCity) {
        Keyboard::Remove
    } else {
        Keyboard::Back
    }
}

fn is_confirming(state: FlowState) -> bool {
    matches!(
        state,
        FlowState::ConfirmingCategoryDeletion | FlowState::ConfirmingNoteDeletion
    )
}

/// Identifier stashed in a pending slot
fn parse_id(slot: &'static str, value: &str) -> Result<i64, FlowError> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| FlowError::MalformedId {
            slot,
            value: value.to_string(),
        })
}

/// Note number typed by the user, as shown in the selection list
fn parse_note_number(text: &str) -> Option<i64> {
    text.trim()
        .trim_matches('`')
        .trim_start_matches('#')
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
}
