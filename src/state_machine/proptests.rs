//! Property-based tests for the flow state machine
//!
//! These tests verify key invariants hold across arbitrary inputs.

use super::menu::Command;
use super::state::*;
use super::transition::*;
use super::*;
use crate::db::{Category, CategorySummary, NewNote, Note, NoteKind, User};
use chrono::Utc;
use proptest::prelude::*;

const CHAT: i64 = 7;

// ============================================================================
// Test Helpers
// ============================================================================

fn is_consistent(state: FlowState, pending: Option<&Pending>) -> bool {
    if state.requires_pending() {
        pending.is_some_and(|p| p.fits(state))
    } else {
        pending.is_none()
    }
}

fn user(city: &str) -> User {
    User {
        chat_id: CHAT,
        username: String::new(),
        first_name: "Sam".to_string(),
        last_name: String::new(),
        city: city.to_string(),
        weather_notifications: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn summary(id: i64, name: String) -> CategorySummary {
    CategorySummary {
        category: Category {
            id,
            chat_id: CHAT,
            name,
            color: "🔵".to_string(),
            created_at: Utc::now(),
        },
        note_count: 0,
    }
}

fn note(id: i64) -> Note {
    Note {
        id,
        chat_id: CHAT,
        category_id: 1,
        category_name: "Work".to_string(),
        kind: NoteKind::Text,
        content: "text".to_string(),
        file_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_state() -> impl Strategy<Value = FlowState> {
    prop_oneof![
        Just(FlowState::Idle),
        Just(FlowState::AwaitingName),
        Just(FlowState::AwaitingCity),
        Just(FlowState::AwaitingNameEdit),
        Just(FlowState::AwaitingCityEdit),
        Just(FlowState::AwaitingWeatherCity),
        Just(FlowState::AwaitingCategoryName),
        Just(FlowState::EditingCategory),
        Just(FlowState::ConfirmingCategoryDeletion),
        Just(FlowState::AwaitingCategorySelection),
        Just(FlowState::AwaitingNoteContent),
        Just(FlowState::AwaitingNoteSelection),
        Just(FlowState::EditingNote),
        Just(FlowState::ConfirmingNoteDeletion),
    ]
}

fn arb_category_purpose() -> impl Strategy<Value = CategoryPurpose> {
    prop_oneof![
        Just(CategoryPurpose::NewNote),
        Just(CategoryPurpose::ViewNotes),
        Just(CategoryPurpose::DeleteCategory),
        Just(CategoryPurpose::EditCategory),
        "[a-z ]{1,20}".prop_map(|text| CategoryPurpose::SaveCaptured {
            content: NewNote::text(text)
        }),
    ]
}

fn arb_note_purpose() -> impl Strategy<Value = NotePurpose> {
    prop_oneof![Just(NotePurpose::EditNote), Just(NotePurpose::DeleteNote)]
}

/// Ids as stored in pending slots, sometimes garbage
fn arb_slot_id() -> impl Strategy<Value = String> {
    prop_oneof![
        (1i64..1000).prop_map(|id| id.to_string()),
        "[a-z]{0,6}",
        Just("-3".to_string()),
    ]
}

fn arb_pending() -> impl Strategy<Value = Pending> {
    prop_oneof![
        arb_category_purpose().prop_map(Pending::SelectCategory),
        "[A-Za-z]{1,10}".prop_map(|category| Pending::NoteContent { category }),
        arb_note_purpose().prop_map(|purpose| Pending::SelectNote { purpose }),
        arb_slot_id().prop_map(|note_id| Pending::ReviseNote { note_id }),
        arb_slot_id().prop_map(|category_id| Pending::RenameCategory { category_id }),
        arb_slot_id().prop_map(|category_id| Pending::DeleteCategory { category_id }),
        arb_slot_id().prop_map(|note_id| Pending::DeleteNote { note_id }),
    ]
}

fn arb_command() -> impl Strategy<Value = Command> {
    prop_oneof![
        Just(Command::Start),
        Just(Command::Cancel),
        Just(Command::Weather),
        Just(Command::Notes),
        Just(Command::Settings),
        Just(Command::Profile),
        Just(Command::Back),
        Just(Command::Home),
        Just(Command::YourName),
        Just(Command::YourCity),
        Just(Command::NewNote),
        Just(Command::MyNotes),
        Just(Command::BackToNotes),
        Just(Command::EditNote),
        Just(Command::DeleteNote),
        Just(Command::RemoveNote),
        Just(Command::CreateCategory),
        Just(Command::NewCategory),
        Just(Command::DeleteCategory),
        Just(Command::Yes),
        Just(Command::No),
    ]
}

fn arb_message() -> impl Strategy<Value = Event> {
    prop_oneof![
        arb_command().prop_map(|c| Event::Message(Inbound::text(CHAT, c.label()))),
        "[a-zA-Z ]{0,20}".prop_map(|t| Event::Message(Inbound::text(CHAT, t))),
        (1i64..50).prop_map(|n| Event::Message(Inbound::text(CHAT, n.to_string()))),
        Just(Event::Message(Inbound::media(
            CHAT,
            Media {
                kind: NoteKind::Photo,
                file_id: "file".to_string(),
                caption: None,
            },
        ))),
    ]
}

fn arb_failure() -> impl Strategy<Value = StoreFailure> {
    prop_oneof![
        "[a-z]{1,8}".prop_map(StoreFailure::NotFound),
        "[a-z]{1,8}".prop_map(StoreFailure::Conflict),
        "[a-z]{1,8}".prop_map(StoreFailure::Unavailable),
    ]
}

fn arb_outcome() -> impl Strategy<Value = StoreOutcome> {
    prop_oneof![
        prop_oneof![
            Just(Ok::<bool, StoreFailure>(true)),
            Just(Ok(false)),
            arb_failure().prop_map(Err)
        ]
        .prop_map(StoreOutcome::Registered),
        (any::<bool>(), "[A-Za-z]{0,8}").prop_map(|(onboarding, city)| {
            StoreOutcome::CitySaved {
                onboarding,
                result: Ok(user(&city)),
            }
        }),
        (any::<bool>(), "[A-Za-z]{0,8}").prop_map(|(for_weather, city)| {
            StoreOutcome::Profile {
                for_weather,
                result: Ok(user(&city)),
            }
        }),
        (
            arb_category_purpose(),
            proptest::collection::vec("[A-Za-z]{1,8}", 0..4)
        )
            .prop_map(|(purpose, names)| StoreOutcome::Categories {
                listing: Listing::Select(purpose),
                result: Ok((1..).zip(names).map(|(id, n)| summary(id, n)).collect()),
            }),
        (1i64..100, any::<bool>()).prop_map(|(id, delete)| StoreOutcome::CategoryFound {
            intent: if delete {
                CategoryIntent::Delete
            } else {
                CategoryIntent::Rename
            },
            result: Ok(summary(id, "Work".to_string())),
        }),
        (arb_note_purpose(), 0i64..3).prop_map(|(purpose, n)| StoreOutcome::Notes {
            listing: NoteListing::Select(purpose),
            result: Ok((1..=n).map(note).collect()),
        }),
        (arb_note_purpose(), 1i64..100).prop_map(|(purpose, id)| StoreOutcome::NoteFound {
            purpose,
            result: Ok(note(id)),
        }),
        arb_failure().prop_map(|f| StoreOutcome::NoteDeleted(Err(f))),
        arb_failure().prop_map(|f| StoreOutcome::CategoryCreated(Err(f))),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        3 => arb_message(),
        2 => arb_outcome().prop_map(Event::Stored),
        1 => ("[A-Za-z]{1,8}", any::<bool>()).prop_map(|(city, ok)| Event::Forecast {
            result: if ok { Ok(format!("sunny in {city}")) } else { Err("down".to_string()) },
            city,
        }),
    ]
}

/// A state paired with a payload it may or may not accept
fn arb_session() -> impl Strategy<Value = (FlowState, Option<Pending>)> {
    (arb_state(), proptest::option::of(arb_pending()))
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    // State and pending payload always agree after a transition
    #[test]
    fn prop_transitions_keep_pending_consistent(events in proptest::collection::vec(arb_event(), 0..25)) {
        let mut state = FlowState::Idle;
        let mut pending: Option<Pending> = None;
        let ctx = TurnContext::new(CHAT);

        for event in events {
            let result = transition(state, pending.as_ref(), &ctx, event);
            state = result.new_state;
            pending = result.pending;
            prop_assert!(
                is_consistent(state, pending.as_ref()),
                "Inconsistent session: {:?} / {:?}",
                state,
                pending
            );
        }
    }

    // Escape commands always land in idle with nothing pending
    #[test]
    fn prop_escape_clears_flow(
        (state, pending) in arb_session(),
        escape in prop_oneof![
            Just(Command::Cancel),
            Just(Command::Back),
            Just(Command::Home),
            Just(Command::BackToNotes),
        ]
    ) {
        let event = Event::Message(Inbound::text(CHAT, escape.label()));
        let result = transition(state, pending.as_ref(), &TurnContext::new(CHAT), event);
        prop_assert_eq!(result.new_state, FlowState::Idle);
        prop_assert!(result.pending.is_none());
        prop_assert!(result.effects.iter().all(Effect::is_outbound));
    }

    // A flow state without its payload recovers to idle with the expired notice
    #[test]
    fn prop_missing_pending_recovers(state in arb_state(), text in "[a-z]{1,12}") {
        prop_assume!(state.requires_pending());
        let event = Event::Message(Inbound::text(CHAT, text));
        let result = transition(state, None, &TurnContext::new(CHAT), event);
        prop_assert_eq!(result.new_state, FlowState::Idle);
        prop_assert!(result.pending.is_none());
        prop_assert_eq!(result.recovered, Some(FlowError::SessionExpired(state)));
        prop_assert_eq!(
            result.effects,
            vec![Effect::reply(text::session_expired(), Keyboard::Main)]
        );
    }

    // Confirming with a garbage id never reaches the store
    #[test]
    fn prop_malformed_id_never_stored(id in "[a-z]{0,6}", notes in any::<bool>()) {
        let (state, pending) = if notes {
            (FlowState::ConfirmingNoteDeletion, Pending::DeleteNote { note_id: id })
        } else {
            (FlowState::ConfirmingCategoryDeletion, Pending::DeleteCategory { category_id: id })
        };
        let event = Event::Message(Inbound::text(CHAT, "yes"));
        let result = transition(state, Some(&pending), &TurnContext::new(CHAT), event);
        prop_assert_eq!(result.new_state, FlowState::Idle);
        let is_malformed = matches!(result.recovered, Some(FlowError::MalformedId { .. }));
        prop_assert!(is_malformed);
        prop_assert!(result.effects.iter().all(Effect::is_outbound));
    }

    // Anything but yes/no/escape re-prompts and keeps the payload
    #[test]
    fn prop_confirmation_holds_until_answered(id in 1i64..1000, text in "[a-z]{1,12}") {
        prop_assume!(Command::parse(&text).is_none());
        prop_assume!(Command::parse_confirmation(&text).is_none());
        let pending = Pending::DeleteNote { note_id: id.to_string() };
        let event = Event::Message(Inbound::text(CHAT, text));
        let result = transition(
            FlowState::ConfirmingNoteDeletion,
            Some(&pending),
            &TurnContext::new(CHAT),
            event,
        );
        prop_assert_eq!(result.new_state, FlowState::ConfirmingNoteDeletion);
        prop_assert_eq!(result.pending, Some(pending));
    }

    // Interrupted conversations never file plain text as a note
    #[test]
    fn prop_interrupted_text_is_not_captured(text in "[a-z]{1,20}") {
        prop_assume!(Command::parse(&text).is_none());
        let ctx = TurnContext { interrupted: true, ..TurnContext::new(CHAT) };
        let event = Event::Message(Inbound::text(CHAT, text));
        let result = transition(FlowState::Idle, None, &ctx, event);
        prop_assert_eq!(result.new_state, FlowState::Idle);
        prop_assert!(result.effects.iter().all(Effect::is_outbound));
    }
}
