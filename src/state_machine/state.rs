//! Conversation flow state types

use crate::db::NewNote;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named position of a conversation inside a multi-step flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    /// No active flow; input is matched against the command table
    #[default]
    Idle,

    // Onboarding
    AwaitingName,
    AwaitingCity,

    // Profile edits
    AwaitingNameEdit,
    AwaitingCityEdit,

    AwaitingWeatherCity,

    // Categories
    AwaitingCategoryName,
    EditingCategory,
    ConfirmingCategoryDeletion,

    /// Shared by every flow that starts by picking a category
    AwaitingCategorySelection,

    // Notes
    AwaitingNoteContent,
    /// Shared by the edit and delete note flows
    AwaitingNoteSelection,
    EditingNote,
    ConfirmingNoteDeletion,
}

impl FlowState {
    pub fn is_idle(self) -> bool {
        matches!(self, FlowState::Idle)
    }

    pub fn name(self) -> &'static str {
        match self {
            FlowState::Idle => "idle",
            FlowState::AwaitingName => "awaiting_name",
            FlowState::AwaitingCity => "awaiting_city",
            FlowState::AwaitingNameEdit => "awaiting_name_edit",
            FlowState::AwaitingCityEdit => "awaiting_city_edit",
            FlowState::AwaitingWeatherCity => "awaiting_weather_city",
            FlowState::AwaitingCategoryName => "awaiting_category_name",
            FlowState::EditingCategory => "editing_category",
            FlowState::ConfirmingCategoryDeletion => "confirming_category_deletion",
            FlowState::AwaitingCategorySelection => "awaiting_category_selection",
            FlowState::AwaitingNoteContent => "awaiting_note_content",
            FlowState::AwaitingNoteSelection => "awaiting_note_selection",
            FlowState::EditingNote => "editing_note",
            FlowState::ConfirmingNoteDeletion => "confirming_note_deletion",
        }
    }

    /// Whether handling input in this state needs a pending payload
    pub fn requires_pending(self) -> bool {
        matches!(
            self,
            FlowState::EditingCategory
                | FlowState::ConfirmingCategoryDeletion
                | FlowState::AwaitingCategorySelection
                | FlowState::AwaitingNoteContent
                | FlowState::AwaitingNoteSelection
                | FlowState::EditingNote
                | FlowState::ConfirmingNoteDeletion
        )
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a category selection is for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "purpose", rename_all = "snake_case")]
pub enum CategoryPurpose {
    NewNote,
    ViewNotes,
    DeleteCategory,
    EditCategory,
    /// Content sent while idle, waiting for a category to be filed under
    SaveCaptured { content: NewNote },
}

/// What a note selection is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotePurpose {
    EditNote,
    DeleteNote,
}

/// Operation-scoped payload carried across the turns of one flow.
///
/// Identifier slots hold decimal strings exactly as they were captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Pending {
    SelectCategory(CategoryPurpose),
    NoteContent { category: String },
    SelectNote { purpose: NotePurpose },
    ReviseNote { note_id: String },
    RenameCategory { category_id: String },
    DeleteCategory { category_id: String },
    DeleteNote { note_id: String },
}

/// Flat purpose tag, for logs and statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    NewNote,
    ViewNotes,
    DeleteCategory,
    EditCategory,
    SaveCaptured,
    EditNote,
    DeleteNote,
}

impl Purpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Purpose::NewNote => "new_note",
            Purpose::ViewNotes => "view_notes",
            Purpose::DeleteCategory => "delete_category",
            Purpose::EditCategory => "edit_category",
            Purpose::SaveCaptured => "save_captured",
            Purpose::EditNote => "edit_note",
            Purpose::DeleteNote => "delete_note",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Pending {
    pub fn purpose(&self) -> Purpose {
        match self {
            Pending::SelectCategory(purpose) => match purpose {
                CategoryPurpose::NewNote => Purpose::NewNote,
                CategoryPurpose::ViewNotes => Purpose::ViewNotes,
                CategoryPurpose::DeleteCategory => Purpose::DeleteCategory,
                CategoryPurpose::EditCategory => Purpose::EditCategory,
                CategoryPurpose::SaveCaptured { .. } => Purpose::SaveCaptured,
            },
            Pending::NoteContent { .. } => Purpose::NewNote,
            Pending::SelectNote { purpose } => match purpose {
                NotePurpose::EditNote => Purpose::EditNote,
                NotePurpose::DeleteNote => Purpose::DeleteNote,
            },
            Pending::ReviseNote { .. } => Purpose::EditNote,
            Pending::RenameCategory { .. } => Purpose::EditCategory,
            Pending::DeleteCategory { .. } => Purpose::DeleteCategory,
            Pending::DeleteNote { .. } => Purpose::DeleteNote,
        }
    }

    /// Whether this payload is the one `state` expects
    pub fn fits(&self, state: FlowState) -> bool {
        matches!(
            (state, self),
            (FlowState::AwaitingCategorySelection, Pending::SelectCategory(_))
                | (FlowState::AwaitingNoteContent, Pending::NoteContent { .. })
                | (FlowState::AwaitingNoteSelection, Pending::SelectNote { .. })
                | (FlowState::EditingNote, Pending::ReviseNote { .. })
                | (FlowState::EditingCategory, Pending::RenameCategory { .. })
                | (FlowState::ConfirmingCategoryDeletion, Pending::DeleteCategory { .. })
                | (FlowState::ConfirmingNoteDeletion, Pending::DeleteNote { .. })
        )
    }
}

/// Per-turn facts the transition needs beyond state and pending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnContext {
    pub chat_id: i64,
    /// Length of the outbound message history, used to pick category colors
    pub history_len: usize,
    /// The conversation lost an unfinished flow to eviction or expiry
    pub interrupted: bool,
}

impl TurnContext {
    pub fn new(chat_id: i64) -> Self {
        Self {
            chat_id,
            history_len: 0,
            interrupted: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purpose_follows_the_flow_not_the_step() {
        assert_eq!(
            Pending::SelectCategory(CategoryPurpose::NewNote).purpose(),
            Pending::NoteContent {
                category: "Work".into()
            }
            .purpose()
        );
        assert_eq!(
            Pending::SelectNote {
                purpose: NotePurpose::DeleteNote
            }
            .purpose(),
            Purpose::DeleteNote
        );
        assert_eq!(
            Pending::SelectCategory(CategoryPurpose::SaveCaptured {
                content: NewNote::text("hi")
            })
            .purpose(),
            Purpose::SaveCaptured
        );
    }

    #[test]
    fn states_needing_pending_have_a_matching_payload() {
        let samples = [
            Pending::SelectCategory(CategoryPurpose::ViewNotes),
            Pending::NoteContent {
                category: "Work".into(),
            },
            Pending::SelectNote {
                purpose: NotePurpose::EditNote,
            },
            Pending::ReviseNote { note_id: "1".into() },
            Pending::RenameCategory {
                category_id: "1".into(),
            },
            Pending::DeleteCategory {
                category_id: "1".into(),
            },
            Pending::DeleteNote { note_id: "1".into() },
        ];
        for state in [
            FlowState::EditingCategory,
            FlowState::ConfirmingCategoryDeletion,
            FlowState::AwaitingCategorySelection,
            FlowState::AwaitingNoteContent,
            FlowState::AwaitingNoteSelection,
            FlowState::EditingNote,
            FlowState::ConfirmingNoteDeletion,
        ] {
            assert!(state.requires_pending());
            assert_eq!(samples.iter().filter(|p| p.fits(state)).count(), 1, "{state}");
        }
        assert!(!FlowState::AwaitingName.requires_pending());
    }

    #[test]
    fn pending_serializes_with_type_tag() {
        let pending = Pending::DeleteNote { note_id: "42".into() };
        let json = serde_json::to_value(&pending).unwrap();
        assert_eq!(json["type"], "delete_note");
        assert_eq!(json["note_id"], "42");
    }
}
