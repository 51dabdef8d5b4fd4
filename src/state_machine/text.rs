//! User-facing message templates

use super::state::{CategoryPurpose, NotePurpose};
use crate::db::{Category, CategorySummary, Note, NoteKind, User};
use std::fmt::Write as _;

/// Longest message the transport accepts
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Notes listed when asking the user to pick one
pub const SELECTION_LIMIT: usize = 10;

/// Colors assigned to new categories
pub const CATEGORY_COLORS: [&str; 6] = ["🔵", "🟢", "🟡", "🟠", "🔴", "🟣"];

const LIST_MARKS: [&str; 8] = ["🔵", "🟢", "🟡", "🟠", "🔴", "🟣", "⚫️", "⚪️"];

const DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

pub fn category_color(history_len: usize) -> &'static str {
    CATEGORY_COLORS[history_len % CATEGORY_COLORS.len()]
}

// ============================================================
// General
// ============================================================

pub fn welcome() -> String {
    "👋 Welcome to Green Assistant!\n\n\
     ✨ What I can do:\n\
     • 👤 Keep your profile\n\
     • 🌡️ Tell you the weather\n\
     • 🗒️ File notes, photos and voice messages into categories\n\
     • 🔔 Send a daily forecast\n\n\
     Forward me anything and I will offer to save it."
        .to_string()
}

pub fn main_menu() -> &'static str {
    "Choose an item from the menu"
}

pub fn use_menu() -> &'static str {
    "Use the menu to navigate"
}

pub fn session_expired() -> &'static str {
    "⌛ Your session has expired, please start again"
}

pub fn try_later() -> &'static str {
    "❌ Something went wrong. Please try again later."
}

pub fn flow_error() -> &'static str {
    "❌ Something went wrong, returning to the menu"
}

pub fn info() -> &'static str {
    "ℹ️ Green Assistant keeps your notes, categories and daily weather in one chat.\n\n\
     Use the menu buttons to move around, or send /start to begin again."
}

pub fn support() -> &'static str {
    "📞 Having trouble? Send /cancel to leave any step, or /start to set up your profile again."
}

pub fn settings() -> &'static str {
    "⚙️ Settings"
}

pub fn notifications() -> &'static str {
    "🔔 Notifications\n\n\
     Toggle \"🌡️ Weather notifications\" to receive a forecast for your city every morning."
}

pub fn weather_toggled(enabled: bool) -> String {
    let status = if enabled { "enabled" } else { "disabled" };
    format!("Weather notifications {status}")
}

// ============================================================
// Profile
// ============================================================

pub fn ask_name() -> &'static str {
    "✏️ Please enter your name:"
}

pub fn ask_city() -> &'static str {
    "🚩 Please enter your city:"
}

pub fn enter_text() -> &'static str {
    "✏️ Please send this as text"
}

pub fn profile_complete(user: &User) -> String {
    format!(
        "✅ Profile complete!\n\n👤 Your profile:\n✏️ Name: {}\n🚩 City: {}",
        user.first_name, user.city
    )
}

pub fn profile(user: &User) -> String {
    format!(
        "👤 Your profile\n✏️ Name: {}\n🚩 City: {}",
        user.first_name, user.city
    )
}

pub fn profile_missing() -> &'static str {
    "👤 No profile yet. Send /start to create one."
}

// ============================================================
// Weather
// ============================================================

pub fn ask_weather_city() -> &'static str {
    "🌍 Enter a city name:"
}

pub fn weather_failed(city: &str) -> String {
    format!("❌ Could not get the weather for '{city}'")
}

// ============================================================
// Categories
// ============================================================

pub fn notes_menu() -> &'static str {
    "🗒️ Notes\n\n\
     Create notes, browse them by category, or manage what you have."
}

pub fn notes_management() -> &'static str {
    "🛠️ Manage notes\n\n\
     • ✏️ Edit note changes its text\n\
     • 🗑️ Delete note removes it for good"
}

pub fn categories_overview(categories: &[CategorySummary]) -> String {
    if categories.is_empty() {
        return "📂 Manage categories\n\nYou have no categories yet. Create the first one.".to_string();
    }
    let mut text = String::from("📂 Manage categories\n\nYour categories:\n\n");
    for summary in categories {
        let _ = writeln!(
            text,
            "{} {} - {} notes",
            summary.category.color, summary.category.name, summary.note_count
        );
    }
    text
}

pub fn no_categories() -> &'static str {
    "📂 You have no categories yet. Create one first."
}

pub fn choose_category(purpose: &CategoryPurpose, categories: &[CategorySummary]) -> String {
    let title = match purpose {
        CategoryPurpose::NewNote => "📝 Choose a category for the new note:",
        CategoryPurpose::ViewNotes => "📁 Choose a category to view:",
        CategoryPurpose::DeleteCategory => "🗑️ Choose a category to delete:",
        CategoryPurpose::EditCategory => "✏️ Choose a category to edit:",
        CategoryPurpose::SaveCaptured { .. } => "📥 Where should I save this?",
    };
    let mut text = format!("{title}\n\n");
    for (i, summary) in categories.iter().enumerate() {
        let _ = writeln!(
            text,
            "{} {} - {} notes",
            LIST_MARKS[i % LIST_MARKS.len()],
            summary.category.name,
            summary.note_count
        );
    }
    text
}

pub fn choose_from_keyboard() -> &'static str {
    "👇 Please choose a category from the keyboard"
}

pub fn ask_category_name() -> &'static str {
    "📂 Enter a name for the new category:"
}

pub fn category_name_empty() -> &'static str {
    "❌ Category name cannot be empty"
}

pub fn category_created(category: &Category) -> String {
    format!("✅ Category \"{}\" {} created", category.name, category.color)
}

pub fn category_exists(name: &str) -> String {
    format!("❌ A category named \"{name}\" already exists")
}

pub fn category_not_found() -> &'static str {
    "❌ Category not found"
}

pub fn rename_category(category: &Category) -> String {
    format!(
        "✏️ Editing category\n\n📂 Current name: {}\n🎨 Color: {}\n\nEnter a new name:",
        category.name, category.color
    )
}

pub fn category_renamed(category: &Category) -> String {
    format!("✅ Category renamed to \"{}\"", category.name)
}

pub fn confirm_category_deletion(summary: &CategorySummary) -> String {
    format!(
        "⚠️ Confirm deletion\n\nCategory: {}\nNotes: {}\n\n\
         Every note in this category will be deleted for good.",
        summary.category.name, summary.note_count
    )
}

pub fn category_deleted(notes: usize) -> String {
    format!("✅ Category deleted together with {notes} notes")
}

pub fn answer_yes_or_no() -> &'static str {
    "❓ Please answer \"✅ Yes\" or \"❌ No\""
}

pub fn deletion_cancelled() -> &'static str {
    "❌ Deletion cancelled"
}

// ============================================================
// Notes
// ============================================================

pub fn ask_note_content(category: &str) -> String {
    format!("📝 Send the note for \"{category}\": text, a photo, a video, a voice message or a file")
}

pub fn note_saved(category: &str) -> String {
    format!("✅ Note saved to \"{category}\"!")
}

/// Confirmation for content captured outside the new-note flow
pub fn captured_saved(note: &Note) -> String {
    let what = match note.kind {
        NoteKind::Text => "Text saved",
        NoteKind::Link => "Link saved",
        NoteKind::Photo => "Photo saved",
        NoteKind::Video => "Video saved",
        NoteKind::Voice => "Voice message saved",
        NoteKind::File => "File saved",
    };
    let mut text = format!("✅ {what} to \"{}\"!", note.category_name);
    if !note.content.is_empty() {
        let _ = write!(text, "\n\n{} {}", note.kind.emoji(), note.content);
    }
    text
}

pub fn nothing_to_save() -> &'static str {
    "❌ This kind of message cannot be saved"
}

pub fn no_notes() -> &'static str {
    "📝 You have no notes yet"
}

pub fn no_notes_in(category: &str) -> String {
    format!("📝 There are no notes in \"{category}\" yet")
}

pub fn no_media_notes() -> &'static str {
    "📸 You have no media notes yet"
}

pub fn notes_header(category: &str, count: usize) -> String {
    format!("📋 Notes in \"{category}\": {count}")
}

pub fn media_header(count: usize) -> String {
    format!("📸 Media notes: {count}")
}

pub fn notes_footer() -> &'static str {
    "🛠️ Use the management menu to edit or delete notes"
}

/// Numbered list for picking a note, capped at [`SELECTION_LIMIT`]
pub fn note_selection(purpose: NotePurpose, notes: &[Note]) -> String {
    let title = match purpose {
        NotePurpose::EditNote => "✏️ Send the number of the note to edit:",
        NotePurpose::DeleteNote => "🗑️ Send the number of the note to delete:",
    };
    let mut text = format!("{title}\n\n");
    for note in notes.iter().take(SELECTION_LIMIT) {
        let _ = writeln!(text, "{} `{}`: {}", note.kind.emoji(), note.id, short_preview(note, 50));
    }
    if notes.len() > SELECTION_LIMIT {
        let _ = write!(text, "\n... and {} more", notes.len() - SELECTION_LIMIT);
    }
    text
}

pub fn ask_note_number() -> &'static str {
    "🔢 Please send the note number from the list"
}

pub fn note_not_found() -> &'static str {
    "❌ Note not found"
}

pub fn edit_note(note: &Note) -> String {
    format!(
        "✏️ Editing note\n\n{}\n\n📂 Category: {}\n📅 Created: {}\n\n\
         Send the new text, or press \"🗑️ Delete\".",
        short_preview(note, 100),
        note.category_name,
        note.created_at.format(DATE_FORMAT)
    )
}

pub fn confirm_note_deletion(note: &Note) -> String {
    format!(
        "⚠️ Confirm deletion\n\n{}\n\n📂 Category: {}\n📅 Created: {}\n\n\
         The note will be deleted for good.",
        short_preview(note, 100),
        note.category_name,
        note.created_at.format(DATE_FORMAT)
    )
}

pub fn note_updated() -> &'static str {
    "✅ Note updated"
}

pub fn note_deleted() -> &'static str {
    "✅ Note deleted"
}

fn short_preview(note: &Note, limit: usize) -> String {
    let label = match note.kind {
        NoteKind::Text | NoteKind::Link => return truncate(&note.content, limit),
        NoteKind::Photo => "🖼️ Photo",
        NoteKind::Video => "🎥 Video",
        NoteKind::Voice => "🎤 Voice message",
        NoteKind::File => "📎 File",
    };
    if note.content.is_empty() {
        label.to_string()
    } else {
        format!("{label}: {}", truncate(&note.content, limit))
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let mut short: String = text.chars().take(limit).collect();
        short.push_str("...");
        short
    } else {
        text.to_string()
    }
}

/// Full rendering of one note when browsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub text: String,
    /// Media to send with `text` as caption
    pub media: Option<(NoteKind, String)>,
}

pub fn note_preview(note: &Note) -> Preview {
    let title = match note.kind {
        NoteKind::Text => "Text note",
        NoteKind::Link => "Link",
        NoteKind::Photo => "Photo note",
        NoteKind::Video => "Video note",
        NoteKind::Voice => "Voice note",
        NoteKind::File => "File",
    };
    let mut text = format!(
        "{} {title}\n📂 Category: {}\n📅 {}",
        note.kind.emoji(),
        note.category_name,
        note.created_at.format(DATE_FORMAT)
    );
    if !note.content.is_empty() {
        if note.kind.is_media() || note.kind == NoteKind::File {
            let _ = write!(text, "\n📝 Caption: {}", note.content);
        } else {
            let _ = write!(text, "\n\n{}", note.content);
        }
    }

    let media = note
        .file_id
        .as_ref()
        .filter(|_| note.kind.is_media())
        .map(|file_id| (note.kind, file_id.clone()));
    Preview { text, media }
}

/// Byte length of the longest prefix of `text` that fits in `max_units`
/// UTF-16 code units, the unit Telegram counts its limits in
pub fn utf16_prefix_len(text: &str, max_units: usize) -> usize {
    let mut units = 0;
    for (i, c) in text.char_indices() {
        units += c.len_utf16();
        if units > max_units {
            return i;
        }
    }
    text.len()
}

/// Split text into chunks of at most `max_len` UTF-16 code units, preferring
/// line breaks, then spaces. Leading whitespace of each following chunk is dropped.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(2);
    let mut parts = Vec::new();
    let mut rest = text;

    while utf16_prefix_len(rest, max_len) < rest.len() {
        let limit = utf16_prefix_len(rest, max_len);
        let (window, _) = rest.split_at(limit);
        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|i| *i > 0)
            .unwrap_or(limit);

        let (head, tail) = rest.split_at(cut);
        parts.push(head.to_string());
        rest = tail.trim_start_matches([' ', '\n']);
    }
    if !rest.is_empty() || parts.is_empty() {
        parts.push(rest.to_string());
    }
    parts
}
