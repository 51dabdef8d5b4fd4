//! Reply keyboards and the menu command table

use serde::Serialize;

/// Fixed reply keyboards the bot can attach to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum Keyboard {
    Main,
    Settings,
    Profile,
    Notes,
    NotesView,
    NotesManagement,
    CategoriesManagement,
    /// One button per category, two per row
    Categories(Vec<String>),
    NoteActions,
    Back,
    Confirmation,
    /// Hide any keyboard the client shows
    Remove,
}

impl Keyboard {
    /// Button rows, or `None` to remove the keyboard
    pub fn rows(&self) -> Option<Vec<Vec<&str>>> {
        let rows = match self {
            Keyboard::Main => vec![
                vec![Command::Weather.label(), Command::Notes.label()],
                vec![Command::Settings.label(), Command::Support.label()],
                vec![Command::Info.label()],
            ],
            Keyboard::Settings => vec![
                vec![Command::Notifications.label(), Command::Profile.label()],
                vec![Command::WeatherNotifications.label(), Command::Back.label()],
            ],
            Keyboard::Profile => vec![
                vec![Command::YourName.label(), Command::YourCity.label()],
                vec![Command::Home.label()],
            ],
            Keyboard::Notes => vec![
                vec![Command::NewNote.label(), Command::MyNotes.label()],
                vec![Command::ManageNotes.label(), Command::ManageCategories.label()],
                vec![Command::Back.label()],
            ],
            Keyboard::NotesView => vec![
                vec![Command::NewNote.label(), Command::MediaNotes.label()],
                vec![Command::ManageNotes.label(), Command::BackToNotes.label()],
            ],
            Keyboard::NotesManagement => vec![
                vec![Command::EditNote.label(), Command::DeleteNote.label()],
                vec![Command::BackToNotes.label()],
            ],
            Keyboard::CategoriesManagement => vec![
                vec![Command::CreateCategory.label(), Command::EditCategories.label()],
                vec![Command::DeleteCategory.label(), Command::BackToNotes.label()],
            ],
            Keyboard::Categories(names) => {
                let mut rows: Vec<Vec<&str>> = names
                    .chunks(2)
                    .map(|pair| pair.iter().map(String::as_str).collect())
                    .collect();
                rows.push(vec![Command::NewCategory.label(), Command::BackToNotes.label()]);
                rows
            }
            Keyboard::NoteActions => vec![
                vec![Command::RemoveNote.label()],
                vec![Command::Back.label()],
            ],
            Keyboard::Back => vec![vec![Command::Back.label()]],
            Keyboard::Confirmation => vec![
                vec![Command::Yes.label(), Command::No.label()],
                vec![Command::Back.label()],
            ],
            Keyboard::Remove => return None,
        };
        Some(rows)
    }
}

/// Every input the bot recognizes as a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    Cancel,

    // Main menu
    Info,
    Support,
    Weather,
    Notes,
    Settings,

    // Settings
    Notifications,
    Profile,
    WeatherNotifications,
    Back,

    // Profile
    YourName,
    YourCity,
    Home,

    // Notes
    NewNote,
    MyNotes,
    MediaNotes,
    ManageNotes,
    ManageCategories,
    BackToNotes,

    // Notes management
    EditNote,
    DeleteNote,
    RemoveNote,

    // Categories management
    CreateCategory,
    NewCategory,
    EditCategories,
    DeleteCategory,

    // Confirmation
    Yes,
    No,
}

const ALL: [Command; 29] = [
    Command::Start,
    Command::Cancel,
    Command::Info,
    Command::Support,
    Command::Weather,
    Command::Notes,
    Command::Settings,
    Command::Notifications,
    Command::Profile,
    Command::WeatherNotifications,
    Command::Back,
    Command::YourName,
    Command::YourCity,
    Command::Home,
    Command::NewNote,
    Command::MyNotes,
    Command::MediaNotes,
    Command::ManageNotes,
    Command::ManageCategories,
    Command::BackToNotes,
    Command::EditNote,
    Command::DeleteNote,
    Command::RemoveNote,
    Command::CreateCategory,
    Command::NewCategory,
    Command::EditCategories,
    Command::DeleteCategory,
    Command::Yes,
    Command::No,
];

impl Command {
    /// Button text, or the slash command
    pub fn label(self) -> &'static str {
        match self {
            Command::Start => "/start",
            Command::Cancel => "/cancel",
            Command::Info => "ℹ️ Info",
            Command::Support => "📞 Support",
            Command::Weather => "🌡️ Weather",
            Command::Notes => "🗒️ Notes",
            Command::Settings => "⚙️ Settings",
            Command::Notifications => "🔔 Notifications",
            Command::Profile => "👤 Profile",
            Command::WeatherNotifications => "🌡️ Weather notifications",
            Command::Back => "⬅️ Back",
            Command::YourName => "✏️ Your name",
            Command::YourCity => "🚩 Your city",
            Command::Home => "🏠 Home",
            Command::NewNote => "📝 New note",
            Command::MyNotes => "📁 My notes",
            Command::MediaNotes => "📸 Media notes",
            Command::ManageNotes => "🛠️ Manage notes",
            Command::ManageCategories => "📂 Manage categories",
            Command::BackToNotes => "⬅️ Back to notes",
            Command::EditNote => "✏️ Edit note",
            Command::DeleteNote => "🗑️ Delete note",
            Command::RemoveNote => "🗑️ Delete",
            Command::CreateCategory => "➕ Create category",
            Command::NewCategory => "➕ New category",
            Command::EditCategories => "✏️ Edit categories",
            Command::DeleteCategory => "🗑️ Delete category",
            Command::Yes => "✅ Yes",
            Command::No => "❌ No",
        }
    }

    /// Match inbound text against the table. Exact labels only.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        ALL.iter().copied().find(|c| c.label() == text)
    }

    /// Answer to a yes/no prompt: the button labels or a bare yes/no in any case
    pub fn parse_confirmation(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "yes" | "y" | "✅ yes" => Some(Command::Yes),
            "no" | "n" | "❌ no" => Some(Command::No),
            _ => None,
        }
    }

    /// Inputs that abandon whatever flow is in progress
    pub fn is_escape(self) -> bool {
        matches!(
            self,
            Command::Cancel | Command::Back | Command::Home | Command::BackToNotes
        )
    }
}

/// Looks like a slash command the bot does not know
pub fn is_unknown_slash_command(text: &str) -> bool {
    let text = text.trim();
    text.starts_with('/') && text.len() > 1 && !text.contains(char::is_whitespace)
}
