//! Database schema and types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS users (
    chat_id INTEGER PRIMARY KEY,
    username TEXT NOT NULL DEFAULT '',
    first_name TEXT NOT NULL DEFAULT '',
    last_name TEXT NOT NULL DEFAULT '',
    city TEXT NOT NULL DEFAULT '',
    weather_notifications BOOLEAN NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    color TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,

    UNIQUE (chat_id, name)
);

CREATE INDEX IF NOT EXISTS idx_categories_chat ON categories(chat_id);

CREATE TABLE IF NOT EXISTS notes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id INTEGER NOT NULL,
    category_id INTEGER NOT NULL,
    kind TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    file_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_notes_chat ON notes(chat_id, created_at);
CREATE INDEX IF NOT EXISTS idx_notes_category ON notes(category_id);
";

/// User profile, one per chat
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub chat_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub city: String,
    pub weather_notifications: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_city(&self) -> bool {
        !self.city.trim().is_empty()
    }
}

/// Identity fields captured from the transport on first contact
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub chat_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

/// Category record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: i64,
    pub chat_id: i64,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

/// Category with the number of notes filed under it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategorySummary {
    pub category: Category,
    pub note_count: i64,
}

/// Kind of content a note holds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    Text,
    Photo,
    Video,
    Voice,
    File,
    Link,
}

impl NoteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NoteKind::Text => "text",
            NoteKind::Photo => "photo",
            NoteKind::Video => "video",
            NoteKind::Voice => "voice",
            NoteKind::File => "file",
            NoteKind::Link => "link",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "photo" => NoteKind::Photo,
            "video" => NoteKind::Video,
            "voice" => NoteKind::Voice,
            "file" => NoteKind::File,
            "link" => NoteKind::Link,
            _ => NoteKind::Text,
        }
    }

    /// Photo, video and voice notes are listed together as media
    pub fn is_media(self) -> bool {
        matches!(self, NoteKind::Photo | NoteKind::Video | NoteKind::Voice)
    }

    pub fn emoji(self) -> &'static str {
        match self {
            NoteKind::Text => "📝",
            NoteKind::Photo => "🖼️",
            NoteKind::Video => "🎥",
            NoteKind::Voice => "🎤",
            NoteKind::File => "📎",
            NoteKind::Link => "🔗",
        }
    }
}

impl fmt::Display for NoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Note record, joined with its category name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub id: i64,
    pub chat_id: i64,
    pub category_id: i64,
    pub category_name: String,
    pub kind: NoteKind,
    pub content: String,
    pub file_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to file a new note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNote {
    pub kind: NoteKind,
    pub content: String,
    pub file_id: Option<String>,
}

impl NewNote {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: NoteKind::Text,
            content: content.into(),
            file_id: None,
        }
    }
}
