//! Database module for Green Assistant
//!
//! Durable storage for user profiles, categories and notes. Conversation
//! state never lands here; see [`crate::session`].

mod schema;

pub use schema::*;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("User not found: {0}")]
    UserNotFound(i64),
    #[error("Category not found: {0}")]
    CategoryNotFound(String),
    #[error("Note not found: {0}")]
    NoteNotFound(i64),
    #[error("Category already exists: {0}")]
    CategoryExists(String),
}

pub type DbResult<T> = Result<T, DbError>;

const NOTE_COLUMNS: &str = "n.id, n.chat_id, n.category_id, c.name, n.kind, n.content, n.file_id, n.created_at, n.updated_at";

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hold the connection lock, as a long-running statement would
    #[cfg(test)]
    pub(crate) fn hold_lock(&self) -> MutexGuard<'_, Connection> {
        self.conn()
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn();
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== User Operations ====================

    /// Register a user on first contact. Returns false if the profile already existed.
    pub fn register_user(&self, user: &NewUser) -> DbResult<bool> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO users (chat_id, username, first_name, last_name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![user.chat_id, user.username, user.first_name, user.last_name, now],
        )?;
        Ok(inserted > 0)
    }

    pub fn get_user(&self, chat_id: i64) -> DbResult<User> {
        let conn = self.conn();
        query_user(&conn, chat_id)
    }

    /// Set the display name, creating the profile if needed
    pub fn set_user_name(&self, chat_id: i64, name: &str) -> DbResult<User> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO users (chat_id, first_name, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(chat_id) DO UPDATE SET first_name = excluded.first_name, updated_at = excluded.updated_at",
            params![chat_id, name, now],
        )?;
        query_user(&conn, chat_id)
    }

    /// Set the home city, creating the profile if needed
    pub fn set_user_city(&self, chat_id: i64, city: &str) -> DbResult<User> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO users (chat_id, city, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(chat_id) DO UPDATE SET city = excluded.city, updated_at = excluded.updated_at",
            params![chat_id, city, now],
        )?;
        query_user(&conn, chat_id)
    }

    /// Flip the daily weather notification preference, returning the new value
    pub fn toggle_weather_notifications(&self, chat_id: i64) -> DbResult<bool> {
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE users SET weather_notifications = NOT weather_notifications, updated_at = ?2
             WHERE chat_id = ?1",
            params![chat_id, Utc::now().to_rfc3339()],
        )?;
        if updated == 0 {
            return Err(DbError::UserNotFound(chat_id));
        }
        Ok(query_user(&conn, chat_id)?.weather_notifications)
    }

    /// Users that should receive the daily forecast
    pub fn users_with_weather_notifications(&self) -> DbResult<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT chat_id, username, first_name, last_name, city, weather_notifications, created_at, updated_at
             FROM users WHERE weather_notifications = 1 AND TRIM(city) != ''
             ORDER BY chat_id",
        )?;
        let users = stmt
            .query_map([], parse_user_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    // ==================== Category Operations ====================

    pub fn create_category(&self, chat_id: i64, name: &str, color: &str) -> DbResult<Category> {
        let conn = self.conn();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO categories (chat_id, name, color, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![chat_id, name, color, now.to_rfc3339()],
        )
        .map_err(|e| map_unique(e, name))?;

        Ok(Category {
            id: conn.last_insert_rowid(),
            chat_id,
            name: name.to_string(),
            color: color.to_string(),
            created_at: now,
        })
    }

    /// All categories of a chat in creation order, with note counts
    pub fn list_categories(&self, chat_id: i64) -> DbResult<Vec<CategorySummary>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.chat_id, c.name, c.color, c.created_at,
                    (SELECT COUNT(*) FROM notes n WHERE n.category_id = c.id) AS note_count
             FROM categories c WHERE c.chat_id = ?1
             ORDER BY c.id ASC",
        )?;
        let categories = stmt
            .query_map(params![chat_id], |row| {
                Ok(CategorySummary {
                    category: parse_category_row(row)?,
                    note_count: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    pub fn find_category_by_name(&self, chat_id: i64, name: &str) -> DbResult<Category> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, chat_id, name, color, created_at FROM categories WHERE chat_id = ?1 AND name = ?2",
            params![chat_id, name],
            parse_category_row,
        )
        .optional()?
        .ok_or_else(|| DbError::CategoryNotFound(name.to_string()))
    }

    pub fn get_category(&self, chat_id: i64, id: i64) -> DbResult<Category> {
        let conn = self.conn();
        query_category(&conn, chat_id, id)
    }

    pub fn rename_category(&self, chat_id: i64, id: i64, new_name: &str) -> DbResult<Category> {
        let conn = self.conn();
        let updated = conn
            .execute(
                "UPDATE categories SET name = ?3 WHERE chat_id = ?1 AND id = ?2",
                params![chat_id, id, new_name],
            )
            .map_err(|e| map_unique(e, new_name))?;
        if updated == 0 {
            return Err(DbError::CategoryNotFound(id.to_string()));
        }
        query_category(&conn, chat_id, id)
    }

    /// Delete a category together with its notes. Returns the number of notes removed.
    pub fn delete_category(&self, chat_id: i64, id: i64) -> DbResult<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let notes = tx.execute(
            "DELETE FROM notes WHERE chat_id = ?1 AND category_id = ?2",
            params![chat_id, id],
        )?;
        let deleted = tx.execute(
            "DELETE FROM categories WHERE chat_id = ?1 AND id = ?2",
            params![chat_id, id],
        )?;
        if deleted == 0 {
            return Err(DbError::CategoryNotFound(id.to_string()));
        }
        tx.commit()?;
        Ok(notes)
    }

    // ==================== Note Operations ====================

    pub fn create_note(&self, chat_id: i64, category_id: i64, note: &NewNote) -> DbResult<Note> {
        let conn = self.conn();
        let category = query_category(&conn, chat_id, category_id)?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO notes (chat_id, category_id, kind, content, file_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                chat_id,
                category_id,
                note.kind.as_str(),
                note.content,
                note.file_id,
                now.to_rfc3339()
            ],
        )?;

        Ok(Note {
            id: conn.last_insert_rowid(),
            chat_id,
            category_id,
            category_name: category.name,
            kind: note.kind,
            content: note.content.clone(),
            file_id: note.file_id.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Notes of a chat, oldest first. `None` lists every category.
    pub fn list_notes(&self, chat_id: i64, category_id: Option<i64>) -> DbResult<Vec<Note>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {NOTE_COLUMNS} FROM notes n JOIN categories c ON c.id = n.category_id
             WHERE n.chat_id = ?1 AND (?2 IS NULL OR n.category_id = ?2)
             ORDER BY n.created_at ASC, n.id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let notes = stmt
            .query_map(params![chat_id, category_id], parse_note_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    /// Photo, video and voice notes across all categories
    pub fn list_media_notes(&self, chat_id: i64) -> DbResult<Vec<Note>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {NOTE_COLUMNS} FROM notes n JOIN categories c ON c.id = n.category_id
             WHERE n.chat_id = ?1 AND n.kind IN ('photo', 'video', 'voice')
             ORDER BY n.created_at ASC, n.id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let notes = stmt
            .query_map(params![chat_id], parse_note_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    pub fn get_note(&self, chat_id: i64, id: i64) -> DbResult<Note> {
        let conn = self.conn();
        query_note(&conn, chat_id, id)
    }

    pub fn update_note_content(&self, chat_id: i64, id: i64, content: &str) -> DbResult<Note> {
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE notes SET content = ?3, updated_at = ?4 WHERE chat_id = ?1 AND id = ?2",
            params![chat_id, id, content, Utc::now().to_rfc3339()],
        )?;
        if updated == 0 {
            return Err(DbError::NoteNotFound(id));
        }
        query_note(&conn, chat_id, id)
    }

    pub fn delete_note(&self, chat_id: i64, id: i64) -> DbResult<()> {
        let conn = self.conn();
        let deleted = conn.execute(
            "DELETE FROM notes WHERE chat_id = ?1 AND id = ?2",
            params![chat_id, id],
        )?;
        if deleted == 0 {
            return Err(DbError::NoteNotFound(id));
        }
        Ok(())
    }
}

fn query_user(conn: &Connection, chat_id: i64) -> DbResult<User> {
    conn.query_row(
        "SELECT chat_id, username, first_name, last_name, city, weather_notifications, created_at, updated_at
         FROM users WHERE chat_id = ?1",
        params![chat_id],
        parse_user_row,
    )
    .optional()?
    .ok_or(DbError::UserNotFound(chat_id))
}

fn query_category(conn: &Connection, chat_id: i64, id: i64) -> DbResult<Category> {
    conn.query_row(
        "SELECT id, chat_id, name, color, created_at FROM categories WHERE chat_id = ?1 AND id = ?2",
        params![chat_id, id],
        parse_category_row,
    )
    .optional()?
    .ok_or_else(|| DbError::CategoryNotFound(id.to_string()))
}

fn query_note(conn: &Connection, chat_id: i64, id: i64) -> DbResult<Note> {
    let sql = format!(
        "SELECT {NOTE_COLUMNS} FROM notes n JOIN categories c ON c.id = n.category_id
         WHERE n.chat_id = ?1 AND n.id = ?2"
    );
    conn.query_row(&sql, params![chat_id, id], parse_note_row)
        .optional()?
        .ok_or(DbError::NoteNotFound(id))
}

fn parse_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        chat_id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        city: row.get(4)?,
        weather_notifications: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn parse_category_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        name: row.get(2)?,
        color: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn parse_note_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        category_id: row.get(2)?,
        category_name: row.get(3)?,
        kind: NoteKind::parse(&row.get::<_, String>(4)?),
        content: row.get(5)?,
        file_id: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?),
        updated_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

fn map_unique(e: rusqlite::Error, name: &str) -> DbError {
    match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DbError::CategoryExists(name.to_string())
        }
        other => DbError::Sqlite(other),
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
