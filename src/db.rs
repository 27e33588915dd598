mod schema;
pub mod seed;

pub use schema::Database;

use crate::error::StoreResult;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Reading status of a book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingStatus {
    /// Not started.
    #[default]
    ToRead,
    /// Currently reading.
    InProgress,
    /// Finished.
    Read,
}

impl ReadingStatus {
    /// Accepted wire values, in declaration order.
    pub const VALUES: [&'static str; 3] = ["to_read", "in_progress", "read"];

    /// Wire and column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingStatus::ToRead => "to_read",
            ReadingStatus::InProgress => "in_progress",
            ReadingStatus::Read => "read",
        }
    }

    /// Parse a wire value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "to_read" => Some(ReadingStatus::ToRead),
            "in_progress" => Some(ReadingStatus::InProgress),
            "read" => Some(ReadingStatus::Read),
            _ => None,
        }
    }
}

impl ToSql for ReadingStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ReadingStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        ReadingStatus::parse(raw)
            .ok_or_else(|| FromSqlError::Other(format!("unknown reading status: {raw}").into()))
    }
}

/// User account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Store-assigned ID.
    pub id: i64,
    /// Unique login name.
    pub username: String,
    /// Argon2 password hash.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
}

/// Public view of a user, as listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    /// User ID.
    pub id: i64,
    /// Username.
    pub username: String,
}

/// Data for a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Username, already trimmed.
    pub username: String,
    /// Argon2 password hash.
    pub password_hash: String,
}

/// Partial user update.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    /// New username.
    pub username: Option<String>,
    /// New password hash.
    pub password_hash: Option<String>,
}

/// Book genre.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    /// Genre ID.
    pub id: i64,
    /// Unique name.
    pub name: String,
}

/// Tracked book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Book ID.
    pub id: i64,
    /// Title.
    pub title: String,
    /// Author.
    pub author: String,
    /// Genre ID.
    pub genre_id: i64,
    /// Owning user ID.
    pub user_id: i64,
    /// Reading status.
    pub status: ReadingStatus,
    /// Cover image URL.
    pub cover_image: Option<String>,
    /// Creation timestamp, as stored by SQLite.
    pub created_at: String,
}

/// Book joined with its genre name and owner username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookWithRelations {
    /// The book row.
    #[serde(flatten)]
    pub book: Book,
    /// Name of the genre, if it still exists.
    pub genre_name: Option<String>,
    /// Username of the owner, if it still exists.
    pub username: Option<String>,
}

/// Book list filters. Absent filters match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    /// Substring of the title.
    pub title: Option<String>,
    /// Exact genre.
    pub genre_id: Option<i64>,
    /// Exact owner.
    pub user_id: Option<i64>,
}

/// Data for a new book.
#[derive(Debug, Clone)]
pub struct NewBook {
    /// Title, trimmed and escaped.
    pub title: String,
    /// Author, trimmed and escaped.
    pub author: String,
    /// Genre ID.
    pub genre_id: i64,
    /// Owner, taken from the authenticated caller.
    pub user_id: i64,
    /// Initial status.
    pub status: ReadingStatus,
    /// Cover image URL.
    pub cover_image: Option<String>,
}

/// Partial book update. Ownership is not updatable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookPatch {
    /// New title.
    pub title: Option<String>,
    /// New author.
    pub author: Option<String>,
    /// New genre.
    pub genre_id: Option<i64>,
    /// New status.
    pub status: Option<ReadingStatus>,
    /// New cover image.
    pub cover_image: Option<String>,
}

impl BookPatch {
    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.genre_id.is_none()
            && self.status.is_none()
            && self.cover_image.is_none()
    }
}

/// Result of an insert, update or delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteSummary {
    /// Rows affected.
    pub changes: usize,
    /// Connection's last inserted rowid.
    pub last_insert_rowid: i64,
}

/// Book persistence.
pub trait BookStore: Send + Sync {
    /// List books with genre name and owner, filtered.
    fn list_books(&self, filter: &BookFilter) -> StoreResult<Vec<BookWithRelations>>;
    /// Get a book by ID.
    fn get_book(&self, id: i64) -> StoreResult<Option<Book>>;
    /// Insert a book.
    fn create_book(&self, book: &NewBook) -> StoreResult<WriteSummary>;
    /// Apply a partial update.
    fn update_book(&self, id: i64, patch: &BookPatch) -> StoreResult<WriteSummary>;
    /// Delete a book.
    fn delete_book(&self, id: i64) -> StoreResult<WriteSummary>;
}

/// Genre persistence.
pub trait GenreStore: Send + Sync {
    /// List all genres.
    fn list_genres(&self) -> StoreResult<Vec<Genre>>;
    /// Insert a genre.
    fn create_genre(&self, name: &str) -> StoreResult<WriteSummary>;
    /// Rename a genre.
    fn update_genre(&self, id: i64, name: &str) -> StoreResult<WriteSummary>;
    /// Delete a genre.
    fn delete_genre(&self, id: i64) -> StoreResult<WriteSummary>;
}

/// User persistence.
pub trait UserStore: Send + Sync {
    /// List users without password hashes.
    fn list_users(&self) -> StoreResult<Vec<UserSummary>>;
    /// Get a user by ID.
    fn get_user_by_id(&self, id: i64) -> StoreResult<Option<User>>;
    /// Get a user by username.
    fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    /// Insert a user.
    fn create_user(&self, user: &NewUser) -> StoreResult<WriteSummary>;
    /// Apply a partial update.
    fn update_user(&self, id: i64, patch: &UserPatch) -> StoreResult<WriteSummary>;
    /// Delete a user.
    fn delete_user(&self, id: i64) -> StoreResult<WriteSummary>;
}
