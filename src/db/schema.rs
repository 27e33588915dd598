use crate::db::*;
use crate::error::StoreResult;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, ToSql, params};
use std::path::Path;
use std::sync::Arc;

const BOOK_COLUMNS: &str =
    "b.id, b.title, b.author, b.genre_id, b.user_id, b.status, b.cover_image, b.created_at";

/// Database wrapper for thread-safe access.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Create tables if they do not exist yet.
    fn initialize_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS genres (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS books (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                genre_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'to_read'
                    CHECK (status IN ('to_read', 'in_progress', 'read')),
                cover_image TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (genre_id) REFERENCES genres(id),
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE INDEX IF NOT EXISTS idx_books_genre ON books(genre_id);
            CREATE INDEX IF NOT EXISTS idx_books_user ON books(user_id);
            "#,
        )?;

        Ok(())
    }

    /// Run a write statement and report its summary.
    fn write(&self, sql: &str, params: &[&dyn ToSql]) -> StoreResult<WriteSummary> {
        let conn = self.conn.lock();
        let changes = conn.execute(sql, params)?;
        Ok(WriteSummary {
            changes,
            last_insert_rowid: conn.last_insert_rowid(),
        })
    }

    /// Number of rows in a table. Only used with fixed table names.
    pub(crate) fn count_rows(&self, table: &str) -> StoreResult<i64> {
        let conn = self.conn.lock();
        let count = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })?;
        Ok(count)
    }

    /// Helper to convert a row to Book.
    fn row_to_book(row: &rusqlite::Row<'_>) -> rusqlite::Result<Book> {
        Ok(Book {
            id: row.get(0)?,
            title: row.get(1)?,
            author: row.get(2)?,
            genre_id: row.get(3)?,
            user_id: row.get(4)?,
            status: row.get(5)?,
            cover_image: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn row_to_book_with_relations(row: &rusqlite::Row<'_>) -> rusqlite::Result<BookWithRelations> {
        Ok(BookWithRelations {
            book: Self::row_to_book(row)?,
            genre_name: row.get(8)?,
            username: row.get(9)?,
        })
    }

    fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            password_hash: row.get(2)?,
        })
    }
}

impl BookStore for Database {
    fn list_books(&self, filter: &BookFilter) -> StoreResult<Vec<BookWithRelations>> {
        let mut sql = format!(
            "SELECT {BOOK_COLUMNS}, g.name, u.username
             FROM books b
             LEFT JOIN genres g ON g.id = b.genre_id
             LEFT JOIN users u ON u.id = b.user_id"
        );

        let mut conditions: Vec<&str> = Vec::new();
        let mut params: Vec<&dyn ToSql> = Vec::new();

        if let Some(title) = &filter.title {
            conditions.push("b.title LIKE '%' || ? || '%'");
            params.push(title);
        }
        if let Some(genre_id) = &filter.genre_id {
            conditions.push("b.genre_id = ?");
            params.push(genre_id);
        }
        if let Some(user_id) = &filter.user_id {
            conditions.push("b.user_id = ?");
            params.push(user_id);
        }

        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY b.id");

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let books = stmt
            .query_map(rusqlite::params_from_iter(params), Self::row_to_book_with_relations)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(books)
    }

    fn get_book(&self, id: i64) -> StoreResult<Option<Book>> {
        let conn = self.conn.lock();
        let book = conn
            .query_row(
                &format!("SELECT {BOOK_COLUMNS} FROM books b WHERE b.id = ?1"),
                params![id],
                Self::row_to_book,
            )
            .optional()?;
        Ok(book)
    }

    fn create_book(&self, book: &NewBook) -> StoreResult<WriteSummary> {
        self.write(
            "INSERT INTO books (title, author, genre_id, user_id, status, cover_image)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                book.title,
                book.author,
                book.genre_id,
                book.user_id,
                book.status,
                book.cover_image,
            ],
        )
    }

    fn update_book(&self, id: i64, patch: &BookPatch) -> StoreResult<WriteSummary> {
        let mut assignments: Vec<&str> = Vec::new();
        let mut params: Vec<&dyn ToSql> = Vec::new();

        if let Some(title) = &patch.title {
            assignments.push("title = ?");
            params.push(title);
        }
        if let Some(author) = &patch.author {
            assignments.push("author = ?");
            params.push(author);
        }
        if let Some(genre_id) = &patch.genre_id {
            assignments.push("genre_id = ?");
            params.push(genre_id);
        }
        if let Some(status) = &patch.status {
            assignments.push("status = ?");
            params.push(status);
        }
        if let Some(cover_image) = &patch.cover_image {
            assignments.push("cover_image = ?");
            params.push(cover_image);
        }

        if assignments.is_empty() {
            let conn = self.conn.lock();
            return Ok(WriteSummary {
                changes: 0,
                last_insert_rowid: conn.last_insert_rowid(),
            });
        }

        params.push(&id);
        let sql = format!("UPDATE books SET {} WHERE id = ?", assignments.join(", "));
        self.write(&sql, &params)
    }

    fn delete_book(&self, id: i64) -> StoreResult<WriteSummary> {
        self.write("DELETE FROM books WHERE id = ?1", params![id])
    }
}

impl GenreStore for Database {
    fn list_genres(&self) -> StoreResult<Vec<Genre>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, name FROM genres ORDER BY id")?;
        let genres = stmt
            .query_map([], |row| {
                Ok(Genre {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(genres)
    }

    fn create_genre(&self, name: &str) -> StoreResult<WriteSummary> {
        self.write("INSERT INTO genres (name) VALUES (?1)", params![name])
    }

    fn update_genre(&self, id: i64, name: &str) -> StoreResult<WriteSummary> {
        self.write(
            "UPDATE genres SET name = ?1 WHERE id = ?2",
            params![name, id],
        )
    }

    fn delete_genre(&self, id: i64) -> StoreResult<WriteSummary> {
        self.write("DELETE FROM genres WHERE id = ?1", params![id])
    }
}

impl UserStore for Database {
    fn list_users(&self) -> StoreResult<Vec<UserSummary>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, username FROM users ORDER BY id")?;
        let users = stmt
            .query_map([], |row| {
                Ok(UserSummary {
                    id: row.get(0)?,
                    username: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(users)
    }

    fn get_user_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                "SELECT id, username, password FROM users WHERE id = ?1",
                params![id],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                "SELECT id, username, password FROM users WHERE username = ?1",
                params![username],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    fn create_user(&self, user: &NewUser) -> StoreResult<WriteSummary> {
        self.write(
            "INSERT INTO users (username, password) VALUES (?1, ?2)",
            params![user.username, user.password_hash],
        )
    }

    fn update_user(&self, id: i64, patch: &UserPatch) -> StoreResult<WriteSummary> {
        self.write(
            "UPDATE users SET
                username = COALESCE(?1, username),
                password = COALESCE(?2, password)
             WHERE id = ?3",
            params![patch.username, patch.password_hash, id],
        )
    }

    fn delete_user(&self, id: i64) -> StoreResult<WriteSummary> {
        self.write("DELETE FROM users WHERE id = ?1", params![id])
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}
