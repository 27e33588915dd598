//! Demo data for a fresh database.

use crate::auth::hash_password;
use crate::db::{BookStore, Database, GenreStore, NewBook, NewUser, ReadingStatus, UserStore};
use crate::error::{AuthError, StoreError};
use thiserror::Error;

const COVER_BASE: &str =
    "https://sfnpgydezdiiexmftraz.supabase.co/storage/v1/object/public/bookverse/";

/// Demo accounts and their password.
const USERS: &[&str] = &["user1", "user2"];
const DEMO_PASSWORD: &str = "123456";

const GENRES: &[&str] = &[
    "Fiction",
    "Non-Fiction",
    "Science Fiction",
    "Fantasy",
    "Mystery",
    "Biography",
    "Self-Help",
    "Romance",
    "Thriller",
    "Historical Fiction",
    "Horror",
    "Poetry",
    "Graphic Novel",
    "Children's",
];

struct SeedBook {
    title: &'static str,
    author: &'static str,
    genre: &'static str,
    owner: &'static str,
    status: ReadingStatus,
    cover: Option<&'static str>,
}

const BOOKS: &[SeedBook] = &[
    SeedBook {
        title: "1984",
        author: "George Orwell",
        genre: "Fiction",
        owner: "user1",
        status: ReadingStatus::Read,
        cover: Some("/1984.jpg"),
    },
    SeedBook {
        title: "Sapiens",
        author: "Yuval Noah Harari",
        genre: "Non-Fiction",
        owner: "user1",
        status: ReadingStatus::ToRead,
        cover: Some("/sapiens.png"),
    },
    SeedBook {
        title: "Dune",
        author: "Frank Herbert",
        genre: "Science Fiction",
        owner: "user2",
        status: ReadingStatus::InProgress,
        cover: None,
    },
    SeedBook {
        title: "The Hobbit",
        author: "J.R.R. Tolkien",
        genre: "Fantasy",
        owner: "user2",
        status: ReadingStatus::Read,
        cover: Some("/The-Hobbit-.png"),
    },
    SeedBook {
        title: "The Da Vinci Code",
        author: "Dan Brown",
        genre: "Mystery",
        owner: "user1",
        status: ReadingStatus::ToRead,
        cover: None,
    },
    SeedBook {
        title: "Becoming",
        author: "Michelle Obama",
        genre: "Biography",
        owner: "user2",
        status: ReadingStatus::Read,
        cover: Some("/becoming.webp"),
    },
    SeedBook {
        title: "The Power of Habit",
        author: "Charles Duhigg",
        genre: "Self-Help",
        owner: "user1",
        status: ReadingStatus::InProgress,
        cover: Some("/the%20power.jpeg"),
    },
    SeedBook {
        title: "Pride and Prejudice",
        author: "Jane Austen",
        genre: "Romance",
        owner: "user2",
        status: ReadingStatus::ToRead,
        cover: Some("/pride.png"),
    },
];

/// Error raised while seeding.
#[derive(Error, Debug)]
pub enum SeedError {
    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Password hashing failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A demo book refers to a genre or user that is not in the database.
    #[error("Seed reference not found: {0}")]
    MissingReference(String),
}

/// Rows inserted by [`seed`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Users inserted.
    pub users: usize,
    /// Genres inserted.
    pub genres: usize,
    /// Books inserted.
    pub books: usize,
}

/// Insert demo users, genres and books.
///
/// Users and genres that already exist are left alone. Books are only added
/// to an empty books table, so running this twice does not duplicate them.
pub fn seed(db: &Database) -> Result<SeedReport, SeedError> {
    let mut report = SeedReport::default();

    for &username in USERS {
        if db.get_user_by_username(username)?.is_some() {
            continue;
        }
        db.create_user(&NewUser {
            username: username.to_string(),
            password_hash: hash_password(DEMO_PASSWORD)?,
        })?;
        report.users += 1;
    }

    let existing = db.list_genres()?;
    for &name in GENRES {
        if existing.iter().any(|g| g.name == name) {
            continue;
        }
        db.create_genre(name)?;
        report.genres += 1;
    }

    if db.count_rows("books")? > 0 {
        tracing::info!("Books already present, skipping demo books");
        return Ok(report);
    }

    let genres = db.list_genres()?;
    for book in BOOKS {
        let genre_id = genres
            .iter()
            .find(|g| g.name == book.genre)
            .map(|g| g.id)
            .ok_or_else(|| SeedError::MissingReference(format!("genre {}", book.genre)))?;
        let user_id = db
            .get_user_by_username(book.owner)?
            .map(|u| u.id)
            .ok_or_else(|| SeedError::MissingReference(format!("user {}", book.owner)))?;

        db.create_book(&NewBook {
            title: book.title.to_string(),
            author: book.author.to_string(),
            genre_id,
            user_id,
            status: book.status,
            cover_image: book.cover.map(|path| format!("{COVER_BASE}{path}")),
        })?;
        report.books += 1;
    }

    tracing::info!(
        users = report.users,
        genres = report.genres,
        books = report.books,
        "Seeded database"
    );
    Ok(report)
}
