//! Application state shared across handlers.

use crate::auth::AuthService;
use crate::config::Config;
use crate::db::{BookStore, Database, GenreStore, UserStore};
use std::sync::Arc;

/// Shared application state.
///
/// Stores are held as trait objects, built once at startup; tests swap in
/// other implementations through [`AppState::with_stores`].
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Book persistence.
    pub books: Arc<dyn BookStore>,
    /// Genre persistence.
    pub genres: Arc<dyn GenreStore>,
    /// User persistence.
    pub users: Arc<dyn UserStore>,
    /// Credentials and tokens.
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Create new application state backed by one database.
    pub fn new_with_db(config: Config, db: Database, auth: AuthService) -> Self {
        let db = Arc::new(db);
        Self::with_stores(config, db.clone(), db.clone(), db, auth)
    }

    /// Create application state from individual stores.
    pub fn with_stores(
        config: Config,
        books: Arc<dyn BookStore>,
        genres: Arc<dyn GenreStore>,
        users: Arc<dyn UserStore>,
        auth: AuthService,
    ) -> Self {
        Self {
            config: Arc::new(config),
            books,
            genres,
            users,
            auth: Arc::new(auth),
        }
    }
}
