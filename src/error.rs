use axum::Json;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};
use thiserror::Error;

/// Client-facing error messages.
pub mod messages {
    #![allow(missing_docs)]

    pub const BOOK_NOT_FOUND: &str = "Book not found";
    pub const FAILED_FETCH_BOOKS: &str = "Failed to fetch books";
    pub const FAILED_CREATE_BOOK: &str = "Failed to create book";
    pub const FAILED_UPDATE_BOOK: &str = "Failed to update book";
    pub const FAILED_DELETE_BOOK: &str = "Failed to delete book";

    pub const GENRE_NOT_FOUND: &str = "Genre not found";
    pub const FAILED_FETCH_GENRES: &str = "Failed to fetch genres";
    pub const FAILED_CREATE_GENRE: &str = "Failed to create genre";
    pub const FAILED_UPDATE_GENRE: &str = "Failed to update genre";
    pub const FAILED_DELETE_GENRE: &str = "Failed to delete genre";

    pub const FAILED_FETCH_USERS: &str = "Failed to fetch users";
    pub const FAILED_FETCH_USER: &str = "Failed to fetch user";
    pub const USER_NOT_FOUND: &str = "User not found";
    pub const FAILED_REGISTER_USER: &str = "Failed to register user";
    pub const FAILED_LOGIN_USER: &str = "Failed to login user";
    pub const INVALID_CREDENTIALS: &str = "Invalid credentials";

    pub const ROUTE_NOT_FOUND: &str = "Route not found";
    pub const INVALID_INPUT: &str = "Invalid input data";
    pub const UNAUTHORIZED: &str = "Unauthorized access";

    pub const NO_TOKEN: &str = "No token provided";
    pub const INVALID_TOKEN: &str = "Invalid token";
    pub const NO_PERMISSION: &str = "You do not have permission to perform this action";
    pub const FAILED_LOGOUT_USER: &str = "Failed to logout user";
}

/// Error returned by the data access layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A UNIQUE constraint rejected the write.
    #[error("Unique constraint failed on column: {0}")]
    UniqueViolation(String),

    /// Any other SQLite failure.
    #[error("Database error: {0}")]
    Sqlite(#[source] rusqlite::Error),

    /// I/O error while preparing the database file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, Some(msg)) = &err
            && code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        {
            // "UNIQUE constraint failed: users.username"
            let column = msg.rsplit('.').next().unwrap_or_default().to_string();
            return StoreError::UniqueViolation(column);
        }
        StoreError::Sqlite(err)
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error raised by password hashing and token handling.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Neither a bearer header nor a token cookie was sent.
    #[error("No token provided")]
    NoToken,

    /// Token signature or expiry check failed.
    #[error("Invalid token: {0}")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    /// Unknown user or wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Password hashing failed.
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    /// Token signing failed.
    #[error("Token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Error raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    /// Config file is not valid TOML.
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// No token signing secret in the file or the environment.
    #[error("No JWT secret configured; set [auth] jwt_secret or BOOKVERSE_JWT_SECRET")]
    MissingSecret,
}

/// Error carried through the request pipeline and rendered as
/// `{message, url?, method?}`.
///
/// `message` may hold a serialized JSON payload (validation failures); it is
/// emitted as JSON when it parses and as a plain string otherwise.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{status}: {message}")]
pub struct ApiError {
    /// Message or serialized payload.
    pub message: String,
    /// Response status.
    pub status: StatusCode,
    /// Original request path.
    pub url: Option<String>,
    /// Original request method.
    pub method: Option<String>,
}

impl ApiError {
    /// Create an error without request context.
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            message: message.into(),
            status,
            url: None,
            method: None,
        }
    }

    /// 400 with a JSON-serialized payload as the message.
    pub fn bad_request<T: serde::Serialize>(payload: &T) -> Self {
        let message = serde_json::to_string(payload)
            .unwrap_or_else(|_| messages::INVALID_INPUT.to_string());
        Self::new(message, StatusCode::BAD_REQUEST)
    }

    /// 401.
    pub fn unauthorized(message: &str) -> Self {
        Self::new(message, StatusCode::UNAUTHORIZED)
    }

    /// 403.
    pub fn forbidden(message: &str) -> Self {
        Self::new(message, StatusCode::FORBIDDEN)
    }

    /// 404.
    pub fn not_found(message: &str) -> Self {
        Self::new(message, StatusCode::NOT_FOUND)
    }

    /// 500.
    pub fn internal(message: &str) -> Self {
        Self::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Attach the request path.
    pub fn with_url(mut self, uri: &Uri) -> Self {
        self.url = Some(
            uri.path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| uri.path().to_string()),
        );
        self
    }

    /// Attach the request path and method.
    pub fn at(self, uri: &Uri, method: &Method) -> Self {
        let mut err = self.with_url(uri);
        err.method = Some(method.to_string());
        err
    }

    /// Body emitted for this error.
    pub fn body(&self) -> Value {
        let message = if self.message.is_empty() {
            Value::String("Internal Server Error".to_string())
        } else {
            serde_json::from_str(&self.message)
                .unwrap_or_else(|_| Value::String(self.message.clone()))
        };

        let mut body = Map::new();
        body.insert("message".to_string(), message);
        if let Some(url) = &self.url {
            body.insert("url".to_string(), Value::String(url.clone()));
        }
        if let Some(method) = &self.method {
            body.insert("method".to_string(), Value::String(method.clone()));
        }
        Value::Object(body)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NoToken => ApiError::unauthorized(messages::NO_TOKEN),
            AuthError::InvalidToken(_) => ApiError::unauthorized(messages::INVALID_TOKEN),
            AuthError::InvalidCredentials => ApiError::unauthorized(messages::INVALID_CREDENTIALS),
            AuthError::Hashing(_) | AuthError::Signing(_) => {
                tracing::error!(error = %err, "Credential processing failed");
                ApiError::internal(messages::FAILED_LOGIN_USER)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = %self.status,
                url = self.url.as_deref().unwrap_or("-"),
                method = self.method.as_deref().unwrap_or("-"),
                message = %self.message,
                "Request failed"
            );
        } else {
            tracing::debug!(
                status = %self.status,
                url = self.url.as_deref().unwrap_or("-"),
                message = %self.message,
                "Request rejected"
            );
        }

        (self.status, Json(self.body())).into_response()
    }
}

/// Result type alias for request handling.
pub type Result<T> = std::result::Result<T, ApiError>;
