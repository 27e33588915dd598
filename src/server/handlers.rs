//! HTTP request handlers.

use crate::db::{
    Book, BookFilter, BookPatch, BookWithRelations, Genre, NewBook, NewUser, UserSummary,
    WriteSummary,
};
use crate::error::{ApiError, Result, StoreError, messages};
use crate::server::AppState;
use crate::server::extract::{
    AuthUser, JsonBody, OwnedBook, RequestContext, clear_session_cookie, session_cookie,
};
use crate::validate::{self, FieldError, FieldRules, Location, Rejection, Validated};
use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::{AppendHeaders, IntoResponse},
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Health check body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

/// Logout body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    message: &'static str,
}

/// Run validation rules, translating failures into 400 or `failure` (500).
fn validated(
    state: &AppState,
    ctx: &RequestContext,
    rules: &[FieldRules],
    location: Location,
    input: &Map<String, Value>,
    failure: &str,
) -> Result<Validated> {
    validate::validate(rules, location, input, state.users.as_ref()).map_err(|rejection| {
        match rejection {
            Rejection::Invalid(errors) => ctx.error(ApiError::bad_request(&errors)),
            Rejection::Store(err) => store_failure(ctx, failure, err),
        }
    })
}

/// Log a store failure and replace it with a generic 500.
fn store_failure(ctx: &RequestContext, message: &str, err: StoreError) -> ApiError {
    tracing::error!(
        error = %err,
        url = %ctx.uri,
        method = %ctx.method,
        "Store operation failed"
    );
    ctx.error(ApiError::internal(message))
}

/// Genre ids start at 1; an unparseable id targets no row.
fn genre_id(raw: &str) -> i64 {
    raw.parse().unwrap_or(0)
}

// ============================================================================
// HEALTH / FALLBACK
// ============================================================================

/// Liveness check.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        message: "Server is running",
    })
}

/// Requests matching no route.
pub async fn route_not_found(ctx: RequestContext) -> ApiError {
    ApiError::not_found(messages::ROUTE_NOT_FOUND).with_url(&ctx.uri)
}

// ============================================================================
// BOOKS
// ============================================================================

/// List books, optionally filtered by title substring, genre and owner.
pub async fn list_books(
    State(state): State<AppState>,
    ctx: RequestContext,
    query: std::result::Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Json<Vec<BookWithRelations>>> {
    let Query(params) = query.map_err(|e| {
        tracing::debug!(error = %e, "Unparseable query string");
        ctx.error(ApiError::new(messages::INVALID_INPUT, StatusCode::BAD_REQUEST))
    })?;

    let input: Map<String, Value> = params
        .into_iter()
        .filter(|(key, value)| !(key == "title" && value.is_empty()))
        .map(|(key, value)| (key, Value::String(value)))
        .collect();

    let values = validated(
        &state,
        &ctx,
        validate::BOOK_QUERY,
        Location::Query,
        &input,
        messages::FAILED_FETCH_BOOKS,
    )?;

    let filter = BookFilter {
        title: values.string("title").filter(|t| !t.is_empty()),
        genre_id: values.int("genreId"),
        user_id: values.int("userId"),
    };

    let books = state
        .books
        .list_books(&filter)
        .map_err(|e| store_failure(&ctx, messages::FAILED_FETCH_BOOKS, e))?;

    Ok(Json(books))
}

/// Get a single book.
pub async fn get_book(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<Book>> {
    let not_found = || ctx.error(ApiError::not_found(messages::BOOK_NOT_FOUND));
    let id: i64 = id.parse().map_err(|_| not_found())?;

    state
        .books
        .get_book(id)
        .map_err(|e| store_failure(&ctx, messages::FAILED_FETCH_BOOKS, e))?
        .map(Json)
        .ok_or_else(not_found)
}

/// Create a book owned by the caller.
///
/// The body is validated before the caller's token is looked at.
pub async fn create_book(
    State(state): State<AppState>,
    ctx: RequestContext,
    auth: std::result::Result<AuthUser, ApiError>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<WriteSummary>)> {
    let values = validated(
        &state,
        &ctx,
        validate::BOOK_CREATE,
        Location::Body,
        &body,
        messages::FAILED_CREATE_BOOK,
    )?;
    let AuthUser(user_id) = auth?;

    let (Some(title), Some(author), Some(genre_id)) = (
        values.string("title"),
        values.string("author"),
        values.int("genreId"),
    ) else {
        return Err(ctx.error(ApiError::new(messages::INVALID_INPUT, StatusCode::BAD_REQUEST)));
    };

    let book = NewBook {
        title,
        author,
        genre_id,
        user_id,
        status: values.status("status").unwrap_or_default(),
        cover_image: values.string("coverImage"),
    };

    let summary = state
        .books
        .create_book(&book)
        .map_err(|e| store_failure(&ctx, messages::FAILED_CREATE_BOOK, e))?;

    tracing::info!(book_id = summary.last_insert_rowid, user_id, "Book created");
    Ok((StatusCode::CREATED, Json(summary)))
}

/// Apply a partial update to a book the caller owns.
pub async fn update_book(
    State(state): State<AppState>,
    ctx: RequestContext,
    OwnedBook { book, .. }: OwnedBook,
    JsonBody(body): JsonBody,
) -> Result<Json<WriteSummary>> {
    let values = validated(
        &state,
        &ctx,
        validate::BOOK_UPDATE,
        Location::Body,
        &body,
        messages::FAILED_UPDATE_BOOK,
    )?;

    let patch = BookPatch {
        title: values.string("title"),
        author: values.string("author"),
        genre_id: values.int("genreId"),
        status: values.status("status"),
        cover_image: values.string("coverImage"),
    };

    if patch.is_empty() {
        return Err(ctx.error(ApiError::new(messages::INVALID_INPUT, StatusCode::BAD_REQUEST)));
    }

    let summary = state
        .books
        .update_book(book.id, &patch)
        .map_err(|e| store_failure(&ctx, messages::FAILED_UPDATE_BOOK, e))?;

    Ok(Json(summary))
}

/// Delete a book the caller owns.
///
/// Deleting the same book again answers 404 BOOK_NOT_FOUND from the
/// ownership check rather than a zero-change summary. That is intended:
/// a missing book has no owner to check against.
pub async fn delete_book(
    State(state): State<AppState>,
    ctx: RequestContext,
    OwnedBook { book, .. }: OwnedBook,
) -> Result<Json<WriteSummary>> {
    let summary = state
        .books
        .delete_book(book.id)
        .map_err(|e| store_failure(&ctx, messages::FAILED_DELETE_BOOK, e))?;

    tracing::info!(book_id = book.id, "Book deleted");
    Ok(Json(summary))
}

// ============================================================================
// GENRES
// ============================================================================

/// List all genres.
pub async fn list_genres(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<Vec<Genre>>> {
    state
        .genres
        .list_genres()
        .map(Json)
        .map_err(|e| store_failure(&ctx, messages::FAILED_FETCH_GENRES, e))
}

/// Create a genre.
pub async fn create_genre(
    State(state): State<AppState>,
    ctx: RequestContext,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<WriteSummary>)> {
    let values = validated(
        &state,
        &ctx,
        validate::GENRE,
        Location::Body,
        &body,
        messages::FAILED_CREATE_GENRE,
    )?;
    let name = values.string("name").unwrap_or_default();

    let summary = state
        .genres
        .create_genre(&name)
        .map_err(|e| store_failure(&ctx, messages::FAILED_CREATE_GENRE, e))?;

    Ok((StatusCode::CREATED, Json(summary)))
}

/// Rename a genre.
pub async fn update_genre(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> Result<Json<WriteSummary>> {
    let values = validated(
        &state,
        &ctx,
        validate::GENRE,
        Location::Body,
        &body,
        messages::FAILED_UPDATE_GENRE,
    )?;
    let name = values.string("name").unwrap_or_default();

    state
        .genres
        .update_genre(genre_id(&id), &name)
        .map(Json)
        .map_err(|e| store_failure(&ctx, messages::FAILED_UPDATE_GENRE, e))
}

/// Delete a genre.
pub async fn delete_genre(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<WriteSummary>> {
    state
        .genres
        .delete_genre(genre_id(&id))
        .map(Json)
        .map_err(|e| store_failure(&ctx, messages::FAILED_DELETE_GENRE, e))
}

// ============================================================================
// USERS / AUTH
// ============================================================================

/// List all users without password hashes.
pub async fn list_users(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<Vec<UserSummary>>> {
    state
        .users
        .list_users()
        .map(Json)
        .map_err(|e| store_failure(&ctx, messages::FAILED_FETCH_USERS, e))
}

/// The authenticated caller.
pub async fn current_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserSummary>> {
    let user = state
        .users
        .get_user_by_id(user_id)
        .map_err(|e| store_failure(&ctx, messages::FAILED_FETCH_USER, e))?
        .ok_or_else(|| ctx.error(ApiError::not_found(messages::USER_NOT_FOUND)))?;

    Ok(Json(UserSummary {
        id: user.id,
        username: user.username,
    }))
}

/// Register a new account.
pub async fn register(
    State(state): State<AppState>,
    ctx: RequestContext,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<WriteSummary>)> {
    let values = validated(
        &state,
        &ctx,
        validate::REGISTER,
        Location::Body,
        &body,
        messages::FAILED_REGISTER_USER,
    )?;
    let username = values.string("username").unwrap_or_default();
    let password = values.string("password").unwrap_or_default();

    let password_hash = crate::auth::hash_password(&password).map_err(|e| {
        tracing::error!(error = %e, "Password hashing failed");
        ctx.error(ApiError::internal(messages::FAILED_REGISTER_USER))
    })?;

    let user = NewUser {
        username: username.clone(),
        password_hash,
    };

    match state.users.create_user(&user) {
        Ok(summary) => {
            tracing::info!(user_id = summary.last_insert_rowid, %username, "User registered");
            Ok((StatusCode::CREATED, Json(summary)))
        }
        // Lost the race against a concurrent registration of the same name.
        Err(StoreError::UniqueViolation(_)) => {
            let errors = [FieldError {
                kind: "field",
                value: Some(Value::String(username)),
                msg: "Username already exists".to_string(),
                path: "username".to_string(),
                location: Location::Body,
            }];
            Err(ctx.error(ApiError::bad_request(&errors)))
        }
        Err(e) => Err(store_failure(&ctx, messages::FAILED_REGISTER_USER, e)),
    }
}

/// Check credentials and start a cookie session.
pub async fn login(
    State(state): State<AppState>,
    ctx: RequestContext,
    JsonBody(body): JsonBody,
) -> Result<impl IntoResponse> {
    let values = validated(
        &state,
        &ctx,
        validate::LOGIN,
        Location::Body,
        &body,
        messages::FAILED_LOGIN_USER,
    )?;
    let username = values.string("username").unwrap_or_default();
    let password = values.string("password").unwrap_or_default();

    let user = state
        .users
        .get_user_by_username(&username)
        .map_err(|e| store_failure(&ctx, messages::FAILED_LOGIN_USER, e))?;

    state
        .auth
        .check_credentials(user.as_ref(), &password)
        .map_err(|e| {
            tracing::debug!(%username, "Login failed");
            ctx.error(e)
        })?;

    // check_credentials only succeeds for an existing user
    let Some(user) = user else {
        return Err(ctx.error(ApiError::unauthorized(messages::INVALID_CREDENTIALS)));
    };

    let token = state.auth.issue_token(user.id).map_err(|e| ctx.error(e))?;
    let cookie = session_cookie(
        &token,
        state.auth.ttl_seconds(),
        state.config.auth.secure_cookie,
    );

    tracing::info!(user_id = user.id, "User logged in");
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(UserSummary {
            id: user.id,
            username: user.username,
        }),
    ))
}

/// End the cookie session.
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        AppendHeaders([(
            header::SET_COOKIE,
            clear_session_cookie(state.config.auth.secure_cookie),
        )]),
        Json(MessageResponse {
            message: "Logged out successfully",
        }),
    )
}
