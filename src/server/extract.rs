//! Request extractors: error context, authentication, book ownership and
//! JSON bodies.

use crate::db::Book;
use crate::error::{ApiError, AuthError, messages};
use crate::server::AppState;
use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, OriginalUri, Path, Request};
use axum::http::{HeaderMap, Method, Uri, header, request::Parts};
use serde_json::{Map, Value};
use std::convert::Infallible;

/// Name of the session cookie.
pub const TOKEN_COOKIE: &str = "token";

/// Original request URI and method, attached to every error.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Full request URI, before any router nesting.
    pub uri: Uri,
    /// Request method.
    pub method: Method,
}

impl RequestContext {
    fn new(extensions: &axum::http::Extensions, uri: &Uri, method: &Method) -> Self {
        let uri = extensions
            .get::<OriginalUri>()
            .map(|original| original.0.clone())
            .unwrap_or_else(|| uri.clone());
        Self {
            uri,
            method: method.clone(),
        }
    }

    fn from_parts(parts: &Parts) -> Self {
        Self::new(&parts.extensions, &parts.uri, &parts.method)
    }

    /// Attach this request's url and method to an error.
    pub fn error(&self, err: impl Into<ApiError>) -> ApiError {
        err.into().at(&self.uri, &self.method)
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

/// Extract the session token: bearer header first, then the token cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|cookie| {
            let (name, value) = cookie.trim().split_once('=')?;
            (name == TOKEN_COOKIE && !value.is_empty()).then(|| value.to_string())
        })
}

/// `Set-Cookie` value carrying a session token.
pub fn session_cookie(token: &str, max_age_seconds: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{TOKEN_COOKIE}={token}; HttpOnly; SameSite=Strict; Path=/; Max-Age={max_age_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

/// Authenticated caller, resolved from a verified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub i64);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ctx = RequestContext::from_parts(parts);
        let token = extract_token(&parts.headers).ok_or_else(|| ctx.error(AuthError::NoToken))?;

        let user_id = state.auth.verify_token(&token).map_err(|e| {
            tracing::debug!(error = %e, "Token rejected");
            ctx.error(e)
        })?;

        Ok(AuthUser(user_id))
    }
}

/// A book the authenticated caller owns, loaded from the `{id}` path segment.
#[derive(Debug, Clone)]
pub struct OwnedBook {
    /// Caller, who is also the owner.
    pub user_id: i64,
    /// The book as loaded.
    pub book: Book,
}

impl FromRequestParts<AppState> for OwnedBook {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user_id) = AuthUser::from_request_parts(parts, state).await?;
        let ctx = RequestContext::from_parts(parts);

        let book_id = Path::<String>::from_request_parts(parts, state)
            .await
            .ok()
            .and_then(|Path(raw)| raw.parse::<i64>().ok())
            .ok_or_else(|| ctx.error(ApiError::not_found(messages::BOOK_NOT_FOUND)))?;

        let book = state
            .books
            .get_book(book_id)
            .map_err(|e| {
                tracing::error!(error = %e, book_id, "Failed to load book for ownership check");
                ctx.error(ApiError::internal(messages::FAILED_FETCH_BOOKS))
            })?
            .ok_or_else(|| ctx.error(ApiError::not_found(messages::BOOK_NOT_FOUND)))?;

        if book.user_id != user_id {
            tracing::debug!(book_id, user_id, owner = book.user_id, "Ownership check failed");
            return Err(ctx.error(ApiError::forbidden(messages::NO_PERMISSION)));
        }

        Ok(OwnedBook { user_id, book })
    }
}

/// JSON object body. An empty body reads as an empty object.
#[derive(Debug, Clone, Default)]
pub struct JsonBody(pub Map<String, Value>);

impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let ctx = RequestContext::new(req.extensions(), req.uri(), req.method());
        let invalid = || {
            ctx.error(ApiError::new(
                messages::INVALID_INPUT,
                axum::http::StatusCode::BAD_REQUEST,
            ))
        };

        let bytes = Bytes::from_request(req, state).await.map_err(|_| invalid())?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(JsonBody(Map::new()));
        }

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(JsonBody(map)),
            _ => Err(invalid()),
        }
    }
}
