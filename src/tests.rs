use crate::auth::{AuthService, hash_password};
use crate::config::Config;
use crate::db::{
    Book, BookFilter, BookPatch, BookStore, BookWithRelations, Database, Genre, GenreStore,
    NewBook, NewUser, ReadingStatus, User, UserPatch, UserStore, UserSummary, WriteSummary,
};
use crate::error::{StoreError, StoreResult};
use crate::server::{AppState, TOKEN_COOKIE, create_router};
use crate::validate::registration;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    db: Database,
    auth: AuthService,
}

impl TestApp {
    fn new() -> Self {
        let db = Database::open_memory().unwrap();
        let auth = AuthService::new(SECRET, 3600).unwrap();
        let mut config = Config::default();
        config.auth.jwt_secret = Some(SECRET.to_string());

        let state = AppState::new_with_db(config, db.clone(), auth.clone());
        Self {
            router: create_router(state),
            db,
            auth,
        }
    }

    /// Insert a user directly and return its id and a valid token.
    fn user(&self, username: &str, password: &str) -> (i64, String) {
        let id = self
            .db
            .create_user(&NewUser {
                username: username.to_string(),
                password_hash: hash_password(password).unwrap(),
            })
            .unwrap()
            .last_insert_rowid;
        (id, self.auth.issue_token(id).unwrap())
    }

    fn genre(&self, name: &str) -> i64 {
        self.db.create_genre(name).unwrap().last_insert_rowid
    }

    fn book(&self, title: &str, genre_id: i64, user_id: i64) -> i64 {
        self.db
            .create_book(&NewBook {
                title: title.to_string(),
                author: "Someone".to_string(),
                genre_id,
                user_id,
                status: ReadingStatus::ToRead,
                cover_image: None,
            })
            .unwrap()
            .last_insert_rowid
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        send(&self.router, req).await
    }
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

fn request(method: Method, uri: &str, body: Option<Value>, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn get(uri: &str) -> Request<Body> {
    request(Method::GET, uri, None, None)
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    let cookie = headers.get(header::SET_COOKIE)?.to_str().ok()?;
    let (pair, _) = cookie.split_once(';')?;
    let (name, value) = pair.split_once('=')?;
    (name == TOKEN_COOKIE).then(|| value.to_string())
}

// ============================================================================
// Routing and error shape
// ============================================================================

#[tokio::test]
async fn health_served_at_root_and_api() {
    let app = TestApp::new();

    for uri in ["/health", "/api/health"] {
        let (status, _, body) = app.send(get(uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "OK", "message": "Server is running"}));
    }
}

#[tokio::test]
async fn unknown_route_is_404_with_url_only() {
    let app = TestApp::new();

    let (status, _, body) = app.send(get("/api/nothing?x=1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"message": "Route not found", "url": "/api/nothing?x=1"}));
}

#[tokio::test]
async fn missing_book_carries_request_context() {
    let app = TestApp::new();

    let (status, _, body) = app.send(get("/api/books/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({"message": "Book not found", "url": "/api/books/999", "method": "GET"})
    );

    let (status, _, _) = app.send(get("/api/books/abc")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_json_is_invalid_input() {
    let app = TestApp::new();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/genres")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, _, body) = app.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"message": "Invalid input data", "url": "/api/genres", "method": "POST"})
    );
}

// ============================================================================
// Books
// ============================================================================

#[tokio::test]
async fn list_books_applies_and_filters() {
    let app = TestApp::new();
    let (alice, _) = app.user("alice", "secret1");
    let (bob, _) = app.user("bob", "secret1");
    let fiction = app.genre("Fiction");
    let fantasy = app.genre("Fantasy");
    app.book("Dune", fiction, alice);
    app.book("The Hobbit", fantasy, alice);
    app.book("Dune Messiah", fantasy, bob);

    let (status, _, body) = app.send(get("/api/books")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);

    let uri = format!("/api/books?genreId={fantasy}&userId={alice}");
    let (_, _, body) = app.send(get(&uri)).await;
    let books: Vec<BookWithRelations> = serde_json::from_value(body).unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].book.title, "The Hobbit");
    assert_eq!(books[0].genre_name.as_deref(), Some("Fantasy"));
    assert_eq!(books[0].username.as_deref(), Some("alice"));

    let (_, _, body) = app.send(get("/api/books?title=Dune")).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    // Empty title never excludes rows
    let (_, _, body) = app.send(get("/api/books?title=")).await;
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn list_books_rejects_bad_query() {
    let app = TestApp::new();

    let (status, _, body) = app.send(get("/api/books?genreId=0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"][0]["path"], "genreId");
    assert_eq!(body["message"][0]["location"], "query");
    assert_eq!(body["message"][0]["msg"], "Genre ID must be a positive integer");
}

#[tokio::test]
async fn create_book_validates_before_auth() {
    let app = TestApp::new();

    let (status, _, body) = app
        .send(request(Method::POST, "/api/books", Some(json!({})), None))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let paths: Vec<_> = body["message"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["path"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(paths, ["title", "author", "genreId"]);

    let valid = json!({"title": "Dune", "author": "Frank Herbert", "genreId": 1});
    let (status, _, body) = app
        .send(request(Method::POST, "/api/books", Some(valid.clone()), None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "No token provided");

    let (status, _, body) = app
        .send(request(Method::POST, "/api/books", Some(valid), Some("garbage")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid token");
}

#[tokio::test]
async fn created_book_is_owned_by_caller() {
    let app = TestApp::new();
    let (alice, token) = app.user("alice", "secret1");
    let genre = app.genre("Science Fiction");

    let payload = json!({
        "title": " Dune ",
        "author": "Frank Herbert",
        "genreId": genre.to_string(),
        "userId": 999,
        "status": "in_progress"
    });
    let (status, _, body) = app
        .send(request(Method::POST, "/api/books", Some(payload), Some(&token)))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let summary: WriteSummary = serde_json::from_value(body).unwrap();
    assert_eq!(summary.changes, 1);

    let (status, _, body) = app
        .send(get(&format!("/api/books/{}", summary.last_insert_rowid)))
        .await;
    assert_eq!(status, StatusCode::OK);
    let book: Book = serde_json::from_value(body).unwrap();
    assert_eq!(book.user_id, alice);
    assert_eq!(book.title, "Dune");
    assert_eq!(book.status, ReadingStatus::InProgress);
}

#[tokio::test]
async fn token_cookie_authenticates() {
    let app = TestApp::new();
    let (_, token) = app.user("alice", "secret1");
    let genre = app.genre("Fiction");

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/books")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, format!("{TOKEN_COOKIE}={token}"))
        .body(Body::from(
            json!({"title": "1984", "author": "George Orwell", "genreId": genre}).to_string(),
        ))
        .unwrap();

    let (status, _, _) = app.send(req).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn non_owner_gets_403_regardless_of_payload() {
    let app = TestApp::new();
    let (alice, _) = app.user("alice", "secret1");
    let (_, bob_token) = app.user("bob", "secret1");
    let genre = app.genre("Fiction");
    let id = app.book("Dune", genre, alice);
    let uri = format!("/api/books/{id}");

    for payload in [json!({"status": "read"}), json!({"status": "bogus", "title": ""})] {
        let (status, _, body) = app
            .send(request(Method::PATCH, &uri, Some(payload), Some(&bob_token)))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "You do not have permission to perform this action");
        assert_eq!(body["method"], "PATCH");
    }

    let (status, _, _) = app
        .send(request(Method::DELETE, &uri, None, Some(&bob_token)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(app.db.get_book(id).unwrap().is_some());
}

#[tokio::test]
async fn status_update_changes_only_status() {
    let app = TestApp::new();
    let (alice, token) = app.user("alice", "secret1");
    let genre = app.genre("Fiction");
    let id = app.book("Dune", genre, alice);
    let before = app.db.get_book(id).unwrap().unwrap();

    let (status, _, body) = app
        .send(request(
            Method::PATCH,
            &format!("/api/books/{id}"),
            Some(json!({"status": "read"})),
            Some(&token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changes"], 1);

    let after = app.db.get_book(id).unwrap().unwrap();
    assert_eq!(after.status, ReadingStatus::Read);
    assert_eq!(
        Book {
            status: before.status,
            ..after
        },
        before
    );
}

#[tokio::test]
async fn update_without_fields_is_invalid_input() {
    let app = TestApp::new();
    let (alice, token) = app.user("alice", "secret1");
    let genre = app.genre("Fiction");
    let id = app.book("Dune", genre, alice);

    let (status, _, body) = app
        .send(request(
            Method::PATCH,
            &format!("/api/books/{id}"),
            Some(json!({"userId": 2})),
            Some(&token),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid input data");
    assert_eq!(app.db.get_book(id).unwrap().unwrap().user_id, alice);
}

#[tokio::test]
async fn delete_book_then_missing() {
    let app = TestApp::new();
    let (alice, token) = app.user("alice", "secret1");
    let genre = app.genre("Fiction");
    let id = app.book("Dune", genre, alice);
    let uri = format!("/api/books/{id}");

    let (status, _, body) = app
        .send(request(Method::DELETE, &uri, None, Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changes"], 1);

    let (status, _, body) = app
        .send(request(Method::DELETE, &uri, None, Some(&token)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Book not found");

    // The store itself treats a repeated delete as a no-op
    assert_eq!(app.db.delete_book(id).unwrap().changes, 0);
}

// ============================================================================
// Genres
// ============================================================================

#[tokio::test]
async fn genre_crud() {
    let app = TestApp::new();

    let (status, _, body) = app
        .send(request(Method::POST, "/api/genres", Some(json!({"name": " Horror "})), None))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["lastInsertRowid"].as_i64().unwrap();

    let (status, _, body) = app
        .send(request(
            Method::PATCH,
            &format!("/api/genres/{id}"),
            Some(json!({"name": "Poetry"})),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changes"], 1);

    let (_, _, body) = app.send(get("/api/genres")).await;
    let genres: Vec<Genre> = serde_json::from_value(body).unwrap();
    assert_eq!(genres, [Genre { id, name: "Poetry".to_string() }]);

    let (status, _, body) = app
        .send(request(Method::DELETE, "/api/genres/abc", None, None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changes"], 0);

    let (status, _, body) = app
        .send(request(Method::DELETE, &format!("/api/genres/{id}"), None, None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changes"], 1);
}

#[tokio::test]
async fn genre_requires_name() {
    let app = TestApp::new();

    let (status, _, body) = app
        .send(request(Method::POST, "/api/genres", Some(json!({"name": "   "})), None))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        json!([{"type": "field", "value": "", "msg": "Name is required", "path": "name", "location": "body"}])
    );
}

#[tokio::test]
async fn deleting_referenced_genre_is_500() {
    let app = TestApp::new();
    let (alice, _) = app.user("alice", "secret1");
    let genre = app.genre("Fiction");
    app.book("Dune", genre, alice);

    let (status, _, body) = app
        .send(request(Method::DELETE, &format!("/api/genres/{genre}"), None, None))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Failed to delete genre");
}

// ============================================================================
// Users and sessions
// ============================================================================

#[tokio::test]
async fn register_then_duplicate_is_400() {
    let app = TestApp::new();
    let payload = json!({"username": "alice", "password": "secret1"});

    let (status, _, body) = app
        .send(request(Method::POST, "/api/register", Some(payload.clone()), None))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["changes"], 1);

    let (status, _, body) = app
        .send(request(Method::POST, "/api/register", Some(payload), None))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"][0]["msg"], "Username already exists");

    let stored = app.db.get_user_by_username("alice").unwrap().unwrap();
    assert_ne!(stored.password_hash, "secret1");
}

#[tokio::test]
async fn users_listing_hides_passwords() {
    let app = TestApp::new();
    app.user("alice", "secret1");

    let (status, _, body) = app.send(get("/api/users")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"id": 1, "username": "alice"}]));
}

#[tokio::test]
async fn login_sets_cookie_and_me_works() {
    let app = TestApp::new();
    let (alice, _) = app.user("alice", "secret1");

    let (status, headers, body) = app
        .send(request(
            Method::POST,
            "/api/login",
            Some(json!({"username": "alice", "password": "secret1"})),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"id": alice, "username": "alice"}));

    let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Max-Age=3600"));

    let token = cookie_token(&headers).unwrap();
    let (status, _, body) = app
        .send(request(Method::GET, "/api/users/me", None, Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"id": alice, "username": "alice"}));
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = TestApp::new();
    app.user("alice", "secret1");

    let unknown = app
        .send(request(
            Method::POST,
            "/api/login",
            Some(json!({"username": "nouser", "password": "x"})),
            None,
        ))
        .await;
    let wrong = app
        .send(request(
            Method::POST,
            "/api/login",
            Some(json!({"username": "alice", "password": "wrong"})),
            None,
        ))
        .await;

    assert_eq!(unknown.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.0, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.2, wrong.2);
    assert_eq!(unknown.2["message"], "Invalid credentials");
}

#[tokio::test]
async fn me_requires_token() {
    let app = TestApp::new();

    let (status, _, body) = app.send(get("/api/users/me")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body,
        json!({"message": "No token provided", "url": "/api/users/me", "method": "GET"})
    );

    // Valid token for a user that is gone
    let token = app.auth.issue_token(42).unwrap();
    let (status, _, body) = app
        .send(request(Method::GET, "/api/users/me", None, Some(&token)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");
}

#[tokio::test]
async fn logout_clears_cookie() {
    let app = TestApp::new();

    let (status, headers, body) = app
        .send(request(Method::POST, "/api/logout", None, None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Logged out successfully"}));
    let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("token=;"));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn operator_added_user_can_log_in() {
    let app = TestApp::new();

    // Same path as `bookverse user add`
    let (username, password) = registration(" o'neil ", "secret1", &app.db).unwrap();
    app.db
        .create_user(&NewUser {
            username,
            password_hash: hash_password(&password).unwrap(),
        })
        .unwrap();

    let (status, _, body) = app
        .send(request(
            Method::POST,
            "/api/login",
            Some(json!({"username": "o'neil", "password": "secret1"})),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "o&#x27;neil");

    assert!(registration("ab", "secret1", &app.db).is_err());
    assert!(registration(&"x".repeat(40), "secret1", &app.db).is_err());
    assert!(registration("o'neil", "secret1", &app.db).is_err());
}

/// Users store whose existence check never sees a row, so registrations
/// reach the insert the way a concurrent duplicate would.
struct RacingUsers(Database);

impl UserStore for RacingUsers {
    fn list_users(&self) -> StoreResult<Vec<UserSummary>> {
        self.0.list_users()
    }
    fn get_user_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        self.0.get_user_by_id(id)
    }
    fn get_user_by_username(&self, _: &str) -> StoreResult<Option<User>> {
        Ok(None)
    }
    fn create_user(&self, user: &NewUser) -> StoreResult<WriteSummary> {
        self.0.create_user(user)
    }
    fn update_user(&self, id: i64, patch: &UserPatch) -> StoreResult<WriteSummary> {
        self.0.update_user(id, patch)
    }
    fn delete_user(&self, id: i64) -> StoreResult<WriteSummary> {
        self.0.delete_user(id)
    }
}

#[tokio::test]
async fn registration_race_loser_gets_400() {
    let db = Database::open_memory().unwrap();
    let db_store = Arc::new(db.clone());
    let state = AppState::with_stores(
        Config::default(),
        db_store.clone(),
        db_store,
        Arc::new(RacingUsers(db)),
        AuthService::new(SECRET, 3600).unwrap(),
    );
    let router = create_router(state);
    let payload = json!({"username": "alice", "password": "secret1"});

    let (status, _, _) = send(
        &router,
        request(Method::POST, "/api/register", Some(payload.clone()), None),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, body) = send(
        &router,
        request(Method::POST, "/api/register", Some(payload), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        json!([{
            "type": "field",
            "value": "alice",
            "msg": "Username already exists",
            "path": "username",
            "location": "body"
        }])
    );
    assert_eq!(body["method"], "POST");
}

// ============================================================================
// Store failures
// ============================================================================

/// Store whose every operation fails.
struct FailingStore;

fn broken<T>() -> StoreResult<T> {
    Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery))
}

impl BookStore for FailingStore {
    fn list_books(&self, _: &BookFilter) -> StoreResult<Vec<BookWithRelations>> {
        broken()
    }
    fn get_book(&self, _: i64) -> StoreResult<Option<Book>> {
        broken()
    }
    fn create_book(&self, _: &NewBook) -> StoreResult<WriteSummary> {
        broken()
    }
    fn update_book(&self, _: i64, _: &BookPatch) -> StoreResult<WriteSummary> {
        broken()
    }
    fn delete_book(&self, _: i64) -> StoreResult<WriteSummary> {
        broken()
    }
}

impl GenreStore for FailingStore {
    fn list_genres(&self) -> StoreResult<Vec<Genre>> {
        broken()
    }
    fn create_genre(&self, _: &str) -> StoreResult<WriteSummary> {
        broken()
    }
    fn update_genre(&self, _: i64, _: &str) -> StoreResult<WriteSummary> {
        broken()
    }
    fn delete_genre(&self, _: i64) -> StoreResult<WriteSummary> {
        broken()
    }
}

impl UserStore for FailingStore {
    fn list_users(&self) -> StoreResult<Vec<UserSummary>> {
        broken()
    }
    fn get_user_by_id(&self, _: i64) -> StoreResult<Option<User>> {
        broken()
    }
    fn get_user_by_username(&self, _: &str) -> StoreResult<Option<User>> {
        broken()
    }
    fn create_user(&self, _: &NewUser) -> StoreResult<WriteSummary> {
        broken()
    }
    fn update_user(&self, _: i64, _: &UserPatch) -> StoreResult<WriteSummary> {
        broken()
    }
    fn delete_user(&self, _: i64) -> StoreResult<WriteSummary> {
        broken()
    }
}

fn failing_router() -> (Router, AuthService) {
    let auth = AuthService::new(SECRET, 3600).unwrap();
    let store = Arc::new(FailingStore);
    let state = AppState::with_stores(
        Config::default(),
        store.clone(),
        store.clone(),
        store,
        auth.clone(),
    );
    (create_router(state), auth)
}

#[tokio::test]
async fn store_failures_are_genericized() {
    let (router, auth) = failing_router();

    let (status, _, body) = send(&router, get("/api/books")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({"message": "Failed to fetch books", "url": "/api/books", "method": "GET"})
    );

    let (status, _, body) = send(&router, get("/api/genres")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Failed to fetch genres");

    let (status, _, body) = send(&router, get("/api/users")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Failed to fetch users");

    let token = auth.issue_token(1).unwrap();
    let payload = json!({"title": "Dune", "author": "Frank Herbert", "genreId": 1});
    let (status, _, body) = send(
        &router,
        request(Method::POST, "/api/books", Some(payload), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Failed to create book");
}

#[tokio::test]
async fn failed_username_lookup_is_500() {
    let (router, _) = failing_router();

    let (status, _, body) = send(
        &router,
        request(
            Method::POST,
            "/api/register",
            Some(json!({"username": "alice", "password": "secret1"})),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Failed to register user");
}

#[test]
fn file_database_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("books.db");

    {
        let db = Database::open(&path).unwrap();
        db.create_genre("Fiction").unwrap();
    }

    let db = Database::open(&path).unwrap();
    assert_eq!(db.list_genres().unwrap().len(), 1);
}
