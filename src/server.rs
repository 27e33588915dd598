//! HTTP server and routes.

mod extract;
mod handlers;
mod state;

pub use extract::{AuthUser, JsonBody, OwnedBook, RequestContext, TOKEN_COOKIE};
pub use state::AppState;

use axum::{
    Router,
    routing::{get, patch, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Books
        .route(
            "/books",
            get(handlers::list_books).post(handlers::create_book),
        )
        .route(
            "/books/{id}",
            get(handlers::get_book)
                .patch(handlers::update_book)
                .delete(handlers::delete_book),
        )
        // Genres
        .route(
            "/genres",
            get(handlers::list_genres).post(handlers::create_genre),
        )
        .route(
            "/genres/{id}",
            patch(handlers::update_genre).delete(handlers::delete_genre),
        )
        // Users and sessions
        .route("/users", get(handlers::list_users))
        .route("/users/me", get(handlers::current_user))
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/health", get(handlers::health));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api_routes)
        .fallback(handlers::route_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
