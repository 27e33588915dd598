//! bookverse: a small REST backend for tracking personal reading.
//!
//! Users register and log in, then keep a list of books they own, each
//! filed under a genre and marked `to_read`, `in_progress` or `read`.
//!
//! # Features
//!
//! - Book, genre and user CRUD over JSON
//! - Session tokens via bearer header or `token` cookie
//! - Owner-only book mutation
//! - Declarative request validation with structured field errors
//! - SQLite storage with demo seed data

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Password hashing and session tokens.
pub mod auth;
/// Configuration and CLI.
pub mod config;
/// Data model and persistence.
pub mod db;
/// Error types.
pub mod error;
/// HTTP server.
pub mod server;
/// Request validation.
pub mod validate;

#[cfg(test)]
mod tests;

pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{ApiError, Result};
pub use server::AppState;
