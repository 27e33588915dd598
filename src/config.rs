use crate::auth::DEFAULT_TOKEN_TTL_SECONDS;
use crate::error::ConfigError;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// REST backend for a personal book tracker.
#[derive(Parser, Debug, Clone)]
#[command(name = "bookverse")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "BOOKVERSE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Token signing secret (overrides the config file).
    #[arg(long, env = "BOOKVERSE_JWT_SECRET", global = true, hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the server (default if no command given).
    Serve {
        /// Address to bind the server to.
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Create a default config file and database.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },

    /// Fill the database with demo users, genres and books.
    Seed,

    /// User management commands.
    User {
        /// User subcommand action.
        #[command(subcommand)]
        action: UserCommand,
    },
}

/// User management subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum UserCommand {
    /// Add a new user.
    Add {
        /// Username.
        username: String,
        /// Password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Delete a user.
    Del {
        /// Username to delete.
        username: String,
    },

    /// List all users.
    List,

    /// Change user password.
    Passwd {
        /// Username.
        username: String,
        /// New password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
    },
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(
        std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        5000,
    )
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("db/bookverse.db")
}

/// Authentication configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret. Required to serve.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Token and session cookie lifetime in seconds.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: i64,

    /// Mark the session cookie `Secure`.
    #[serde(default)]
    pub secure_cookie: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_seconds: default_token_ttl(),
            secure_cookie: false,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("secure_cookie", &self.secure_cookie)
            .finish()
    }
}

fn default_token_ttl() -> i64 {
    DEFAULT_TOKEN_TTL_SECONDS
}

impl AuthConfig {
    /// The configured secret, if non-empty.
    pub fn secret(&self) -> Result<&str, ConfigError> {
        self.jwt_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingSecret)
    }
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("bookverse.toml"),
            dirs::config_dir()
                .map(|p| p.join("bookverse").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/bookverse/config.toml"),
        ];

        candidates
            .into_iter()
            .find(|p| !p.as_os_str().is_empty() && p.exists())
    }

    /// Generate default config file content with the given secret.
    pub fn generate_default(jwt_secret: &str) -> String {
        format!(
            r#"# bookverse configuration

[server]
bind = "0.0.0.0:5000"

[database]
path = "db/bookverse.db"

[auth]
# HS256 signing secret for session tokens (BOOKVERSE_JWT_SECRET overrides)
jwt_secret = "{jwt_secret}"
# Token and cookie lifetime in seconds
token_ttl_seconds = 3600
# Send the session cookie only over HTTPS
secure_cookie = false
"#
        )
    }
}
