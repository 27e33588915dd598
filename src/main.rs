//! bookverse server entry point.

use bookverse::{
    auth::{AuthService, generate_secret, hash_password},
    config::{Cli, Command, Config, UserCommand},
    db::{Database, NewUser, UserPatch, UserStore, seed},
    error::StoreError,
    server,
    validate::{new_password, registration, stored_username},
};
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookverse=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Find or load config; init writes the file instead of reading it
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let mut config = match (&cli.command, &config_path) {
        (Some(Command::Init { .. }), _) | (_, None) => Config::default(),
        (_, Some(path)) => Config::load(path)?,
    };

    if let Some(secret) = cli.jwt_secret {
        config.auth.jwt_secret = Some(secret);
    }

    // Handle command
    match cli.command {
        Some(Command::Init { force }) => cmd_init(cli.config, force),
        Some(Command::Seed) => cmd_seed(&config),
        Some(Command::User { action }) => cmd_user(action, &config),
        Some(Command::Serve { bind }) => cmd_serve(config, bind).await,
        None => {
            // Default: start server
            cmd_serve(config, None).await
        }
    }
}

/// Initialize config and database.
///
/// Writes to `--config` when given, `./config.toml` otherwise.
fn cmd_init(config_path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let config_path = config_path.unwrap_or_else(|| PathBuf::from("config.toml"));

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    // Write default config with a fresh signing secret
    if let Some(parent) = config_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&config_path, Config::generate_default(&generate_secret()))?;
    println!("Created config file: {}", config_path.display());

    let config = Config::load(&config_path)?;
    let _db = Database::open(&config.database.path)?;
    println!("Initialized database: {}", config.database.path.display());

    println!("\nEdit {} to configure your server.", config_path.display());
    println!("Then run: bookverse seed   (optional demo data)");
    println!("And:      bookverse serve");

    Ok(())
}

/// Insert demo data.
fn cmd_seed(config: &Config) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;
    let report = seed::seed(&db)?;

    println!(
        "Seeded {}: {} users, {} genres, {} books",
        config.database.path.display(),
        report.users,
        report.genres,
        report.books
    );
    Ok(())
}

/// User management commands.
fn cmd_user(action: UserCommand, config: &Config) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;

    match action {
        UserCommand::Add { username, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password("Password: ")?,
            };
            let (username, password) = registration(&username, &password, &db)?;

            let user = NewUser {
                username,
                password_hash: hash_password(&password)?,
            };

            match db.create_user(&user) {
                Ok(summary) => println!(
                    "Created user: {} (id: {})",
                    user.username, summary.last_insert_rowid
                ),
                Err(StoreError::UniqueViolation(_)) => {
                    anyhow::bail!("Username already exists: {}", user.username)
                }
                Err(e) => return Err(e.into()),
            }
        }

        UserCommand::Del { username } => {
            match db.get_user_by_username(&stored_username(&username))? {
                Some(user) => {
                    db.delete_user(user.id)?;
                    println!("Deleted user: {}", username);
                }
                None => println!("User not found: {}", username),
            }
        }

        UserCommand::List => {
            let users = db.list_users()?;
            if users.is_empty() {
                println!("No users found.");
            } else {
                println!("{:<8} USERNAME", "ID");
                println!("{}", "-".repeat(40));
                for user in users {
                    println!("{:<8} {}", user.id, user.username);
                }
            }
        }

        UserCommand::Passwd { username, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password("New password: ")?,
            };
            let password = new_password(&password, &db)?;

            match db.get_user_by_username(&stored_username(&username))? {
                Some(user) => {
                    let patch = UserPatch {
                        password_hash: Some(hash_password(&password)?),
                        ..Default::default()
                    };
                    db.update_user(user.id, &patch)?;
                    println!("Password changed for: {}", username);
                }
                None => println!("User not found: {}", username),
            }
        }
    }

    Ok(())
}

/// Start the server.
async fn cmd_serve(mut config: Config, bind: Option<std::net::SocketAddr>) -> anyhow::Result<()> {
    // Override bind address if specified
    if let Some(addr) = bind {
        config.server.bind = addr;
    }

    let auth = AuthService::new(config.auth.secret()?, config.auth.token_ttl_seconds)?;

    // Open database
    let db = Database::open(&config.database.path)?;

    tracing::info!(
        bind = %config.server.bind,
        database = %config.database.path.display(),
        "Starting bookverse server"
    );

    let bind_addr = config.server.bind;
    let state = server::AppState::new_with_db(config, db, auth);
    let app = server::create_router(state);

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(address = %bind_addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Prompt for password input.
fn prompt_password(prompt: &str) -> anyhow::Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut password = String::new();
    io::stdin().read_line(&mut password)?;

    Ok(password.trim_end_matches(['\r', '\n']).to_string())
}
