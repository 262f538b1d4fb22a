// This is the entry point of drive-letters.
//
// **Architecture Overview:**
// - `core/` = Business logic (letters, identity) behind traits
// - `infra/` = Implementations of core traits (Google Drive, Firebase, local stores)
// - `http/` = The axum API server
// - `client/` = Session, API client and views, driven from the command line
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Run the server or the requested client command

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "client/client_layer.rs"]
mod client;
mod config;
#[path = "core/core_layer.rs"]
mod core;
#[path = "http/http_layer.rs"]
mod http;
#[path = "infra/infra_layer.rs"]
mod infra;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::client::commands;
use crate::config::{ClientConfig, DriveCredentials, ServerConfig, StorageBackend};
use crate::core::letters::{LetterService, LetterStore};
use crate::infra::firebase::FirebaseTokenVerifier;
use crate::infra::google_drive::{
    AccessTokenProvider, GoogleDriveStore, RefreshTokenAuth, ServiceAccountAuth, StaticAccessToken,
};
use crate::infra::letters::{InMemoryLetterStore, JsonLetterStore};

#[derive(Parser)]
#[command(name = "drive-letters", about = "Write letters and keep them in Google Drive")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the letters API server
    Serve,

    /// Sign in with a Google credential and print a refresh token
    Login {
        /// Google ID token from the sign-in flow
        #[arg(long, conflicts_with = "google_access_token")]
        google_id_token: Option<String>,

        /// Google OAuth access token carrying the drive.file scope
        #[arg(long)]
        google_access_token: Option<String>,
    },

    /// Show who is signed in
    Whoami,

    /// Sign out
    Logout,

    /// List your letters
    List,

    /// Print one letter
    Show { id: String },

    /// Create a letter, or overwrite one with --id
    Write {
        #[arg(long)]
        title: String,

        /// Existing letter to overwrite
        #[arg(long)]
        id: Option<String>,

        /// Plain text file with the letter body
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Delete a letter
    Delete { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve => serve(ServerConfig::from_env()?).await,
        Command::Login {
            google_id_token,
            google_access_token,
        } => {
            let credential = commands::credential_from_args(google_id_token, google_access_token)?;
            commands::login(&ClientConfig::from_env(), credential).await
        }
        Command::Whoami => commands::whoami(&ClientConfig::from_env()).await,
        Command::Logout => commands::logout(&ClientConfig::from_env()).await,
        Command::List => commands::list(&ClientConfig::from_env()).await,
        Command::Show { id } => commands::show(&ClientConfig::from_env(), &id).await,
        Command::Write { title, id, file } => {
            commands::write(
                &ClientConfig::from_env(),
                &title,
                id.as_deref(),
                file.as_deref(),
            )
            .await
        }
        Command::Delete { id } => commands::delete(&ClientConfig::from_env(), &id).await,
    }
}

async fn drive_auth(credentials: DriveCredentials) -> anyhow::Result<Box<dyn AccessTokenProvider>> {
    Ok(match credentials {
        DriveCredentials::ServiceAccountFile(path) => {
            tracing::info!("Using service account credentials from {}", path);
            Box::new(ServiceAccountAuth::from_file(&path).await?)
        }
        DriveCredentials::ServiceAccountJson(json) => {
            tracing::info!("Using service account credentials from GOOGLE_SERVICE_ACCOUNT_JSON");
            Box::new(ServiceAccountAuth::from_json(&json)?)
        }
        DriveCredentials::RefreshToken {
            client_id,
            client_secret,
            refresh_token,
        } => {
            tracing::info!("Using OAuth refresh token for Drive access");
            Box::new(RefreshTokenAuth::new(client_id, client_secret, refresh_token))
        }
        DriveCredentials::AccessToken(token) => {
            tracing::warn!("Using a static Drive access token; it expires within an hour");
            Box::new(StaticAccessToken(token))
        }
    })
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let store: Arc<dyn LetterStore> = match config.storage {
        StorageBackend::Drive(credentials) => {
            Arc::new(GoogleDriveStore::new(drive_auth(credentials).await?))
        }
        StorageBackend::Memory => {
            tracing::warn!("Letters are kept in memory and lost on shutdown");
            Arc::new(InMemoryLetterStore::default())
        }
        StorageBackend::Json(path) => {
            tracing::info!("Storing letters in {}", path.display());
            Arc::new(
                JsonLetterStore::new(&path)
                    .with_context(|| format!("Failed to open {}", path.display()))?,
            )
        }
    };

    let letters = LetterService::new(store, config.ownership);
    let verifier = Arc::new(FirebaseTokenVerifier::new(&config.firebase_project_id));
    let state = http::AppState::new(letters, verifier);
    let app = http::build_router(state, config.max_body_bytes);

    tracing::info!(
        ownership = ?config.ownership,
        "Starting letters API on {}",
        config.bind_addr
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
