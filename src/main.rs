//! Bookseerr - book requests in front of Readarr.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookseerr::{
    api::{self, ApiState},
    auth::{self, Auth},
    config::{default_data_dir, AuthConfig, Config, ReadarrConfig},
    readarr::ReadarrClient,
    store::LibraryStore,
};

/// Book request service for Readarr.
#[derive(Parser)]
#[command(name = "bookseerr", about = "Book requests in front of Readarr")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API daemon.
    Daemon(DaemonArgs),

    /// Show daemon status.
    Status {
        /// Bookseerr API URL.
        #[arg(long, env = "BOOKSEERR_API_URL", default_value = "http://localhost:5055")]
        api_url: String,
    },

    /// Pull Readarr's library into the local catalog.
    Sync {
        #[command(flatten)]
        login: LoginArgs,
    },

    /// List requests waiting for approval.
    Pending {
        #[command(flatten)]
        login: LoginArgs,
    },
}

#[derive(Args)]
struct DaemonArgs {
    /// Address to bind the API server.
    #[arg(long, default_value = "0.0.0.0:5055", env = "BOOKSEERR_BIND")]
    bind: String,

    /// Data directory for the database.
    #[arg(long, env = "BOOKSEERR_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Secret for signing session tokens.
    #[arg(long, env = "BOOKSEERR_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Session lifetime in seconds.
    #[arg(long, env = "BOOKSEERR_TOKEN_TTL", default_value_t = 3600)]
    token_ttl: u64,

    /// Password for the admin account created on first start.
    #[arg(long, env = "BOOKSEERR_ADMIN_PASSWORD", default_value = "admin", hide_env_values = true)]
    admin_password: String,

    /// Readarr API base URL.
    #[arg(long, env = "READARR_URL", default_value = "http://localhost:8787/api/v1")]
    readarr_url: String,

    #[arg(long, env = "READARR_API_KEY", default_value = "", hide_env_values = true)]
    readarr_api_key: String,

    #[arg(long, env = "READARR_QUALITY_PROFILE_ID", default_value_t = 1)]
    quality_profile_id: i64,

    #[arg(long, env = "READARR_METADATA_PROFILE_ID", default_value_t = 1)]
    metadata_profile_id: i64,

    /// Folder Readarr stores added books under.
    #[arg(long, env = "READARR_ROOT_FOLDER", default_value = "/books")]
    root_folder: String,

    /// Timeout for each Readarr call, in seconds.
    #[arg(long, env = "READARR_TIMEOUT_SECS", default_value_t = 30)]
    readarr_timeout: u64,
}

impl DaemonArgs {
    fn into_config(self) -> Config {
        let auth_defaults = AuthConfig::default();

        Config {
            bind: self.bind,
            data_dir: self.data_dir.unwrap_or_else(default_data_dir),
            auth: AuthConfig {
                jwt_secret: self.jwt_secret.unwrap_or(auth_defaults.jwt_secret),
                token_ttl: Duration::from_secs(self.token_ttl),
                bootstrap_admin_password: self.admin_password,
            },
            readarr: ReadarrConfig {
                url: self.readarr_url,
                api_key: self.readarr_api_key,
                quality_profile_id: self.quality_profile_id,
                metadata_profile_id: self.metadata_profile_id,
                root_folder_path: self.root_folder,
                timeout: Duration::from_secs(self.readarr_timeout),
            },
        }
    }
}

#[derive(Args)]
struct LoginArgs {
    /// Bookseerr API URL.
    #[arg(long, env = "BOOKSEERR_API_URL", default_value = "http://localhost:5055")]
    api_url: String,

    #[arg(long, env = "BOOKSEERR_USERNAME", default_value = "admin")]
    username: String,

    #[arg(long, env = "BOOKSEERR_PASSWORD", hide_env_values = true)]
    password: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookseerr=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon(args) => {
            run_daemon(args.into_config()).await?;
        }

        Commands::Status { api_url } => {
            show_status(&api_url).await?;
        }

        Commands::Sync { login } => {
            run_sync(&login).await?;
        }

        Commands::Pending { login } => {
            list_pending(&login).await?;
        }
    }

    Ok(())
}

/// Run the API daemon.
async fn run_daemon(config: Config) -> Result<()> {
    tracing::info!("Starting Bookseerr daemon...");

    if config.auth.jwt_secret == AuthConfig::default().jwt_secret {
        tracing::warn!("Using the built-in JWT secret; set BOOKSEERR_JWT_SECRET");
    }
    if config.readarr.api_key.is_empty() {
        tracing::warn!("READARR_API_KEY is not set; Readarr will refuse requests");
    }

    let store = Arc::new(
        LibraryStore::open(&config.database_path())
            .with_context(|| format!("opening {}", config.database_path().display()))?,
    );
    auth::bootstrap_admin(&store, &config.auth.bootstrap_admin_password)?;

    let readarr = ReadarrClient::new(config.readarr.clone())?;
    tracing::info!(readarr = %config.readarr.url, "Readarr client ready");

    let state = Arc::new(ApiState::new(store, readarr, Auth::new(&config.auth)));

    api::serve(state, &config.bind).await?;

    Ok(())
}

/// Log in and return the session token.
async fn login(client: &reqwest::Client, args: &LoginArgs) -> Result<String> {
    let url = format!("{}/api/auth/login", args.api_url);

    let response = client
        .post(&url)
        .json(&serde_json::json!({
            "username": args.username,
            "password": args.password,
        }))
        .send()
        .await?;

    if !response.status().is_success() {
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        anyhow::bail!("Login failed: {}", body["error"].as_str().unwrap_or("unknown error"));
    }

    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|cookie| {
            cookie
                .split(';')
                .next()
                .and_then(|pair| pair.trim().strip_prefix("token="))
                .map(str::to_string)
        })
        .context("Login response carried no session cookie")
}

/// Show daemon status via API.
async fn show_status(api_url: &str) -> Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{}/api/status", api_url);

    let response = client.get(&url).send().await?;

    if !response.status().is_success() {
        anyhow::bail!("Failed to get status: {}", response.status());
    }

    let body: serde_json::Value = response.json().await?;
    let status = &body["data"];

    println!("Bookseerr Status");
    println!("================");
    println!("Status:           {}", status["status"]);
    println!("Version:          {}", status["version"]);
    println!("Readarr:          {}", status["readarr_url"]);
    println!("Books:            {}", status["books"]);
    println!("Pending requests: {}", status["pending_requests"]);
    println!("Uptime:           {}s", status["uptime_secs"]);

    Ok(())
}

/// Trigger a sync via API.
async fn run_sync(args: &LoginArgs) -> Result<()> {
    let client = reqwest::Client::new();
    let token = login(&client, args).await?;
    let url = format!("{}/api/sync/readarr", args.api_url);

    let response = client.post(&url).bearer_auth(&token).send().await?;

    let status = response.status();
    let body: serde_json::Value = response.json().await?;
    if !status.is_success() {
        anyhow::bail!("Sync failed: {}", body["error"].as_str().unwrap_or("unknown error"));
    }

    let stats = &body["stats"];
    println!("{}", body["message"].as_str().unwrap_or("Sync complete"));
    println!("Total:   {}", stats["totalBooks"]);
    println!("New:     {}", stats["newBooksAdded"]);
    println!("Updated: {}", stats["booksUpdated"]);
    println!("Skipped: {}", stats["skipped"]);

    Ok(())
}

/// List pending requests via API.
async fn list_pending(args: &LoginArgs) -> Result<()> {
    let client = reqwest::Client::new();
    let token = login(&client, args).await?;
    let url = format!("{}/api/requests?status=pending", args.api_url);

    let response = client.get(&url).bearer_auth(&token).send().await?;

    if !response.status().is_success() {
        anyhow::bail!("Failed to list requests: {}", response.status());
    }

    let body: serde_json::Value = response.json().await?;
    let requests = body["data"].as_array().cloned().unwrap_or_default();

    if requests.is_empty() {
        println!("No pending requests.");
        return Ok(());
    }

    println!("{:<6} {:<8} {:<40} {:<24}", "ID", "USER", "TITLE", "REQUESTED");
    println!("{}", "-".repeat(80));

    for request in requests {
        println!(
            "{:<6} {:<8} {:<40} {:<24}",
            request["id"],
            request["user_id"],
            request["book"]["title"].as_str().unwrap_or("?"),
            request["requested_at"].as_str().unwrap_or("?"),
        );
    }

    Ok(())
}
