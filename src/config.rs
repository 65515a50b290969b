//! Daemon configuration.
//!
//! Values come from CLI flags with environment fallbacks (see `main.rs`);
//! this module only holds the assembled result and its defaults.

use std::path::PathBuf;
use std::time::Duration;

/// How to reach Readarr and what to send when adding a book.
#[derive(Clone)]
pub struct ReadarrConfig {
    /// Base API URL, e.g. `http://localhost:8787/api/v1`.
    pub url: String,

    pub api_key: String,

    pub quality_profile_id: i64,

    pub metadata_profile_id: i64,

    /// Folder Readarr stores added books under.
    pub root_folder_path: String,

    /// Upper bound for any single Readarr call.
    pub timeout: Duration,
}

impl std::fmt::Debug for ReadarrConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadarrConfig")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .field("quality_profile_id", &self.quality_profile_id)
            .field("metadata_profile_id", &self.metadata_profile_id)
            .field("root_folder_path", &self.root_folder_path)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for ReadarrConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8787/api/v1".to_string(),
            api_key: String::new(),
            quality_profile_id: 1,
            metadata_profile_id: 1,
            root_folder_path: "/books".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Session token settings.
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret for signing session tokens.
    pub jwt_secret: String,

    /// Token and cookie lifetime.
    pub token_ttl: Duration,

    /// Password given to the `admin` account when it is first created.
    pub bootstrap_admin_password: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "fallback-secret-key-change-in-production".to_string(),
            token_ttl: Duration::from_secs(3600),
            bootstrap_admin_password: "admin".to_string(),
        }
    }
}

/// Full daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the API server.
    pub bind: String,

    /// Directory holding the SQLite database.
    pub data_dir: PathBuf,

    pub auth: AuthConfig,

    pub readarr: ReadarrConfig,
}

impl Config {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("bookseerr.db")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5055".to_string(),
            data_dir: default_data_dir(),
            auth: AuthConfig::default(),
            readarr: ReadarrConfig::default(),
        }
    }
}

/// Platform data directory, or `./data` when none can be determined.
pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("org", "bookseerr", "bookseerr")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("data"))
}
