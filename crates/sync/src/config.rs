//! Client configuration loaded from environment variables.

use std::path::PathBuf;

/// Connection and storage settings for the sync client.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API (default: `http://localhost:3000`).
    pub api_base_url: String,
    /// URL of the persistent collaboration socket
    /// (default: `ws://localhost:3000/ws`).
    pub socket_url: String,
    /// Directory for the persisted local state
    /// (default: `.callsheet`).
    pub data_dir: PathBuf,
    /// Display name shown to other collaborators in lock messages
    /// (default: `Anonymous`).
    pub display_name: String,
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                   |
    /// |---------------------------|---------------------------|
    /// | `CALLSHEET_API_URL`       | `http://localhost:3000`   |
    /// | `CALLSHEET_SOCKET_URL`    | `ws://localhost:3000/ws`  |
    /// | `CALLSHEET_DATA_DIR`      | `.callsheet`              |
    /// | `CALLSHEET_DISPLAY_NAME`  | `Anonymous`               |
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_base_url = std::env::var("CALLSHEET_API_URL")
            .unwrap_or_else(|_| "http://localhost:3000".into());

        let socket_url = std::env::var("CALLSHEET_SOCKET_URL")
            .unwrap_or_else(|_| "ws://localhost:3000/ws".into());

        let data_dir: PathBuf = std::env::var("CALLSHEET_DATA_DIR")
            .unwrap_or_else(|_| ".callsheet".into())
            .into();

        let display_name = std::env::var("CALLSHEET_DISPLAY_NAME")
            .unwrap_or_else(|_| "Anonymous".into());

        Self {
            api_base_url,
            socket_url,
            data_dir,
            display_name,
        }
    }

    /// Path of the persisted state file inside the data directory.
    pub fn state_file_path(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }
}
