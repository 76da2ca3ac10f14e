//! Application configuration management.
//!
//! Configuration is read from environment variables (optionally seeded from a
//! `.env` file) and deserialized with `envy` into a type-safe struct.

use serde::Deserialize;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (optional): PostgreSQL connection string. When absent the
///   JSON document store at `KEY_STORE_PATH` is used instead.
/// - `KEY_STORE_PATH` (optional): Document path, defaults to `keys.json`
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `MAX_DB_CONNECTIONS` (optional): Pool size, defaults to 5
/// - `ADMIN_TOKEN` (optional): Bearer token required on `/keys` routes
/// - `KEY_PREFIX` (optional): Prefix for generated key values, defaults to `KEY`
/// - `LOG_JSON` (optional): Emit JSON log lines, defaults to false
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_key_store_path")]
    pub key_store_path: PathBuf,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_db_connections")]
    pub max_db_connections: u32,

    #[serde(default)]
    pub admin_token: Option<String>,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    #[serde(default)]
    pub log_json: bool,
}

fn default_key_store_path() -> PathBuf {
    PathBuf::from("keys.json")
}

fn default_port() -> u16 {
    3000
}

fn default_max_db_connections() -> u32 {
    5
}

fn default_key_prefix() -> String {
    "KEY".to_string()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Loads `.env` first if present, then reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed into its expected type.
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        envy::from_env::<Config>()
    }
}
