use std::{env, path::PathBuf};
use thiserror::Error;

const DEFAULT_CHAT_PORT: u16 = 8001;
const DEFAULT_NOTEBOOK_PORT: u16 = 8000;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid port in {name}: {value:?}")]
    InvalidPort { name: String, value: String },
    #[error("Invalid byte count in {name}: {value:?}")]
    InvalidSize { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// `None` leaves the chat relay running but unavailable.
    pub groq_api_key: Option<String>,
    pub groq_base_url: String,
    pub bind_addr: String,
    pub chat_port: u16,
    pub notebook_port: u16,
    pub frontend_dir: PathBuf,
    pub db_file: PathBuf,
    pub uploads_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let frontend_dir =
            PathBuf::from(lookup("METRODOC_FRONTEND_DIR").unwrap_or_else(|| "frontend".into()));
        let db_file = lookup("METRODOC_DB_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| frontend_dir.join("notebooks.json"));

        Ok(AppConfig {
            groq_api_key: lookup("GROQ_API_KEY").filter(|key| !key.trim().is_empty()),
            groq_base_url: lookup("GROQ_BASE_URL")
                .unwrap_or_else(|| groq_api::API_BASE_URL.to_string()),
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".into()),
            chat_port: read_port(&lookup, "PORT", DEFAULT_CHAT_PORT)?,
            notebook_port: read_port(&lookup, "NOTEBOOK_PORT", DEFAULT_NOTEBOOK_PORT)?,
            uploads_dir: PathBuf::from(
                lookup("METRODOC_UPLOADS_DIR").unwrap_or_else(|| "uploads".into()),
            ),
            max_upload_bytes: read_size(
                &lookup,
                "METRODOC_MAX_UPLOAD_BYTES",
                DEFAULT_MAX_UPLOAD_BYTES,
            )?,
            frontend_dir,
            db_file,
        })
    }
}

fn read_port(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u16,
) -> Result<u16, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidPort {
            name: name.to_string(),
            value,
        }),
    }
}

fn read_size(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: usize,
) -> Result<usize, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => match value.trim().parse() {
            Ok(size) if size > 0 => Ok(size),
            _ => Err(ConfigError::InvalidSize {
                name: name.to_string(),
                value,
            }),
        },
    }
}
