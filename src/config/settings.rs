//! Configuration settings for ImageFerry
//!
//! Defines the CLI arguments and the endpoint configuration file loaded
//! at startup.

use crate::error::{FerryError, Result};
use chrono::{DateTime, TimeZone, Utc};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// ImageFerry - migrate images and metadata between media stores
#[derive(Parser, Debug, Clone)]
#[command(name = "imageferry")]
#[command(author = "ImageFerry Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Parallel migration of images and metadata between media stores")]
#[command(long_about = r#"
ImageFerry copies every image of a source media store to a destination
store, replicates each image's metadata, and skips images the destination
already has. Work is spread over a fixed pool of parallel workers with a
bounded number of transfers in flight.

Store endpoints and credentials are read from a JSON configuration file;
copy config.json.dist to config.json and adjust the values.

Examples:
  imageferry                          # migrate using ./config.json
  imageferry --verbose                # one line per completed image
  imageferry --since 1714521600       # only images added after a timestamp
  imageferry --workers 16             # fixed worker pool size
"#)]
pub struct CliArgs {
    /// Path to the endpoint configuration file
    #[arg(short = 'c', long, default_value = "config.json", value_name = "PATH")]
    pub config: PathBuf,

    /// Print a line for every completed item
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress progress output entirely
    #[arg(short, long)]
    pub quiet: bool,

    /// Only migrate images added at or after this unix timestamp
    #[arg(long, value_name = "UNIX_TIMESTAMP")]
    pub since: Option<i64>,

    /// Number of parallel workers (0 = one per CPU)
    #[arg(short = 'w', long, default_value = "0", value_name = "NUM")]
    pub workers: usize,
}

impl CliArgs {
    /// The `--since` timestamp as a UTC datetime, if valid
    pub fn since_datetime(&self) -> Option<DateTime<Utc>> {
        self.since.and_then(|ts| Utc.timestamp_opt(ts, 0).single())
    }
}

/// One media store endpoint with its credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreEndpoint {
    /// Base URL of the store
    pub host: String,
    /// Public API key
    pub public_key: String,
    /// Private API key
    pub private_key: String,
    /// User whose images are addressed; defaults to the public key
    #[serde(default)]
    pub user: Option<String>,
}

impl StoreEndpoint {
    /// User whose images are addressed
    pub fn user(&self) -> &str {
        self.user.as_deref().unwrap_or(&self.public_key)
    }
}

/// Endpoint configuration for one migration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Source store to enumerate and copy from
    pub from: StoreEndpoint,
    /// Destination store to copy into
    pub to: StoreEndpoint,
}

impl MigrationConfig {
    /// Load and validate the configuration file
    ///
    /// A missing file is a distinct, actionable startup error pointing at
    /// the shipped `config.json.dist` template.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                FerryError::config(format!(
                    "'{}' not found - copy config.json.dist to config.json and adjust values",
                    path.display()
                ))
            } else {
                FerryError::io(path, err)
            }
        })?;

        let config: Self = serde_json::from_str(&raw).map_err(|err| {
            FerryError::config(format!("'{}' is not valid: {}", path.display(), err))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate endpoint fields
    pub fn validate(&self) -> Result<()> {
        for (side, endpoint) in [("from", &self.from), ("to", &self.to)] {
            if endpoint.host.is_empty() {
                return Err(FerryError::config(format!("'{}' host is required", side)));
            }
            if !endpoint.host.starts_with("http://") && !endpoint.host.starts_with("https://") {
                return Err(FerryError::config(format!(
                    "'{}' host must be an http(s) URL, got '{}'",
                    side, endpoint.host
                )));
            }
            if endpoint.public_key.is_empty() || endpoint.private_key.is_empty() {
                return Err(FerryError::config(format!(
                    "'{}' requires publicKey and privateKey",
                    side
                )));
            }
        }

        if self.from.host == self.to.host && self.from.user() == self.to.user() {
            return Err(FerryError::config(
                "source and destination are the same store and user",
            ));
        }

        Ok(())
    }
}
