//! Runtime configuration, resolved once at startup from the environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which storage backend to activate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageDriver {
    Memory,
    Disk,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active storage backend.
    pub storage_driver: StorageDriver,
    /// Blob directory for the disk backend.
    pub disk_path: PathBuf,
    /// Number of conversion tasks allowed to run concurrently.
    pub concurrency: usize,
    /// Per-client submissions allowed per hour window.
    pub rate_limit_per_hour: u32,
    /// Maximum accepted upload size in bytes.
    pub upload_max_bytes: usize,
    /// Age after which stored blobs are garbage collected.
    #[serde(with = "duration_secs")]
    pub auto_delete: Duration,
    /// How often the garbage collector sweeps.
    #[serde(with = "duration_secs")]
    pub gc_interval: Duration,
    /// Wall-clock bound on a single external converter invocation.
    #[serde(with = "duration_secs")]
    pub converter_timeout: Duration,
    /// How long a job's progress channel stays open after a terminal event.
    #[serde(with = "duration_secs")]
    pub channel_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_driver: StorageDriver::Memory,
            disk_path: PathBuf::from(".data/storage"),
            concurrency: 2,
            rate_limit_per_hour: 60,
            upload_max_bytes: 2 * 1024 * 1024 * 1024,
            auto_delete: Duration::from_secs(30 * 60),
            gc_interval: Duration::from_secs(60),
            converter_timeout: Duration::from_secs(60),
            channel_grace: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Builds a config from environment variables, falling back to defaults
    /// for unset or malformed values (with a warning for the latter).
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(driver) = read_env("STORAGE_DRIVER") {
            match driver.as_str() {
                "memory" => config.storage_driver = StorageDriver::Memory,
                "disk" => config.storage_driver = StorageDriver::Disk,
                "s3" => config.storage_driver = StorageDriver::S3,
                other => log::warn!("Unknown STORAGE_DRIVER '{}', using memory", other),
            }
        }
        if let Some(path) = read_env("DISK_STORAGE_PATH") {
            config.disk_path = PathBuf::from(path);
        }
        if let Some(n) = parse_env::<usize>("CONVERT_CONCURRENCY") {
            if n > 0 {
                config.concurrency = n;
            } else {
                log::warn!("CONVERT_CONCURRENCY must be > 0, keeping {}", config.concurrency);
            }
        }
        if let Some(n) = parse_env::<u32>("RATE_LIMIT_PER_HOUR") {
            config.rate_limit_per_hour = n;
        }
        if let Some(n) = parse_env::<usize>("UPLOAD_MAX_BYTES") {
            config.upload_max_bytes = n;
        }
        if let Some(minutes) = parse_env::<u64>("AUTO_DELETE_MINUTES") {
            config.auto_delete = Duration::from_secs(minutes * 60);
        }
        if let Some(secs) = parse_env::<u64>("CONVERTER_TIMEOUT_SECS") {
            config.converter_timeout = Duration::from_secs(secs);
        }

        config
    }
}

fn read_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = read_env(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring malformed {}='{}'", key, raw);
            None
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
