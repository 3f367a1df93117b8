use std::str::FromStr;
use std::time::Duration;

use shuttle_runtime::SecretStore;

pub const DEFAULT_SHARD_COUNT: u32 = 10;
pub const SNAPSHOT_KEY: &str = "candidates.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("{key} must be at least {min}")]
    TooSmall { key: &'static str, min: u64 },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub shard_count: u32,
    pub snapshot_interval: Duration,
    pub snapshot_max_age: Duration,
    pub read_cache_ttl: Duration,
    pub store_timeout: Duration,
    pub queue_capacity: usize,
    pub visibility_timeout: Duration,
    pub max_receive_count: u32,
    pub consumer_workers: usize,
    pub batch_size: usize,
    pub allowed_origin: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
            snapshot_interval: Duration::from_secs(5),
            snapshot_max_age: Duration::from_secs(5),
            read_cache_ttl: Duration::from_millis(5000),
            store_timeout: Duration::from_millis(2000),
            queue_capacity: 100_000,
            visibility_timeout: Duration::from_secs(30),
            max_receive_count: 5,
            consumer_workers: 4,
            batch_size: 10,
            allowed_origin: None,
        }
    }
}

fn parse<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn at_least(key: &'static str, value: u64, min: u64) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::TooSmall { key, min });
    }
    Ok(())
}

impl Config {
    pub fn from_secrets(secrets: &SecretStore) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| secrets.get(key))
    }

    /// Builds the config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Config::default();
        let secs = |key: &'static str, default: Duration| {
            parse(key, lookup(key), default.as_secs()).map(Duration::from_secs)
        };
        let millis = |key: &'static str, default: Duration| {
            parse(key, lookup(key), default.as_millis() as u64).map(Duration::from_millis)
        };

        let config = Config {
            shard_count: parse("SHARD_COUNT", lookup("SHARD_COUNT"), d.shard_count)?,
            snapshot_interval: secs("SNAPSHOT_INTERVAL_SECS", d.snapshot_interval)?,
            snapshot_max_age: secs("SNAPSHOT_MAX_AGE_SECS", d.snapshot_max_age)?,
            read_cache_ttl: millis("READ_CACHE_TTL_MS", d.read_cache_ttl)?,
            store_timeout: millis("STORE_TIMEOUT_MS", d.store_timeout)?,
            queue_capacity: parse("QUEUE_CAPACITY", lookup("QUEUE_CAPACITY"), d.queue_capacity)?,
            visibility_timeout: secs("VISIBILITY_TIMEOUT_SECS", d.visibility_timeout)?,
            max_receive_count: parse("MAX_RECEIVE_COUNT", lookup("MAX_RECEIVE_COUNT"), d.max_receive_count)?,
            consumer_workers: parse("CONSUMER_WORKERS", lookup("CONSUMER_WORKERS"), d.consumer_workers)?,
            batch_size: parse("BATCH_SIZE", lookup("BATCH_SIZE"), d.batch_size)?,
            allowed_origin: lookup("ALLOWED_ORIGIN").filter(|o| !o.trim().is_empty()),
        };

        at_least("SHARD_COUNT", u64::from(config.shard_count), 1)?;
        at_least("SNAPSHOT_INTERVAL_SECS", config.snapshot_interval.as_secs(), 1)?;
        at_least("STORE_TIMEOUT_MS", config.store_timeout.as_millis() as u64, 1)?;
        at_least("QUEUE_CAPACITY", config.queue_capacity as u64, 1)?;
        at_least("MAX_RECEIVE_COUNT", u64::from(config.max_receive_count), 1)?;
        at_least("BATCH_SIZE", config.batch_size as u64, 1)?;

        Ok(config)
    }
}
