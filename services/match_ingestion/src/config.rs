use crate::kickoff::KickoffNormalizer;
use crate::error::KickoffError;
use crate::queue::QueueSettings;
use crate::retry::RetryPolicy;
use crate::worker::WorkerSettings;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/league".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub default_source: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            queue_capacity: 256,
            default_source: "feed".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KickoffConfig {
    pub timezone: String,
}

impl Default for KickoffConfig {
    fn default() -> Self {
        Self {
            timezone: "America/New_York".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    pub resolution_max_attempts: u32,
    pub store_max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            resolution_max_attempts: 3,
            store_max_attempts: 5,
            base_delay_ms: 200,
            multiplier: 2.0,
            max_delay_ms: 10_000,
            jitter_ms: 100,
        }
    }
}

impl RetryConfig {
    fn policy(&self, max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            multiplier: self.multiplier,
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: Duration::from_millis(self.jitter_ms),
        }
    }

    pub fn resolution_policy(&self) -> RetryPolicy {
        self.policy(self.resolution_max_attempts)
    }

    pub fn store_policy(&self) -> RetryPolicy {
        self.policy(self.store_max_attempts)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IngestConfig {
    pub database: DatabaseConfig,
    pub worker: WorkerConfig,
    pub kickoff: KickoffConfig,
    pub retry: RetryConfig,
}

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl IngestConfig {
    /// Reads overrides from the environment. Unset or unparseable values keep
    /// their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("DATABASE_URL") {
            config.database.url = url;
        }
        if let Some(max) = parsed("DATABASE_MAX_CONNECTIONS") {
            config.database.max_connections = max;
        }
        if let Some(workers) = parsed::<usize>("INGEST_WORKERS") {
            config.worker.workers = workers.max(1);
        }
        if let Some(capacity) = parsed::<usize>("INGEST_QUEUE_CAPACITY") {
            config.worker.queue_capacity = capacity.max(1);
        }
        if let Ok(source) = env::var("INGEST_SOURCE") {
            if !source.trim().is_empty() {
                config.worker.default_source = source.trim().to_string();
            }
        }
        if let Ok(tz) = env::var("KICKOFF_TIMEZONE") {
            config.kickoff.timezone = tz.trim().to_string();
        }
        if let Some(n) = parsed("RESOLUTION_MAX_ATTEMPTS") {
            config.retry.resolution_max_attempts = n;
        }
        if let Some(n) = parsed("STORE_MAX_ATTEMPTS") {
            config.retry.store_max_attempts = n;
        }
        if let Some(ms) = parsed("RETRY_BASE_DELAY_MS") {
            config.retry.base_delay_ms = ms;
        }
        if let Some(m) = parsed::<f64>("RETRY_MULTIPLIER") {
            if m.is_finite() && m >= 1.0 {
                config.retry.multiplier = m;
            }
        }
        if let Some(ms) = parsed("RETRY_MAX_DELAY_MS") {
            config.retry.max_delay_ms = ms;
        }
        if let Some(ms) = parsed("RETRY_JITTER_MS") {
            config.retry.jitter_ms = ms;
        }

        config
    }

    pub fn normalizer(&self) -> Result<KickoffNormalizer, KickoffError> {
        KickoffNormalizer::from_name(&self.kickoff.timezone)
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            default_source: self.worker.default_source.clone(),
            resolution_retry: self.retry.resolution_policy(),
            store_retry: self.retry.store_policy(),
        }
    }

    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            workers: self.worker.workers,
            capacity: self.worker.queue_capacity,
        }
    }
}
