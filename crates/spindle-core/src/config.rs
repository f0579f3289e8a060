//! Configuration for the pool, the event bus and the transfer manager.
//!
//! Each struct has sensible defaults and can be overridden from `SPINDLE_*`
//! environment variables:
//!
//! | variable                   | field                          | default |
//! |----------------------------|--------------------------------|---------|
//! | `SPINDLE_WORKERS`          | `PoolConfig::workers`          | 4       |
//! | `SPINDLE_QUEUE_CAPACITY`   | `PoolConfig::queue_capacity`   | 100     |
//! | `SPINDLE_SUBMIT_POLICY`    | `PoolConfig::submit_policy`    | block   |
//! | `SPINDLE_BUS_CAPACITY`     | `BusConfig::capacity`          | 10      |
//! | `SPINDLE_LOCK_TIMEOUT_MS`  | `TransferConfig::lock_timeout_ms` | 1000 |
//! | `SPINDLE_HOLD_DELAY_MS`    | `TransferConfig::hold_delay_ms`   | 0    |

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What `submit` does when the queue is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitPolicy {
    /// Wait until a slot frees up (backpressure).
    #[default]
    Block,
    /// Return `PoolError::QueueFull` immediately.
    FailFast,
}

impl FromStr for SubmitPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block" => Ok(SubmitPolicy::Block),
            "fail_fast" | "fail-fast" | "failfast" => Ok(SubmitPolicy::FailFast),
            other => Err(ConfigError::InvalidValue {
                key: "SPINDLE_SUBMIT_POLICY",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of workers spawned by `start()`.
    pub workers: usize,
    /// Maximum number of queued (not yet dequeued) jobs.
    pub queue_capacity: usize,
    pub submit_policy: SubmitPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 100,
            submit_policy: SubmitPolicy::Block,
        }
    }
}

impl PoolConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_submit_policy(mut self, policy: SubmitPolicy) -> Self {
        self.submit_policy = policy;
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            workers: parse_or(&lookup, "SPINDLE_WORKERS", defaults.workers)?,
            queue_capacity: parse_or(&lookup, "SPINDLE_QUEUE_CAPACITY", defaults.queue_capacity)?,
            submit_policy: match lookup("SPINDLE_SUBMIT_POLICY") {
                Some(raw) => raw.parse()?,
                None => defaults.submit_policy,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Zero("workers"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Zero("queue_capacity"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Buffer size of each subscriber channel.
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { capacity: 10 }
    }
}

impl BusConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let capacity = parse_or(&lookup, "SPINDLE_BUS_CAPACITY", Self::default().capacity)?;
        if capacity == 0 {
            return Err(ConfigError::Zero("capacity"));
        }
        Ok(Self { capacity })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Upper bound for acquiring each resource lock.
    pub lock_timeout_ms: u64,
    /// Pause between the first and the second acquisition (simulated work).
    pub hold_delay_ms: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 1_000,
            hold_delay_ms: 0,
        }
    }
}

impl TransferConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn hold_delay(&self) -> Duration {
        Duration::from_millis(self.hold_delay_ms)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let lock_timeout_ms = parse_or(&lookup, "SPINDLE_LOCK_TIMEOUT_MS", defaults.lock_timeout_ms)?;
        if lock_timeout_ms == 0 {
            return Err(ConfigError::Zero("lock_timeout_ms"));
        }
        Ok(Self {
            lock_timeout_ms,
            hold_delay_ms: parse_or(&lookup, "SPINDLE_HOLD_DELAY_MS", defaults.hold_delay_ms)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key,
            value: raw,
        }),
        None => Ok(default),
    }
}
