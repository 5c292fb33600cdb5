//! Configuration types for remote-dl

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::error::{Error, Result};

/// Settings describing the remote download service
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Save root the service uses for packages nobody redirected (default: "/root/Downloads")
    #[serde(default = "default_root")]
    pub default_root: PathBuf,

    /// Web console where users can edit pending packages
    #[serde(default = "default_web_console_url")]
    pub web_console_url: String,

    /// Container format used for local container uploads (default: "DLC")
    #[serde(default = "default_container_kind")]
    pub container_kind: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            default_root: default_root(),
            web_console_url: default_web_console_url(),
            container_kind: default_container_kind(),
        }
    }
}

/// Timeouts, budgets and poll intervals for the job pipeline
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Timeout for the session liveness probe (default: 10 seconds)
    #[serde(default = "default_version_timeout", with = "duration_serde")]
    pub version_timeout: Duration,

    /// Pause after submitting links before checking resolution (default: 500ms)
    #[serde(default = "default_submit_settle", with = "duration_ms_serde")]
    pub submit_settle: Duration,

    /// Interval between "still resolving" checks (default: 250ms)
    #[serde(default = "default_poll_interval", with = "duration_ms_serde")]
    pub resolve_poll_interval: Duration,

    /// Maximum number of "still resolving" checks before giving up (default: 240)
    #[serde(default = "default_resolve_max_polls")]
    pub resolve_max_polls: u32,

    /// Wall-clock budget for packages to come online (default: 60 seconds)
    #[serde(default = "default_collection_budget", with = "duration_serde")]
    pub collection_budget: Duration,

    /// Interval between collection polls (default: 250ms)
    #[serde(default = "default_poll_interval", with = "duration_ms_serde")]
    pub collection_poll_interval: Duration,

    /// Pause after promoting packages before re-resolving them (default: 1 second)
    #[serde(default = "default_activation_settle", with = "duration_ms_serde")]
    pub activation_settle: Duration,

    /// How long the interactive selection prompt waits for the user (default: 300 seconds)
    #[serde(default = "default_selection_timeout", with = "duration_serde")]
    pub selection_timeout: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            version_timeout: default_version_timeout(),
            submit_settle: default_submit_settle(),
            resolve_poll_interval: default_poll_interval(),
            resolve_max_polls: default_resolve_max_polls(),
            collection_budget: default_collection_budget(),
            collection_poll_interval: default_poll_interval(),
            activation_settle: default_activation_settle(),
            selection_timeout: default_selection_timeout(),
        }
    }
}

/// Retry behavior for calls against the remote service
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_ms_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 10 seconds)
    #[serde(default = "default_max_delay", with = "duration_ms_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,

    /// Per-call timeout (None = wait as long as the call takes)
    #[serde(default, with = "optional_duration_serde")]
    pub call_timeout: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
            call_timeout: None,
        }
    }
}

/// Download queue settings for the built-in admission controller
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of concurrently running downloads (None = unlimited)
    #[serde(default)]
    pub max_concurrent_downloads: Option<usize>,
}

/// Main configuration for the [`Orchestrator`](crate::Orchestrator)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote service settings
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Pipeline timeouts and poll intervals
    #[serde(default)]
    pub timing: TimingConfig,

    /// Retry behavior for remote calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Download queue limits
    #[serde(default)]
    pub queue: QueueConfig,
}

impl Config {
    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.remote.default_root.is_absolute() {
            return Err(Error::Config {
                message: format!(
                    "default root must be absolute, got '{}'",
                    self.remote.default_root.display()
                ),
                key: Some("remote.default_root".to_string()),
            });
        }
        if self.timing.collection_budget.is_zero() {
            return Err(Error::Config {
                message: "collection budget must be greater than zero".to_string(),
                key: Some("timing.collection_budget".to_string()),
            });
        }
        if self.timing.resolve_max_polls == 0 {
            return Err(Error::Config {
                message: "resolve_max_polls must be at least 1".to_string(),
                key: Some("timing.resolve_max_polls".to_string()),
            });
        }
        if self.queue.max_concurrent_downloads == Some(0) {
            return Err(Error::Config {
                message: "max_concurrent_downloads must be at least 1 when set".to_string(),
                key: Some("queue.max_concurrent_downloads".to_string()),
            });
        }
        Ok(())
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("/root/Downloads")
}

fn default_web_console_url() -> String {
    "https://my.jdownloader.org".to_string()
}

fn default_container_kind() -> String {
    "DLC".to_string()
}

fn default_version_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_submit_settle() -> Duration {
    Duration::from_millis(500)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_resolve_max_polls() -> u32 {
    240
}

fn default_collection_budget() -> Duration {
    Duration::from_secs(60)
}

fn default_activation_settle() -> Duration {
    Duration::from_secs(1)
}

fn default_selection_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// Optional Duration serialization helper (milliseconds)
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
