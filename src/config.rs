//! Configuration System
//!
//! Runtime configuration for backend selection, per-backend credentials and
//! endpoints, scheduler timing, and logging. Supports a config file layered
//! with `EVERLOOP_`-prefixed environment variable overrides, plus validation
//! that collects every problem instead of stopping at the first.

use crate::backend::BackendKind;
use crate::error::GenerationError;
use crate::logging::LoggingConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EverloopConfig {
    /// Name of the backend used for clip generation. Resolved to one
    /// `BackendKind` at orchestrator construction, never per call.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Per-backend configuration, keyed by backend name.
    #[serde(default)]
    pub backends: HashMap<String, BackendConfig>,

    /// Continuity scheduler timing.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_backend() -> String {
    "kling".to_string()
}

impl Default for EverloopConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            backends: HashMap::new(),
            scheduler: SchedulerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration for a single generation backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Which task client implementation this entry drives.
    pub kind: BackendKind,

    /// Base URL override. Each kind has a documented default.
    pub base_url: Option<String>,

    /// Static API key (bearer/key auth backends).
    pub api_key: Option<String>,

    /// Access key for signed-token backends.
    pub access_key: Option<String>,

    /// Secret key for signed-token backends.
    pub secret_key: Option<String>,

    /// Model identifier sent on create, when the backend takes one.
    pub model: Option<String>,

    /// Delay between poll requests.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Overall task timeout. `None` uses the kind's default ceiling.
    pub timeout_secs: Option<u64>,

    /// Create-call attempt budget.
    #[serde(default = "default_max_create_attempts")]
    pub max_create_attempts: usize,
}

fn default_poll_interval_ms() -> u64 {
    3_000
}

fn default_max_create_attempts() -> usize {
    3
}

impl BackendConfig {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            base_url: None,
            api_key: None,
            access_key: None,
            secret_key: None,
            model: None,
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: None,
            max_create_attempts: default_max_create_attempts(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Overall task timeout, falling back to the kind's default ceiling.
    pub fn timeout(&self) -> Duration {
        match self.timeout_secs {
            Some(secs) => Duration::from_secs(secs),
            None => self.kind.default_timeout(),
        }
    }

    /// Validate credential material and timing for this backend kind.
    pub fn validate(&self) -> Result<(), String> {
        match self.kind {
            BackendKind::Kling => {
                if self.access_key.as_deref().unwrap_or("").is_empty()
                    || self.secret_key.as_deref().unwrap_or("").is_empty()
                {
                    return Err("kling requires access_key and secret_key".to_string());
                }
            }
            BackendKind::Luma | BackendKind::Fal => {
                if self.api_key.as_deref().unwrap_or("").is_empty() {
                    return Err(format!("{} requires api_key", self.kind.as_str()));
                }
            }
        }
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be greater than zero".to_string());
        }
        if self.max_create_attempts == 0 {
            return Err("max_create_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Continuity scheduler timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How far before the end of the active clip a swap is triggered.
    #[serde(default = "default_swap_threshold_ms")]
    pub swap_threshold_ms: u64,

    /// Bounded wait for the idle buffer to report ready before the swap
    /// proceeds best-effort.
    #[serde(default = "default_ready_wait_ms")]
    pub ready_wait_ms: u64,

    /// Short delay after starting the idle buffer so its first frame is
    /// rendered before visibility flips.
    #[serde(default = "default_visibility_delay_ms")]
    pub visibility_delay_ms: u64,
}

fn default_swap_threshold_ms() -> u64 {
    500
}

fn default_ready_wait_ms() -> u64 {
    3_000
}

fn default_visibility_delay_ms() -> u64 {
    50
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            swap_threshold_ms: default_swap_threshold_ms(),
            ready_wait_ms: default_ready_wait_ms(),
            visibility_delay_ms: default_visibility_delay_ms(),
        }
    }
}

impl SchedulerConfig {
    pub fn swap_threshold(&self) -> Duration {
        Duration::from_millis(self.swap_threshold_ms)
    }

    pub fn ready_wait(&self) -> Duration {
        Duration::from_millis(self.ready_wait_ms)
    }

    pub fn visibility_delay(&self) -> Duration {
        Duration::from_millis(self.visibility_delay_ms)
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone)]
pub enum ValidationError {
    Backend(String, String),
    Selection(String),
    Scheduler(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Backend(name, msg) => write!(f, "Backend '{}': {}", name, msg),
            ValidationError::Selection(msg) => write!(f, "Backend selection: {}", msg),
            ValidationError::Scheduler(msg) => write!(f, "Scheduler: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl EverloopConfig {
    /// Validate the entire configuration.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if !self.backends.contains_key(&self.backend) {
            errors.push(ValidationError::Selection(format!(
                "selected backend '{}' is not configured",
                self.backend
            )));
        }

        for (name, backend) in &self.backends {
            if let Err(e) = backend.validate() {
                errors.push(ValidationError::Backend(name.clone(), e));
            }
        }

        if self.scheduler.swap_threshold_ms == 0 {
            errors.push(ValidationError::Scheduler(
                "swap_threshold_ms must be greater than zero".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// The configuration entry for the selected backend.
    pub fn selected_backend(&self) -> Result<&BackendConfig, GenerationError> {
        self.backends.get(&self.backend).ok_or_else(|| {
            GenerationError::Config(format!("backend '{}' is not configured", self.backend))
        })
    }
}

/// Loads configuration from an optional file layered with environment
/// variable overrides (`EVERLOOP_BACKEND`, `EVERLOOP_SCHEDULER__SWAP_THRESHOLD_MS`, ...).
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(path: Option<&Path>) -> Result<EverloopConfig, GenerationError> {
        let mut builder = Config::builder().set_default("backend", default_backend())?;

        if let Some(path) = path {
            let path_str = path.to_str().ok_or_else(|| {
                GenerationError::Config(format!("config path is not valid UTF-8: {:?}", path))
            })?;
            builder = builder.add_source(File::with_name(path_str).required(true));
        }

        builder = builder.add_source(Environment::with_prefix("EVERLOOP").separator("__"));

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}
