//! Configuration module

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_MODELS_DIR: &str = "models";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding `<model_type>_model.json` artifacts
    pub models_dir: PathBuf,

    /// Number of CPU worker threads
    pub worker_threads: usize,

    /// Deadline for one `predict_all` request; `None` waits indefinitely
    pub request_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            worker_threads: num_cpus::get().max(1),
            request_timeout: Some(Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS)),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            models_dir: env::var("CHILI_MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.models_dir),

            worker_threads: env::var("CHILI_WORKER_THREADS")
                .ok()
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.worker_threads),

            request_timeout: match env::var("CHILI_REQUEST_TIMEOUT_MS").ok().and_then(|ms| ms.parse::<u64>().ok()) {
                Some(0) => None,
                Some(ms) => Some(Duration::from_millis(ms)),
                None => defaults.request_timeout,
            },
        }
    }

    pub fn with_models_dir(mut self, models_dir: impl Into<PathBuf>) -> Self {
        self.models_dir = models_dir.into();
        self
    }

    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads.max(1);
        self
    }
}
