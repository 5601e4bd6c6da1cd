//! Configuration for slidevault.
//!
//! Settings come from an optional TOML file with environment overrides
//! (a `.env` file is loaded by `main` before anything reads the
//! environment). The API token lives behind [`TokenProvider`] so nothing
//! in the pipeline reaches into ambient global state.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Environment variable holding the design API token.
pub const TOKEN_ENV_VAR: &str = "SLIDEVAULT_API_TOKEN";

/// Default base URL of the design API.
pub const DEFAULT_API_BASE_URL: &str = "https://api.designtool.example/v1/";

/// Export scales tried in order until one succeeds.
pub const DEFAULT_IMAGE_SCALES: [f64; 6] = [0.5, 0.25, 0.1, 0.05, 0.02, 0.01];

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_image_scales() -> Vec<f64> {
    DEFAULT_IMAGE_SCALES.to_vec()
}

fn default_image_format() -> String {
    "jpg".to_string()
}

fn default_call_interval_ms() -> u64 {
    500
}

fn default_min_score() -> u32 {
    2
}

fn default_dedup_threshold() -> f64 {
    0.7
}

/// Settings for the design API connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Token from the settings file; the env var wins when both are set.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
        }
    }
}

/// Settings for the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSettings {
    /// Degradation ladder for image exports.
    #[serde(default = "default_image_scales")]
    pub image_scales: Vec<f64>,
    #[serde(default = "default_image_format")]
    pub image_format: String,
    /// Minimum gap between external API calls.
    #[serde(default = "default_call_interval_ms")]
    pub call_interval_ms: u64,
    /// Minimum classifier score for a candidate to be ingested.
    #[serde(default = "default_min_score")]
    pub min_score: u32,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            image_scales: default_image_scales(),
            image_format: default_image_format(),
            call_interval_ms: default_call_interval_ms(),
            min_score: default_min_score(),
        }
    }
}

/// Settings for duplicate detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupSettings {
    #[serde(default = "default_dedup_threshold")]
    pub threshold: f64,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            threshold: default_dedup_threshold(),
        }
    }
}

/// Top-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub ingest: IngestSettings,
    #[serde(default)]
    pub dedup: DedupSettings,
}

impl Settings {
    /// Load settings from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let settings = toml::from_str(&raw)?;
        Ok(settings)
    }

    /// Write the current settings out as TOML.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Build a token provider from these settings: the env var takes
    /// precedence over the file token.
    pub fn token_provider(&self) -> TokenProvider {
        match &self.api.token {
            Some(token) => TokenProvider::with_fallback(TOKEN_ENV_VAR, token),
            None => TokenProvider::from_env(TOKEN_ENV_VAR),
        }
    }
}

/// Default location of the settings file within a data dir.
pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join("slidevault.toml")
}

/// Default location of the slide store within a data dir.
pub fn store_path(data_dir: &Path) -> PathBuf {
    data_dir.join("slides.json")
}

#[derive(Debug)]
struct TokenState {
    token: Option<String>,
    fetched_at: Option<DateTime<Utc>>,
}

/// Injected credential source for the design API.
///
/// Caches the token with a last-fetch timestamp; `invalidate` drops the
/// cache so the next `get` re-sources it (after the API rejects a stale
/// credential, for instance).
#[derive(Debug, Clone)]
pub struct TokenProvider {
    env_var: &'static str,
    fallback: Option<String>,
    state: Arc<RwLock<TokenState>>,
}

impl TokenProvider {
    fn empty(env_var: &'static str, fallback: Option<String>) -> Self {
        Self {
            env_var,
            fallback,
            state: Arc::new(RwLock::new(TokenState {
                token: None,
                fetched_at: None,
            })),
        }
    }

    /// Source the token from an environment variable.
    pub fn from_env(env_var: &'static str) -> Self {
        Self::empty(env_var, None)
    }

    /// Source from the environment, falling back to a configured value.
    pub fn with_fallback(env_var: &'static str, fallback: &str) -> Self {
        Self::empty(env_var, Some(fallback.to_string()))
    }

    /// A provider with a fixed token, for tests and one-off scripts.
    /// Ignores the environment entirely.
    pub fn new_static(token: &str) -> Self {
        let provider = Self::empty("", Some(token.to_string()));
        provider.get();
        provider
    }

    /// Return the token, sourcing and caching it on first use.
    pub fn get(&self) -> Option<String> {
        {
            let state = self.state.read().expect("token lock poisoned");
            if let Some(token) = &state.token {
                return Some(token.clone());
            }
        }

        let from_env = if self.env_var.is_empty() {
            None
        } else {
            std::env::var(self.env_var).ok()
        };
        let sourced = from_env
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.fallback.clone());

        let mut state = self.state.write().expect("token lock poisoned");
        state.fetched_at = Some(Utc::now());
        state.token = sourced.clone();
        sourced
    }

    /// Drop the cached token so the next `get` re-sources it.
    pub fn invalidate(&self) {
        let mut state = self.state.write().expect("token lock poisoned");
        state.token = None;
    }

    /// When the token was last sourced, if ever.
    pub fn last_fetched(&self) -> Option<DateTime<Utc>> {
        self.state.read().expect("token lock poisoned").fetched_at
    }
}
