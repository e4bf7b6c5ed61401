//! Runtime settings
//!
//! Settings are resolved in three layers, later layers winning:
//! 1. Built-in defaults
//! 2. Optional TOML file (~/.local/share/auditor/config.toml)
//! 3. Environment variables
//!
//! ```toml
//! [ai]
//! backend = "openai"          # openai | ollama | mock
//! base_url = "https://api.openai.com"
//! model = "gpt-4o-mini"
//! timeout_secs = 120
//!
//! [ollama]
//! host = "http://localhost:11434"
//! model = "llama3.2"
//!
//! [storage]
//! uploads_dir = "/var/lib/auditor/uploads"
//! max_upload_mb = 25
//!
//! [scheduler]
//! audit_interval_hours = 24
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::storage::default_uploads_dir;

/// Default OpenAI API base URL
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Default OpenAI model
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Default Ollama model
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";

/// Request timeout for language-model calls
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 120;

/// Maximum accepted upload size (25 MB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Language-model backend settings
#[derive(Debug, Clone)]
pub struct AiSettings {
    /// Backend name (openai, ollama, mock)
    pub backend: String,
    /// Explicit OpenAI-compatible base URL, if configured
    pub openai_base_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub ollama_host: Option<String>,
    pub ollama_model: String,
    pub timeout: Duration,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            backend: "openai".to_string(),
            openai_base_url: None,
            openai_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            ollama_host: None,
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_AI_TIMEOUT_SECS),
        }
    }
}

/// Upload storage settings
#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub uploads_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            uploads_dir: default_uploads_dir(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// All runtime settings
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub ai: AiSettings,
    pub storage: StorageSettings,
    /// Hours between scheduled audit runs (None = disabled)
    pub audit_interval_hours: Option<u64>,
    /// Passphrase for database encryption
    pub db_key: Option<String>,
}

impl Settings {
    /// Load settings from the default file location and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path().as_deref())
    }

    /// Load settings from a specific file (if it exists) and the environment
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(path) = path {
            if path.exists() {
                let content = fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                settings.apply_toml(&content)?;
                debug!("Loaded settings from {}", path.display());
            }
        }

        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Settings from defaults and the environment only
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        settings.apply_env(|key| std::env::var(key).ok());
        settings
    }

    /// Overlay values from a TOML document
    pub fn apply_toml(&mut self, content: &str) -> Result<()> {
        let raw: RawSettings = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid settings TOML: {}", e)))?;

        if let Some(ai) = raw.ai {
            if let Some(backend) = ai.backend {
                self.ai.backend = backend;
            }
            if ai.base_url.is_some() {
                self.ai.openai_base_url = ai.base_url;
            }
            if ai.api_key.is_some() {
                self.ai.openai_api_key = ai.api_key;
            }
            if let Some(model) = ai.model {
                self.ai.openai_model = model;
            }
            if let Some(secs) = ai.timeout_secs {
                self.ai.timeout = Duration::from_secs(secs);
            }
        }

        if let Some(ollama) = raw.ollama {
            if ollama.host.is_some() {
                self.ai.ollama_host = ollama.host;
            }
            if let Some(model) = ollama.model {
                self.ai.ollama_model = model;
            }
        }

        if let Some(storage) = raw.storage {
            if let Some(dir) = storage.uploads_dir {
                self.storage.uploads_dir = dir;
            }
            if let Some(mb) = storage.max_upload_mb {
                self.storage.max_upload_bytes = mb * 1024 * 1024;
            }
        }

        if let Some(scheduler) = raw.scheduler {
            self.audit_interval_hours = scheduler.audit_interval_hours.filter(|h| *h > 0);
        }

        Ok(())
    }

    /// Overlay values from environment variables
    ///
    /// Takes a lookup function so tests don't have to mutate the process env.
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(backend) = non_empty("AI_BACKEND") {
            self.ai.backend = backend;
        }
        if let Some(url) = non_empty("OPENAI_BASE_URL") {
            self.ai.openai_base_url = Some(url);
        }
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.ai.openai_api_key = Some(key);
        }
        if let Some(model) = non_empty("OPENAI_MODEL") {
            self.ai.openai_model = model;
        }
        if let Some(host) = non_empty("OLLAMA_HOST") {
            self.ai.ollama_host = Some(host);
        }
        if let Some(model) = non_empty("OLLAMA_MODEL") {
            self.ai.ollama_model = model;
        }
        if let Some(dir) = non_empty("AUDITOR_UPLOADS_DIR") {
            self.storage.uploads_dir = PathBuf::from(dir);
        }
        if let Some(hours) = non_empty("AUDITOR_AUDIT_SCHEDULE") {
            match hours.trim().parse::<u64>() {
                Ok(0) => self.audit_interval_hours = None,
                Ok(h) => self.audit_interval_hours = Some(h),
                Err(_) => tracing::warn!(
                    value = %hours,
                    "Ignoring invalid AUDITOR_AUDIT_SCHEDULE (expected hours)"
                ),
            }
        }
        if let Some(key) = non_empty("AUDITOR_DB_KEY") {
            self.db_key = Some(key);
        }
    }

    /// Effective OpenAI-compatible base URL
    pub fn openai_base_url(&self) -> &str {
        self.ai
            .openai_base_url
            .as_deref()
            .unwrap_or(DEFAULT_OPENAI_BASE_URL)
    }
}

/// Default settings file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("auditor").join("config.toml"))
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    ai: Option<RawAi>,
    ollama: Option<RawOllama>,
    storage: Option<RawStorage>,
    scheduler: Option<RawScheduler>,
}

#[derive(Debug, Deserialize)]
struct RawAi {
    backend: Option<String>,
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawOllama {
    host: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStorage {
    uploads_dir: Option<PathBuf>,
    max_upload_mb: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawScheduler {
    audit_interval_hours: Option<u64>,
}
