use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SuiteError};

pub const DEFAULT_NER_MODEL: &str = "dbmdz/bert-large-cased-finetuned-conll03-english";
pub const DEFAULT_FILL_MASK_MODEL: &str = "bert-base-uncased";
pub const DEFAULT_MASK_TOKEN: &str = "[MASK]";
pub const DEFAULT_LOG_FILTER: &str = "nlp_suite=info";

/// Main configuration structure loaded from nlp_suite.toml and environment variables
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub models: ModelsConfig,
    pub fill_mask: FillMaskConfig,
    /// Runtime configuration loaded from environment variables
    #[serde(skip)]
    pub runtime: RuntimeConfig,
}

/// Which checkpoints back the pipelines and where their files live
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub ner_model: String,
    pub fill_mask_model: String,
    /// Directory holding pre-fetched checkpoints, one sub-directory per repo id
    /// with `/` replaced by `--`. Repos not found here are fetched from the hub.
    pub local_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FillMaskConfig {
    pub top_k: usize,
    pub mask_token: String,
}

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub log_filter: String,
    pub log_file: Option<PathBuf>,
    pub use_metal: bool,
    pub skip_models: bool,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            ner_model: DEFAULT_NER_MODEL.to_string(),
            fill_mask_model: DEFAULT_FILL_MASK_MODEL.to_string(),
            local_dir: None,
        }
    }
}

impl Default for FillMaskConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            mask_token: DEFAULT_MASK_TOKEN.to_string(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_file: None,
            use_metal: true,
            skip_models: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            models: ModelsConfig::default(),
            fill_mask: FillMaskConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

fn is_true(v: &str) -> bool {
    v == "1" || v.eq_ignore_ascii_case("true")
}

impl RuntimeConfig {
    /// Load runtime configuration from environment variables
    pub fn load_from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(filter) = std::env::var("RUST_LOG")
            && !filter.trim().is_empty()
        {
            cfg.log_filter = filter;
        }
        cfg.log_file = std::env::var("NLPS_LOG_FILE")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        if let Ok(v) = std::env::var("NLPS_USE_METAL") {
            cfg.use_metal = v != "false" && v != "0";
        }
        cfg.skip_models = std::env::var("NLPS_SKIP_MODELS").is_ok_and(|v| is_true(&v));
        cfg
    }

    /// Log file used while the terminal UI owns the screen
    pub fn log_path(&self) -> PathBuf {
        self.log_file.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("nlp-suite")
                .join("nlp-suite.log")
        })
    }
}

impl Config {
    /// Load `.env` into the process environment: NLPS_ENV_FILE if set, else ./.env.
    /// Variables already set are kept.
    pub fn load_env_file() {
        if let Ok(env_path) = std::env::var("NLPS_ENV_FILE") {
            let _ = dotenvy::from_path(env_path);
        } else {
            let _ = dotenvy::from_path(".env");
        }
    }

    /// Load configuration from TOML file and environment variables.
    /// `path` wins over NLPS_CONFIG, which wins over "nlp_suite.toml".
    pub fn load_with(path: Option<&Path>) -> Result<Self> {
        Self::load_env_file();

        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => PathBuf::from(
                std::env::var("NLPS_CONFIG").unwrap_or_else(|_| "nlp_suite.toml".to_string()),
            ),
        };
        Self::load_from(&config_path)
    }

    /// Load from an explicit path, then apply environment overrides.
    /// A missing file yields defaults; an unreadable or malformed one is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml_str(&content)?
        } else {
            tracing::warn!("Config file {} not found, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides();
        config.runtime = RuntimeConfig::load_from_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(model) = std::env::var("NLPS_NER_MODEL") {
            tracing::debug!("NLPS_NER_MODEL env override applied");
            self.models.ner_model = model;
        }
        if let Ok(model) = std::env::var("NLPS_FILL_MASK_MODEL") {
            tracing::debug!("NLPS_FILL_MASK_MODEL env override applied");
            self.models.fill_mask_model = model;
        }
        if let Ok(dir) = std::env::var("NLPS_MODEL_DIR") {
            self.models.local_dir = Some(PathBuf::from(dir));
        }
        if let Some(top_k) = std::env::var("NLPS_TOP_K")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            self.fill_mask.top_k = top_k;
        }
        if let Ok(token) = std::env::var("NLPS_MASK_TOKEN") {
            self.fill_mask.mask_token = token;
        }
    }

    /// Validate the configuration, clamping soft limits
    pub fn validate(&mut self) -> Result<()> {
        if self.models.ner_model.trim().is_empty() {
            return Err(SuiteError::Config {
                message: "models.ner_model must not be empty".into(),
            });
        }
        if self.models.fill_mask_model.trim().is_empty() {
            return Err(SuiteError::Config {
                message: "models.fill_mask_model must not be empty".into(),
            });
        }
        if self.fill_mask.mask_token.trim().is_empty() {
            return Err(SuiteError::Config {
                message: "fill_mask.mask_token must not be empty".into(),
            });
        }
        if !(1..=50).contains(&self.fill_mask.top_k) {
            let clamped = self.fill_mask.top_k.clamp(1, 50);
            tracing::warn!(
                "fill_mask.top_k {} outside 1..=50, clamping to {}",
                self.fill_mask.top_k,
                clamped
            );
            self.fill_mask.top_k = clamped;
        }
        Ok(())
    }
}
