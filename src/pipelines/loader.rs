use anyhow::{Context, Result};
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use hf_hub::{Repo, RepoType, api::sync::Api};
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

/// The three files a BERT checkpoint needs
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelFiles {
    /// Resolve `repo_id` from `local_dir` when a copy exists there, else from the hub.
    pub fn resolve(repo_id: &str, local_dir: Option<&Path>) -> Result<Self> {
        if let Some(dir) = local_dir {
            let candidate = dir.join(local_dir_name(repo_id));
            if candidate.is_dir() {
                tracing::debug!("Using local checkpoint at {}", candidate.display());
                return Self::from_dir(&candidate);
            }
        }
        Self::from_hub(repo_id)
    }

    pub fn from_dir(dir: &Path) -> Result<Self> {
        let config = dir.join("config.json");
        let tokenizer = dir.join("tokenizer.json");
        let safetensors = dir.join("model.safetensors");
        let weights = if safetensors.exists() {
            safetensors
        } else {
            dir.join("pytorch_model.bin")
        };
        for path in [&config, &tokenizer, &weights] {
            if !path.exists() {
                anyhow::bail!("{} not found", path.display());
            }
        }
        Ok(Self {
            config,
            tokenizer,
            weights,
        })
    }

    pub fn from_hub(repo_id: &str) -> Result<Self> {
        let api = Api::new().context("Failed to initialize HuggingFace API")?;
        let repo = api.repo(Repo::new(repo_id.to_string(), RepoType::Model));

        let config = repo
            .get("config.json")
            .with_context(|| format!("Failed to download config.json from '{repo_id}'"))?;
        let tokenizer = repo
            .get("tokenizer.json")
            .with_context(|| format!("Failed to download tokenizer.json from '{repo_id}'"))?;
        let weights = repo
            .get("model.safetensors")
            .or_else(|_| repo.get("pytorch_model.bin"))
            .with_context(|| format!("Failed to download weights from '{repo_id}'"))?;

        Ok(Self {
            config,
            tokenizer,
            weights,
        })
    }

    pub fn read_config(&self) -> Result<String> {
        std::fs::read_to_string(&self.config).context("Failed to read config.json")
    }

    pub fn load_tokenizer(&self) -> Result<Tokenizer> {
        Tokenizer::from_file(&self.tokenizer)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))
    }

    pub fn var_builder(&self, device: &Device) -> Result<VarBuilder<'static>> {
        let vb = if self
            .weights
            .extension()
            .is_some_and(|e| e == "safetensors")
        {
            unsafe { VarBuilder::from_mmaped_safetensors(&[&self.weights], DType::F32, device)? }
        } else {
            VarBuilder::from_pth(&self.weights, DType::F32, device)?
        };
        Ok(vb)
    }
}

/// Directory name used for a repo id inside the local model directory
pub fn local_dir_name(repo_id: &str) -> String {
    repo_id.replace('/', "--")
}

/// Setup device: prefer Metal on macOS if available and `use_metal` is set
pub fn select_device(use_metal: bool) -> Device {
    #[cfg(target_os = "macos")]
    let device = if use_metal {
        match Device::new_metal(0) {
            Ok(d) => d,
            Err(e) => {
                tracing::debug!("Metal unavailable, falling back to CPU: {}", e);
                Device::Cpu
            }
        }
    } else {
        Device::Cpu
    };
    #[cfg(not(target_os = "macos"))]
    let device = {
        let _ = use_metal;
        Device::Cpu
    };
    device
}
