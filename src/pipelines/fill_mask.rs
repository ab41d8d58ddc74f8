use anyhow::{Context, Result};
use candle_core::{D, Device, IndexOp, Tensor};
use candle_nn::{LayerNorm, Linear, Module, VarBuilder, ops::softmax};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use serde::Deserialize;
use std::path::Path;
use tokenizers::{Tokenizer, TruncationParams};

use super::MaskPipeline;
use super::loader::ModelFiles;
use crate::error::SuiteError;
use crate::schemas::{MaskPrediction, RawMaskPrediction};

const MAX_TOKENS: usize = 512;

fn default_layer_norm_eps() -> f64 {
    1e-12
}

#[derive(Debug, Deserialize)]
struct HeadConfig {
    hidden_size: usize,
    vocab_size: usize,
    #[serde(default = "default_layer_norm_eps")]
    layer_norm_eps: f64,
}

/// `cls.predictions` head: dense + GELU + LayerNorm, decoder tied to the word embeddings
struct MlmHead {
    dense: Linear,
    layer_norm: LayerNorm,
    decoder_weight: Tensor,
    bias: Tensor,
}

/// Older checkpoints name LayerNorm parameters gamma/beta
fn layer_norm(size: usize, eps: f64, vb: VarBuilder) -> candle_core::Result<LayerNorm> {
    let (weight, bias) = match (vb.get(size, "weight"), vb.get(size, "bias")) {
        (Ok(weight), Ok(bias)) => (weight, bias),
        (Err(err), _) | (_, Err(err)) => {
            match (vb.get(size, "gamma"), vb.get(size, "beta")) {
                (Ok(weight), Ok(bias)) => (weight, bias),
                _ => return Err(err),
            }
        }
    };
    Ok(LayerNorm::new(weight, bias, eps))
}

impl MlmHead {
    fn load(vb: &VarBuilder, head: &HeadConfig) -> Result<Self> {
        let transform = vb.pp("cls.predictions.transform");
        let dense = candle_nn::linear(head.hidden_size, head.hidden_size, transform.pp("dense"))?;
        let layer_norm = layer_norm(
            head.hidden_size,
            head.layer_norm_eps,
            transform.pp("LayerNorm"),
        )?;
        let shape = (head.vocab_size, head.hidden_size);
        let decoder_weight = vb
            .pp("bert.embeddings.word_embeddings")
            .get(shape, "weight")
            .or_else(|_| vb.pp("embeddings.word_embeddings").get(shape, "weight"))
            .context("Missing word embeddings for the decoder")?;
        let bias = vb
            .pp("cls.predictions")
            .get(head.vocab_size, "bias")
            .context("Missing cls.predictions.bias")?;
        Ok(Self {
            dense,
            layer_norm,
            decoder_weight,
            bias,
        })
    }

    /// Vocabulary logits for a `[n, hidden]` slice of hidden states
    fn forward(&self, hidden: &Tensor) -> candle_core::Result<Tensor> {
        let x = self.dense.forward(hidden)?.gelu_erf()?;
        let x = self.layer_norm.forward(&x)?;
        x.matmul(&self.decoder_weight.t()?)?.broadcast_add(&self.bias)
    }
}

/// BERT masked-language model returning the top-k candidates for the first mask
pub struct BertFillMaskPipeline {
    model: BertModel,
    head: MlmHead,
    tokenizer: Tokenizer,
    mask_token: String,
    mask_id: u32,
    top_k: usize,
    device: Device,
}

impl BertFillMaskPipeline {
    pub fn load(
        repo_id: &str,
        local_dir: Option<&Path>,
        mask_token: &str,
        top_k: usize,
        device: Device,
    ) -> Result<Self> {
        let files = ModelFiles::resolve(repo_id, local_dir)?;
        let config_str = files.read_config()?;
        let vb = files.var_builder(&device)?;
        let tokenizer = files.load_tokenizer()?;

        let pipeline = Self::from_parts(&config_str, vb, tokenizer, mask_token, top_k, device)?;
        tracing::info!("Loaded fill-mask model {} (top_k={})", repo_id, top_k);
        Ok(pipeline)
    }

    /// Build from a `config.json` body, its weights and its tokenizer
    pub fn from_parts(
        config_str: &str,
        vb: VarBuilder,
        mut tokenizer: Tokenizer,
        mask_token: &str,
        top_k: usize,
        device: Device,
    ) -> Result<Self> {
        let config: BertConfig =
            serde_json::from_str(config_str).context("Failed to parse config.json")?;
        let head_config: HeadConfig = serde_json::from_str(config_str)
            .context("config.json is missing hidden_size or vocab_size")?;

        let model = BertModel::load(vb.clone(), &config)?;
        let head = MlmHead::load(&vb, &head_config)?;

        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Failed to configure truncation: {}", e))?;
        let mask_id = tokenizer
            .token_to_id(mask_token)
            .with_context(|| format!("Tokenizer has no '{mask_token}' token"))?;

        Ok(Self {
            model,
            head,
            tokenizer,
            mask_token: mask_token.to_string(),
            mask_id,
            top_k,
            device,
        })
    }

    fn predict(&self, text: &str) -> Result<Vec<RawMaskPrediction>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;
        let token_ids = encoding.get_ids();
        let mask_index = token_ids
            .iter()
            .position(|&id| id == self.mask_id)
            .with_context(|| format!("No {} token in input", self.mask_token))?;

        let type_ids = vec![0u32; token_ids.len()];
        let attention: Vec<f32> = encoding
            .get_attention_mask()
            .iter()
            .map(|&x| x as f32)
            .collect();

        let input_ids = Tensor::new(token_ids, &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(type_ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let attention_tensor = Tensor::new(attention.as_slice(), &self.device)?.unsqueeze(0)?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_tensor))?;
        let at_mask = hidden.i((0, mask_index))?.unsqueeze(0)?;
        let logits = self.head.forward(&at_mask)?.squeeze(0)?;
        let probs = softmax(&logits, D::Minus1)?.to_vec1::<f32>()?;

        let mut out = Vec::with_capacity(self.top_k);
        for idx in top_k_indices(&probs, self.top_k) {
            let token_id = idx as u32;
            let mut filled = token_ids.to_vec();
            filled[mask_index] = token_id;
            let sequence = self
                .tokenizer
                .decode(&filled, true)
                .map_err(|e| anyhow::anyhow!("Decoding failed: {}", e))?;
            let token_str = self
                .tokenizer
                .decode(&[token_id], true)
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .or_else(|| self.tokenizer.id_to_token(token_id))
                .unwrap_or_default();
            out.push(RawMaskPrediction {
                sequence,
                score: probs[idx],
                token: token_id,
                token_str,
            });
        }
        Ok(out)
    }
}

impl MaskPipeline for BertFillMaskPipeline {
    fn fill(&self, text: &str) -> crate::error::Result<Vec<MaskPrediction>> {
        self.predict(text)
            .map_err(|e| SuiteError::pipeline(format!("{e:#}")))?
            .into_iter()
            .map(MaskPrediction::try_from)
            .collect()
    }
}

/// Indices of the `k` largest probabilities, best first
pub fn top_k_indices(probs: &[f32], k: usize) -> Vec<usize> {
    let mut idxs: Vec<usize> = (0..probs.len()).collect();
    idxs.sort_by(|&i, &j| probs[j].total_cmp(&probs[i]));
    idxs.truncate(k.min(idxs.len()));
    idxs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_k_indices_descending() {
        let probs = [0.1, 0.5, 0.05, 0.3, 0.05];
        assert_eq!(top_k_indices(&probs, 3), vec![1, 3, 0]);
    }

    #[test]
    fn test_top_k_larger_than_vocab() {
        let probs = [0.6, 0.4];
        assert_eq!(top_k_indices(&probs, 10), vec![0, 1]);
        assert!(top_k_indices(&probs, 0).is_empty());
    }

    const TINY_CONFIG: &str = r#"{
        "vocab_size": 8,
        "hidden_size": 8,
        "num_hidden_layers": 1,
        "num_attention_heads": 2,
        "intermediate_size": 16,
        "hidden_act": "gelu",
        "hidden_dropout_prob": 0.0,
        "max_position_embeddings": 32,
        "type_vocab_size": 2,
        "initializer_range": 0.02,
        "layer_norm_eps": 1e-12,
        "pad_token_id": 0,
        "model_type": "bert"
    }"#;

    const TINY_TOKENIZER: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": {"type": "WhitespaceSplit"},
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": {
                "[UNK]": 0, "[MASK]": 1, "the": 2, "earth": 3,
                "is": 4, "round": 5, "flat": 6, "blue": 7
            },
            "unk_token": "[UNK]"
        }
    }"#;

    fn tiny_pipeline(top_k: usize) -> BertFillMaskPipeline {
        use std::str::FromStr;

        let varmap = candle_nn::VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, candle_core::DType::F32, &Device::Cpu);
        let tokenizer = Tokenizer::from_str(TINY_TOKENIZER).unwrap();
        BertFillMaskPipeline::from_parts(TINY_CONFIG, vb, tokenizer, "[MASK]", top_k, Device::Cpu)
            .unwrap()
    }

    #[test]
    fn test_fill_replaces_the_mask_position() {
        let pipeline = tiny_pipeline(3);
        let preds = pipeline.fill("the earth is [MASK]").unwrap();
        assert_eq!(preds.len(), 3);
        for pred in &preds {
            assert_eq!(pred.filled_sequence, format!("the earth is {}", pred.token));
            assert!((0.0..=1.0).contains(&pred.score));
        }
        assert!(preds.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_fill_only_predicts_first_mask() {
        let pipeline = tiny_pipeline(2);
        let preds = pipeline.fill("[MASK] earth is [MASK]").unwrap();
        assert_eq!(preds.len(), 2);
        for pred in &preds {
            assert_eq!(
                pred.filled_sequence,
                format!("{} earth is [MASK]", pred.token)
            );
        }
    }

    #[test]
    fn test_fill_without_mask_is_pipeline_error() {
        let pipeline = tiny_pipeline(2);
        let err = pipeline.fill("the earth is round").unwrap_err();
        assert!(matches!(err, SuiteError::Pipeline { .. }));
        assert!(err.to_string().contains("[MASK]"));
    }

    #[test]
    fn test_missing_mask_token_in_vocab_fails_to_build() {
        use std::str::FromStr;

        let varmap = candle_nn::VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, candle_core::DType::F32, &Device::Cpu);
        let tokenizer = Tokenizer::from_str(TINY_TOKENIZER).unwrap();
        let result =
            BertFillMaskPipeline::from_parts(TINY_CONFIG, vb, tokenizer, "<mask>", 2, Device::Cpu);
        assert!(result.is_err());
    }

    #[test]
    fn test_layer_norm_gamma_fallback() {
        let device = Device::Cpu;
        let mut tensors = std::collections::HashMap::new();
        tensors.insert(
            "gamma".to_string(),
            Tensor::ones(4, candle_core::DType::F32, &device).unwrap(),
        );
        tensors.insert(
            "beta".to_string(),
            Tensor::zeros(4, candle_core::DType::F32, &device).unwrap(),
        );
        let vb = VarBuilder::from_tensors(tensors, candle_core::DType::F32, &device);
        assert!(layer_norm(4, 1e-12, vb).is_ok());
    }
}
