use anyhow::{Context, Result};
use candle_core::{D, Device, Tensor};
use candle_nn::{Linear, Module, ops::softmax};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tokenizers::{Tokenizer, TruncationParams};

use super::EntityPipeline;
use super::loader::ModelFiles;
use crate::error::SuiteError;
use crate::schemas::{Entity, RawEntity};

const MAX_TOKENS: usize = 512;

/// Per-token label picked by the classifier head
#[derive(Debug, Clone, PartialEq)]
pub struct TokenPrediction {
    pub id: u32,
    pub label: String,
    pub score: f32,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Deserialize)]
struct HeadConfig {
    hidden_size: usize,
    id2label: HashMap<String, String>,
}

/// BERT token-classification model with entity grouping
pub struct BertNerPipeline {
    model: BertModel,
    classifier: Linear,
    tokenizer: Tokenizer,
    labels: Vec<String>,
    device: Device,
}

impl BertNerPipeline {
    pub fn load(repo_id: &str, local_dir: Option<&Path>, device: Device) -> Result<Self> {
        let files = ModelFiles::resolve(repo_id, local_dir)?;

        let config_str = files.read_config()?;
        let config: BertConfig =
            serde_json::from_str(&config_str).context("Failed to parse config.json")?;
        let head: HeadConfig = serde_json::from_str(&config_str)
            .context("config.json has no id2label mapping")?;
        let labels = labels_in_order(&head.id2label)?;

        let vb = files.var_builder(&device)?;
        let model = BertModel::load(vb.clone(), &config)?;
        let classifier = candle_nn::linear(head.hidden_size, labels.len(), vb.pp("classifier"))?;

        let mut tokenizer = files.load_tokenizer()?;
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Failed to configure truncation: {}", e))?;

        tracing::info!(
            "Loaded NER model {} with {} labels",
            repo_id,
            labels.len()
        );

        Ok(Self {
            model,
            classifier,
            tokenizer,
            labels,
            device,
        })
    }

    fn token_predictions(&self, text: &str) -> Result<Vec<TokenPrediction>> {
        let encoding = self
            .tokenizer
            .encode_char_offsets(text, true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

        let token_ids = encoding.get_ids();
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
        let logits = self.classifier.forward(&hidden)?.squeeze(0)?;
        let probs = softmax(&logits, D::Minus1)?.to_vec2::<f32>()?;

        let special = encoding.get_special_tokens_mask();
        let offsets = encoding.get_offsets();
        let mut out = Vec::with_capacity(token_ids.len());
        for (i, row) in probs.iter().enumerate() {
            if special.get(i).copied().unwrap_or(0) == 1 {
                continue;
            }
            let Some((best, score)) = argmax(row) else {
                continue;
            };
            let (start, end) = offsets.get(i).copied().unwrap_or((0, 0));
            out.push(TokenPrediction {
                id: token_ids[i],
                label: self.labels[best].clone(),
                score,
                start,
                end,
            });
        }
        Ok(out)
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        let text = self
            .tokenizer
            .decode(ids, true)
            .map_err(|e| anyhow::anyhow!("Decoding failed: {}", e))?;
        Ok(text.trim().to_string())
    }
}

impl EntityPipeline for BertNerPipeline {
    fn extract(&self, text: &str) -> crate::error::Result<Vec<Entity>> {
        let grouped = self
            .token_predictions(text)
            .and_then(|tokens| group_entities(&tokens, |ids| self.decode(ids)))
            .map_err(|e| SuiteError::pipeline(format!("{e:#}")))?;
        grouped
            .into_iter()
            .map(Entity::try_from)
            .collect()
    }
}

fn argmax(row: &[f32]) -> Option<(usize, f32)> {
    row.iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

/// Order `id2label` by numeric id, failing on gaps.
fn labels_in_order(id2label: &HashMap<String, String>) -> Result<Vec<String>> {
    let mut labels = vec![String::new(); id2label.len()];
    for (id, label) in id2label {
        let idx: usize = id
            .parse()
            .with_context(|| format!("Non-numeric label id '{id}'"))?;
        let slot = labels
            .get_mut(idx)
            .with_context(|| format!("Label id {idx} out of range"))?;
        *slot = label.clone();
    }
    if labels.iter().any(|l| l.is_empty()) {
        anyhow::bail!("id2label has gaps");
    }
    Ok(labels)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Begin,
    Inside,
}

/// Split `B-PER` into (Begin, "PER"). Labels without a prefix count as Inside.
fn split_tag(label: &str) -> (Tag, &str) {
    if let Some(rest) = label.strip_prefix("B-") {
        (Tag::Begin, rest)
    } else if let Some(rest) = label.strip_prefix("I-") {
        (Tag::Inside, rest)
    } else {
        (Tag::Inside, label)
    }
}

/// Merge adjacent tokens into entities.
///
/// A `B-` tag or a change of entity type opens a new group; `O` groups are
/// dropped. Group score is the mean token score and the surface text comes from
/// `decode` over the group's token ids.
pub fn group_entities<F>(tokens: &[TokenPrediction], decode: F) -> Result<Vec<RawEntity>>
where
    F: Fn(&[u32]) -> Result<String>,
{
    let mut groups: Vec<(&str, Vec<&TokenPrediction>)> = Vec::new();
    for token in tokens {
        let (tag, kind) = split_tag(&token.label);
        match groups.last_mut() {
            Some((last_kind, members)) if tag == Tag::Inside && *last_kind == kind => {
                members.push(token)
            }
            _ => groups.push((kind, vec![token])),
        }
    }

    groups
        .into_iter()
        .filter(|(kind, _)| *kind != "O")
        .map(|(kind, members)| -> Result<RawEntity> {
            let ids: Vec<u32> = members.iter().map(|t| t.id).collect();
            let total: f32 = members.iter().map(|t| t.score).sum();
            let score = (total / members.len() as f32).min(1.0);
            Ok(RawEntity {
                entity_group: kind.to_string(),
                word: decode(&ids)?,
                score,
                start: members.first().map(|t| t.start),
                end: members.last().map(|t| t.end),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(id: u32, label: &str, score: f32) -> TokenPrediction {
        TokenPrediction {
            id,
            label: label.to_string(),
            score,
            start: id as usize * 10,
            end: id as usize * 10 + 5,
        }
    }

    fn decode_ids(ids: &[u32]) -> Result<String> {
        Ok(ids
            .iter()
            .map(|id| format!("t{id}"))
            .collect::<Vec<_>>()
            .join(" "))
    }

    #[test]
    fn test_begin_inside_merge() {
        let tokens = vec![
            tok(1, "B-PER", 0.9),
            tok(2, "I-PER", 0.7),
            tok(3, "O", 0.99),
            tok(4, "B-LOC", 0.8),
        ];
        let entities = group_entities(&tokens, decode_ids).unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].entity_group, "PER");
        assert_eq!(entities[0].word, "t1 t2");
        assert!((entities[0].score - 0.8).abs() < 1e-6);
        assert_eq!(entities[0].start, Some(10));
        assert_eq!(entities[0].end, Some(25));
        assert_eq!(entities[1].entity_group, "LOC");
    }

    #[test]
    fn test_new_begin_splits_same_type() {
        let tokens = vec![tok(1, "B-PER", 0.9), tok(2, "B-PER", 0.9)];
        let entities = group_entities(&tokens, decode_ids).unwrap();
        assert_eq!(entities.len(), 2);
    }

    #[test]
    fn test_type_change_splits_inside_tags() {
        let tokens = vec![tok(1, "I-ORG", 0.9), tok(2, "I-LOC", 0.9)];
        let entities = group_entities(&tokens, decode_ids).unwrap();
        let groups: Vec<_> = entities.iter().map(|e| e.entity_group.as_str()).collect();
        assert_eq!(groups, vec!["ORG", "LOC"]);
    }

    #[test]
    fn test_outside_breaks_span() {
        let tokens = vec![tok(1, "I-PER", 0.9), tok(2, "O", 0.9), tok(3, "I-PER", 0.9)];
        assert_eq!(group_entities(&tokens, decode_ids).unwrap().len(), 2);
    }

    #[test]
    fn test_all_outside_yields_nothing() {
        let tokens = vec![tok(1, "O", 0.9), tok(2, "O", 0.8)];
        assert!(group_entities(&tokens, decode_ids).unwrap().is_empty());
    }

    #[test]
    fn test_decode_failure_is_an_error() {
        let tokens = vec![tok(1, "B-PER", 0.9)];
        let err = group_entities(&tokens, |_| anyhow::bail!("unknown id")).unwrap_err();
        assert!(err.to_string().contains("unknown id"));
        // Nothing to decode, nothing to fail
        let outside = vec![tok(1, "O", 0.9)];
        assert!(group_entities(&outside, |_| anyhow::bail!("unknown id"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_labels_in_order() {
        let mut map = HashMap::new();
        map.insert("1".to_string(), "B-PER".to_string());
        map.insert("0".to_string(), "O".to_string());
        assert_eq!(labels_in_order(&map).unwrap(), vec!["O", "B-PER"]);

        map.insert("5".to_string(), "I-PER".to_string());
        assert!(labels_in_order(&map).is_err());
    }
}
