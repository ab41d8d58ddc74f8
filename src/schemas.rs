//! Typed records exchanged with the model pipelines.
//!
//! Pipelines hand back dictionary-shaped predictions (`entity_group`/`word`/`score`,
//! `sequence`/`score`/`token_str`). Those shapes are captured by the `Raw*` records
//! and converted into [`Entity`] and [`MaskPrediction`] as soon as they are received,
//! so nothing untyped travels past the pipeline boundary.

use crate::error::SuiteError;

/// A contiguous span the NER model assigned a single category.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub group: String,
    pub text: String,
    pub score: f32,
    /// Character offsets into the source text, when the pipeline reports them
    pub start: Option<usize>,
    pub end: Option<usize>,
}

/// One candidate for the masked position.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskPrediction {
    /// Input with the mask replaced by `token`
    pub filled_sequence: String,
    pub token: String,
    pub token_id: u32,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct RawEntity {
    pub entity_group: String,
    pub word: String,
    pub score: f32,
    pub start: Option<usize>,
    pub end: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct RawMaskPrediction {
    pub sequence: String,
    pub score: f32,
    pub token: u32,
    pub token_str: String,
}

fn check_score(score: f32, what: &str) -> Result<f32, SuiteError> {
    if !score.is_finite() || !(0.0..=1.0).contains(&score) {
        return Err(SuiteError::pipeline(format!(
            "{what} score {score} is outside [0, 1]"
        )));
    }
    Ok(score)
}

impl TryFrom<RawEntity> for Entity {
    type Error = SuiteError;

    fn try_from(raw: RawEntity) -> Result<Self, Self::Error> {
        if raw.entity_group.trim().is_empty() {
            return Err(SuiteError::pipeline("entity has an empty group label"));
        }
        let score = check_score(raw.score, "entity")?;
        Ok(Entity {
            group: raw.entity_group,
            text: raw.word,
            score,
            start: raw.start,
            end: raw.end,
        })
    }
}

impl TryFrom<RawMaskPrediction> for MaskPrediction {
    type Error = SuiteError;

    fn try_from(raw: RawMaskPrediction) -> Result<Self, Self::Error> {
        if raw.token_str.trim().is_empty() {
            return Err(SuiteError::pipeline("mask prediction has an empty token"));
        }
        let score = check_score(raw.score, "mask prediction")?;
        Ok(MaskPrediction {
            filled_sequence: raw.sequence,
            token: raw.token_str,
            token_id: raw.token,
            score,
        })
    }
}
