use std::sync::Arc;
use std::time::{Duration, Instant};

use super::Tab;
use crate::error::Result;
use crate::formatting;
use crate::pipelines::{EntityPipeline, MaskPipeline};

enum JobKind {
    Entities(Arc<dyn EntityPipeline>),
    FillMask(Arc<dyn MaskPipeline>),
}

/// A model call waiting to run off the UI thread
pub struct Job {
    pub id: u64,
    pub tab: Tab,
    text: String,
    kind: JobKind,
}

/// Outcome of a [`Job`]: the formatted result text, or the pipeline error
#[derive(Debug)]
pub struct Completion {
    pub id: u64,
    pub tab: Tab,
    pub outcome: Result<String>,
    pub elapsed: Duration,
}

impl Job {
    pub(crate) fn entities(id: u64, pipeline: Arc<dyn EntityPipeline>, text: &str) -> Self {
        Self {
            id,
            tab: Tab::Entities,
            text: text.to_string(),
            kind: JobKind::Entities(pipeline),
        }
    }

    pub(crate) fn fill_mask(id: u64, pipeline: Arc<dyn MaskPipeline>, text: &str) -> Self {
        Self {
            id,
            tab: Tab::FillMask,
            text: text.to_string(),
            kind: JobKind::FillMask(pipeline),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Call the pipeline and format its output. Blocks until the model returns.
    pub fn run(self) -> Completion {
        let started = Instant::now();
        let outcome = match &self.kind {
            JobKind::Entities(pipeline) => pipeline
                .extract(&self.text)
                .map(|entities| formatting::render_entities(&entities)),
            JobKind::FillMask(pipeline) => pipeline
                .fill(&self.text)
                .map(|predictions| formatting::render_mask_predictions(&predictions)),
        };
        Completion {
            id: self.id,
            tab: self.tab,
            outcome,
            elapsed: started.elapsed(),
        }
    }
}
