//! Model pipelines behind the entity and fill-mask tabs.
//!
//! The app only sees the [`EntityPipeline`] and [`MaskPipeline`] traits; the BERT
//! implementations live in [`ner`] and [`fill_mask`]. Loading happens once at
//! start-up. A pipeline that fails to load stays unavailable for the rest of the
//! process and reports why whenever it is called.

pub mod fill_mask;
pub mod loader;
pub mod ner;

use std::sync::Arc;

use crate::config::Config;
use crate::error::{Result, SuiteError};
use crate::schemas::{Entity, MaskPrediction};

pub use fill_mask::BertFillMaskPipeline;
pub use loader::{ModelFiles, select_device};
pub use ner::BertNerPipeline;

pub trait EntityPipeline: Send + Sync {
    /// Grouped entities in source order.
    fn extract(&self, text: &str) -> Result<Vec<Entity>>;
}

pub trait MaskPipeline: Send + Sync {
    /// Candidates for the first mask position, best first.
    fn fill(&self, text: &str) -> Result<Vec<MaskPrediction>>;
}

/// A pipeline as seen after start-up: loaded, failed to load, or never requested.
pub enum PipelineHandle<P: ?Sized> {
    Ready(Arc<P>),
    Failed { reason: String },
    Disabled { reason: String },
}

impl<P: ?Sized> Clone for PipelineHandle<P> {
    fn clone(&self) -> Self {
        match self {
            PipelineHandle::Ready(p) => PipelineHandle::Ready(Arc::clone(p)),
            PipelineHandle::Failed { reason } => PipelineHandle::Failed {
                reason: reason.clone(),
            },
            PipelineHandle::Disabled { reason } => PipelineHandle::Disabled {
                reason: reason.clone(),
            },
        }
    }
}

impl<P: ?Sized> PipelineHandle<P> {
    pub fn is_ready(&self) -> bool {
        matches!(self, PipelineHandle::Ready(_))
    }

    /// The loaded pipeline, or a pipeline error naming `component` and the cause.
    pub fn get(&self, component: &str) -> Result<Arc<P>> {
        match self {
            PipelineHandle::Ready(p) => Ok(Arc::clone(p)),
            PipelineHandle::Failed { reason } => Err(SuiteError::pipeline(format!(
                "{component} is unavailable: {reason}"
            ))),
            PipelineHandle::Disabled { reason } => Err(SuiteError::FeatureDisabled {
                component: component.to_string(),
                message: reason.clone(),
            }),
        }
    }
}

pub const NER_COMPONENT: &str = "named-entity model";
pub const FILL_MASK_COMPONENT: &str = "fill-mask model";

/// Which pipelines to load at start-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSet {
    pub ner: bool,
    pub fill_mask: bool,
}

impl PipelineSet {
    pub const ALL: PipelineSet = PipelineSet {
        ner: true,
        fill_mask: true,
    };
    pub const NONE: PipelineSet = PipelineSet {
        ner: false,
        fill_mask: false,
    };
}

pub struct Pipelines {
    pub ner: PipelineHandle<dyn EntityPipeline>,
    pub fill_mask: PipelineHandle<dyn MaskPipeline>,
    /// Load failures, reported once to the user
    pub init_errors: Vec<SuiteError>,
}

impl Pipelines {
    pub fn new(
        ner: PipelineHandle<dyn EntityPipeline>,
        fill_mask: PipelineHandle<dyn MaskPipeline>,
    ) -> Self {
        Self {
            ner,
            fill_mask,
            init_errors: Vec::new(),
        }
    }

    pub fn disabled(reason: &str) -> Self {
        Self::new(
            PipelineHandle::Disabled {
                reason: reason.to_string(),
            },
            PipelineHandle::Disabled {
                reason: reason.to_string(),
            },
        )
    }

    /// Load the requested pipelines. Failures are recorded, never propagated;
    /// they are logged when the app reports them.
    pub fn load(config: &Config, which: PipelineSet) -> Self {
        if config.runtime.skip_models {
            tracing::info!("Model loading skipped by configuration");
            return Self::disabled("model loading was skipped");
        }
        if which == PipelineSet::NONE {
            return Self::disabled("not requested by this command");
        }

        let device = select_device(config.runtime.use_metal);
        let local_dir = config.models.local_dir.as_deref();
        let mut pipelines = Self::disabled("not requested by this command");

        if which.ner {
            let repo = &config.models.ner_model;
            tracing::info!("Loading {} ({})", NER_COMPONENT, repo);
            match BertNerPipeline::load(repo, local_dir, device.clone()) {
                Ok(p) => pipelines.ner = PipelineHandle::Ready(Arc::new(p)),
                Err(e) => {
                    let reason = format!("{e:#}");
                    pipelines.init_errors.push(SuiteError::Initialization {
                        component: NER_COMPONENT.to_string(),
                        message: reason.clone(),
                    });
                    pipelines.ner = PipelineHandle::Failed { reason };
                }
            }
        }

        if which.fill_mask {
            let repo = &config.models.fill_mask_model;
            tracing::info!("Loading {} ({})", FILL_MASK_COMPONENT, repo);
            match BertFillMaskPipeline::load(
                repo,
                local_dir,
                &config.fill_mask.mask_token,
                config.fill_mask.top_k,
                device,
            ) {
                Ok(p) => pipelines.fill_mask = PipelineHandle::Ready(Arc::new(p)),
                Err(e) => {
                    let reason = format!("{e:#}");
                    pipelines.init_errors.push(SuiteError::Initialization {
                        component: FILL_MASK_COMPONENT.to_string(),
                        message: reason.clone(),
                    });
                    pipelines.fill_mask = PipelineHandle::Failed { reason };
                }
            }
        }

        pipelines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::App;
    use crate::config::DEFAULT_NER_MODEL;
    use super::loader::local_dir_name;
    use crate::logging::capture;

    struct Echo;

    impl EntityPipeline for Echo {
        fn extract(&self, text: &str) -> Result<Vec<Entity>> {
            Ok(vec![Entity {
                group: "MISC".into(),
                text: text.into(),
                score: 1.0,
                start: None,
                end: None,
            }])
        }
    }

    #[test]
    fn test_ready_handle_returns_pipeline() {
        let handle: PipelineHandle<dyn EntityPipeline> = PipelineHandle::Ready(Arc::new(Echo));
        let p = handle.get(NER_COMPONENT).unwrap();
        assert_eq!(p.extract("x").unwrap()[0].text, "x");
        assert!(handle.clone().is_ready());
    }

    #[test]
    fn test_failed_handle_reports_reason() {
        let handle: PipelineHandle<dyn EntityPipeline> = PipelineHandle::Failed {
            reason: "config.json missing".into(),
        };
        let err = handle.get(NER_COMPONENT).err().unwrap();
        assert_eq!(
            err.to_string(),
            "named-entity model is unavailable: config.json missing"
        );
    }

    #[test]
    fn test_broken_checkpoint_is_recorded_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(local_dir_name(DEFAULT_NER_MODEL))).unwrap();
        let mut config = Config::default();
        config.models.local_dir = Some(dir.path().to_path_buf());

        let (captured, sub) = capture("nlp_suite=error");
        let mut app = tracing::subscriber::with_default(sub, || {
            let pipelines = Pipelines::load(
                &config,
                PipelineSet {
                    ner: true,
                    fill_mask: false,
                },
            );
            assert_eq!(pipelines.init_errors.len(), 1);
            assert!(matches!(
                pipelines.init_errors[0],
                SuiteError::Initialization { .. }
            ));
            assert!(matches!(pipelines.ner, PipelineHandle::Failed { .. }));
            assert!(matches!(pipelines.fill_mask, PipelineHandle::Disabled { .. }));
            App::new(pipelines, &config)
        });

        assert_eq!(captured.text().matches("ERROR").count(), 1);
        let popup = app.popup().unwrap();
        assert!(popup.message.starts_with("Failed to load named-entity model:"));
        assert!(popup.message.contains("config.json not found"));
        app.dismiss_popup();
        assert!(app.popup().is_none());
    }

    #[test]
    fn test_nothing_requested_loads_nothing() {
        let pipelines = Pipelines::load(&Config::default(), PipelineSet::NONE);
        assert!(!pipelines.ner.is_ready());
        assert!(!pipelines.fill_mask.is_ready());
        assert!(pipelines.init_errors.is_empty());
    }

    #[test]
    fn test_skip_models_disables_everything() {
        let mut config = Config::default();
        config.runtime.skip_models = true;
        let pipelines = Pipelines::load(&config, PipelineSet::ALL);
        assert!(!pipelines.ner.is_ready());
        assert!(!pipelines.fill_mask.is_ready());
        assert!(pipelines.init_errors.is_empty());
    }
}
