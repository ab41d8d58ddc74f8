pub mod app;
pub mod classifier;
pub mod config;
pub mod error;
pub mod formatting;
pub mod logging;
pub mod pipelines;
pub mod schemas;
pub mod tui;
pub mod validation;

pub use app::{App, Completion, Job, Notification, NotificationLevel, Tab};
pub use classifier::{ClassificationResult, ENVIRONMENT_KEYWORDS, EnvironmentLabel, classify};
pub use error::{Result, SuiteError};
