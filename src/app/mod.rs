//! Application state and the handlers behind the four tabs.
//!
//! Handlers never block on a model. `App::submit` validates the active tab's
//! input and either renders a result straight away (classifier, image stub) or
//! hands back a [`Job`] for a worker thread. The worker's [`Completion`] is fed
//! to `App::complete`, which renders it or raises an error. Tabs share no
//! mutable state, and completions are applied in arrival order, so the last
//! one to finish for a tab is what that tab shows.

mod jobs;
mod notifications;
mod view;

use std::collections::VecDeque;

use crate::classifier;
use crate::config::Config;
use crate::error::{Result, SuiteError};
use crate::formatting;
use crate::pipelines::{FILL_MASK_COMPONENT, NER_COMPONENT, PipelineSet, Pipelines};
use crate::validation;

pub use jobs::{Completion, Job};
pub use notifications::{Notification, NotificationLevel};
pub use view::ResultView;

pub const IMAGE_UNAVAILABLE_NOTICE: &str =
    "Image generation model not available. This would generate an image based on your prompt.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    Environment,
    Image,
    Entities,
    FillMask,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Environment, Tab::Image, Tab::Entities, Tab::FillMask];

    pub fn index(self) -> usize {
        match self {
            Tab::Environment => 0,
            Tab::Image => 1,
            Tab::Entities => 2,
            Tab::FillMask => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Tab> {
        Tab::ALL.get(index).copied()
    }

    pub fn next(self) -> Tab {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }

    pub fn prev(self) -> Tab {
        Tab::ALL[(self.index() + Tab::ALL.len() - 1) % Tab::ALL.len()]
    }

    pub fn title(self) -> &'static str {
        match self {
            Tab::Environment => "🌍 Environment Classifier",
            Tab::Image => "🎨 Text to Image",
            Tab::Entities => "🏷️ Named Entities",
            Tab::FillMask => "🎭 Fill Mask",
        }
    }

    pub fn input_title(self) -> &'static str {
        match self {
            Tab::Environment | Tab::Entities => "Input Text",
            Tab::Image => "Image Prompt",
            Tab::FillMask => "Masked Text",
        }
    }

    pub fn output_title(self) -> &'static str {
        match self {
            Tab::Environment => "Classification Results",
            Tab::Image => "Generated Image",
            Tab::Entities => "Extracted Entities",
            Tab::FillMask => "Predictions",
        }
    }

    pub fn action_label(self) -> &'static str {
        match self {
            Tab::Environment => "Analyze Text",
            Tab::Image => "Generate Image",
            Tab::Entities => "Extract Entities",
            Tab::FillMask => "Predict Mask",
        }
    }

    /// Prefix for the error raised when this tab's action fails
    pub fn failure_prefix(self) -> &'static str {
        match self {
            Tab::Environment => "Classification failed",
            Tab::Image => "Image generation failed",
            Tab::Entities => "Entity extraction failed",
            Tab::FillMask => "Mask filling failed",
        }
    }
}

/// The input check `tab`'s action runs before anything else. Returns the trimmed text.
pub fn validate_input<'a>(tab: Tab, input: &'a str, mask_token: &str) -> Result<&'a str> {
    match tab {
        Tab::Environment | Tab::Entities => {
            validation::require_text(input, validation::ANALYZE_TEXT_WARNING)
        }
        Tab::Image => validation::require_text(input, validation::IMAGE_PROMPT_WARNING),
        Tab::FillMask => validation::require_masked_text(input, mask_token),
    }
}

/// Pipelines `tab` needs to act on `input`. Input that fails validation needs none.
pub fn required_pipelines(tab: Tab, input: &str, mask_token: &str) -> PipelineSet {
    if validate_input(tab, input, mask_token).is_err() {
        return PipelineSet::NONE;
    }
    match tab {
        Tab::Entities => PipelineSet {
            ner: true,
            fill_mask: false,
        },
        Tab::FillMask => PipelineSet {
            ner: false,
            fill_mask: true,
        },
        Tab::Environment | Tab::Image => PipelineSet::NONE,
    }
}

#[derive(Debug, Default)]
pub struct TabState {
    pub input: String,
    pub output: ResultView,
    /// Jobs dispatched for this tab that have not completed yet
    pub pending: usize,
}

pub struct App {
    pub active: Tab,
    tabs: [TabState; 4],
    pipelines: Pipelines,
    mask_token: String,
    status: Option<Notification>,
    popups: VecDeque<Notification>,
    image_notice_shown: bool,
    next_job_id: u64,
}

impl App {
    pub fn new(mut pipelines: Pipelines, config: &Config) -> Self {
        let init_errors = std::mem::take(&mut pipelines.init_errors);
        let mut app = Self {
            active: Tab::Environment,
            tabs: Default::default(),
            pipelines,
            mask_token: config.fill_mask.mask_token.clone(),
            status: None,
            popups: VecDeque::new(),
            image_notice_shown: false,
            next_job_id: 1,
        };
        for err in init_errors {
            app.notify(Notification::error(err.to_string()));
        }
        app
    }

    pub fn mask_token(&self) -> &str {
        &self.mask_token
    }

    pub fn tab(&self, tab: Tab) -> &TabState {
        &self.tabs[tab.index()]
    }

    pub fn tab_mut(&mut self, tab: Tab) -> &mut TabState {
        &mut self.tabs[tab.index()]
    }

    pub fn current(&self) -> &TabState {
        self.tab(self.active)
    }

    pub fn current_mut(&mut self) -> &mut TabState {
        let tab = self.active;
        self.tab_mut(tab)
    }

    pub fn set_input(&mut self, tab: Tab, text: impl Into<String>) {
        self.tab_mut(tab).input = text.into();
    }

    pub fn output(&self, tab: Tab) -> &str {
        self.tab(tab).output.content()
    }

    pub fn is_busy(&self, tab: Tab) -> bool {
        self.tab(tab).pending > 0
    }

    // Notifications

    /// Warnings go to the status line; errors and info become popups.
    pub fn notify(&mut self, notification: Notification) {
        match notification.level {
            NotificationLevel::Warning => {
                tracing::warn!("{}", notification.message);
                self.status = Some(notification);
            }
            NotificationLevel::Error => {
                tracing::error!("{}", notification.message);
                self.popups.push_back(notification);
            }
            NotificationLevel::Info => {
                tracing::info!("{}", notification.message);
                self.popups.push_back(notification);
            }
        }
    }

    pub fn status(&self) -> Option<&Notification> {
        self.status.as_ref()
    }

    pub fn popup(&self) -> Option<&Notification> {
        self.popups.front()
    }

    pub fn dismiss_popup(&mut self) {
        self.popups.pop_front();
    }

    /// Drain every pending notification, status line first.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        let mut out: Vec<Notification> = self.status.take().into_iter().collect();
        out.extend(self.popups.drain(..));
        out
    }

    // Handlers

    pub fn submit(&mut self) -> Option<Job> {
        self.submit_tab(self.active)
    }

    /// Run `tab`'s action. Returns a job when a model has to be called.
    pub fn submit_tab(&mut self, tab: Tab) -> Option<Job> {
        self.status = None;
        let input = self.tab(tab).input.clone();
        tracing::debug!(tab = ?tab, chars = input.len(), "submit");

        let dispatched = match tab {
            Tab::Environment => self.classify_environment(&input).map(|_| None),
            Tab::Image => self.generate_image(&input).map(|_| None),
            Tab::Entities => self.extract_entities(&input).map(Some),
            Tab::FillMask => self.fill_mask(&input).map(Some),
        };

        match dispatched {
            Ok(job) => {
                if job.is_some() {
                    self.tab_mut(tab).pending += 1;
                }
                job
            }
            Err(err) => {
                self.report(tab, err);
                None
            }
        }
    }

    fn report(&mut self, tab: Tab, err: SuiteError) {
        let notification = match err.level() {
            NotificationLevel::Warning => Notification::warning(err.to_string()),
            _ => Notification::error(format!("{}: {}", tab.failure_prefix(), err)),
        };
        self.notify(notification);
    }

    fn classify_environment(&mut self, input: &str) -> Result<()> {
        let result = classifier::classify(input)?;
        self.tab_mut(Tab::Environment).output.render(result.render());
        Ok(())
    }

    fn generate_image(&mut self, input: &str) -> Result<()> {
        let prompt = validate_input(Tab::Image, input, &self.mask_token)?;
        if !self.image_notice_shown {
            self.image_notice_shown = true;
            self.notify(Notification::info(IMAGE_UNAVAILABLE_NOTICE));
        }
        let text = formatting::render_image_acknowledgement(prompt);
        self.tab_mut(Tab::Image).output.render(text);
        Ok(())
    }

    fn extract_entities(&mut self, input: &str) -> Result<Job> {
        let text = validate_input(Tab::Entities, input, &self.mask_token)?;
        let pipeline = self.pipelines.ner.get(NER_COMPONENT)?;
        Ok(Job::entities(self.job_id(), pipeline, text))
    }

    fn fill_mask(&mut self, input: &str) -> Result<Job> {
        let text = validate_input(Tab::FillMask, input, &self.mask_token)?;
        let pipeline = self.pipelines.fill_mask.get(FILL_MASK_COMPONENT)?;
        Ok(Job::fill_mask(self.job_id(), pipeline, text))
    }

    fn job_id(&mut self) -> u64 {
        let id = self.next_job_id;
        self.next_job_id += 1;
        id
    }

    /// Apply a finished job. Failures leave the tab's output untouched.
    pub fn complete(&mut self, completion: Completion) {
        let tab = completion.tab;
        let state = self.tab_mut(tab);
        state.pending = state.pending.saturating_sub(1);
        tracing::info!(
            job = completion.id,
            tab = ?tab,
            elapsed_ms = completion.elapsed.as_millis() as u64,
            ok = completion.outcome.is_ok(),
            "job completed"
        );
        match completion.outcome {
            Ok(text) => state.output.render(text),
            Err(err) => self.report(tab, err),
        }
    }

    // Navigation and editing

    pub fn select_tab(&mut self, tab: Tab) {
        self.active = tab;
    }

    pub fn next_tab(&mut self) {
        self.active = self.active.next();
    }

    pub fn prev_tab(&mut self) {
        self.active = self.active.prev();
    }

    pub fn insert_char(&mut self, c: char) {
        self.current_mut().input.push(c);
    }

    pub fn backspace(&mut self) {
        self.current_mut().input.pop();
    }

    pub fn clear_input(&mut self) {
        self.current_mut().input.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        App::new(Pipelines::disabled("test"), &Config::default())
    }

    #[test]
    fn test_tab_cycle() {
        assert_eq!(Tab::Environment.next(), Tab::Image);
        assert_eq!(Tab::FillMask.next(), Tab::Environment);
        assert_eq!(Tab::Environment.prev(), Tab::FillMask);
        assert_eq!(Tab::from_index(2), Some(Tab::Entities));
        assert_eq!(Tab::from_index(4), None);
    }

    #[test]
    fn test_editing_applies_to_active_tab() {
        let mut app = app();
        app.select_tab(Tab::Entities);
        for c in "Paris".chars() {
            app.insert_char(c);
        }
        app.backspace();
        assert_eq!(app.tab(Tab::Entities).input, "Pari");
        assert!(app.tab(Tab::Environment).input.is_empty());
        app.clear_input();
        assert!(app.current().input.is_empty());
    }

    #[test]
    fn test_image_notice_shown_once() {
        let mut app = app();
        app.set_input(Tab::Image, "a forest at dawn");
        assert!(app.submit_tab(Tab::Image).is_none());
        assert!(app.submit_tab(Tab::Image).is_none());
        let notes = app.take_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].level, NotificationLevel::Info);
        assert!(app.output(Tab::Image).contains("'a forest at dawn'"));
    }

    #[test]
    fn test_disabled_pipeline_reports_error() {
        let mut app = app();
        app.set_input(Tab::Entities, "Angela Merkel visited Paris");
        assert!(app.submit_tab(Tab::Entities).is_none());
        let popup = app.popup().unwrap();
        assert_eq!(popup.level, NotificationLevel::Error);
        assert!(popup.message.starts_with("Entity extraction failed:"));
        assert!(!app.is_busy(Tab::Entities));
    }

    #[test]
    fn test_invalid_input_needs_no_pipelines() {
        assert_eq!(
            required_pipelines(Tab::FillMask, "The earth is round.", "[MASK]"),
            PipelineSet::NONE
        );
        assert_eq!(
            required_pipelines(Tab::Entities, "  \n", "[MASK]"),
            PipelineSet::NONE
        );
        let fill = required_pipelines(Tab::FillMask, "The earth is [MASK].", "[MASK]");
        assert!(fill.fill_mask && !fill.ner);
        let ner = required_pipelines(Tab::Entities, "Greta Thunberg", "[MASK]");
        assert!(ner.ner && !ner.fill_mask);
        assert_eq!(
            required_pipelines(Tab::Environment, "carbon", "[MASK]"),
            PipelineSet::NONE
        );
    }

    #[test]
    fn test_submit_clears_previous_warning() {
        let mut app = app();
        assert!(app.submit_tab(Tab::Environment).is_none());
        assert!(app.status().is_some());
        app.set_input(Tab::Environment, "carbon");
        app.submit_tab(Tab::Environment);
        assert!(app.status().is_none());
    }
}
