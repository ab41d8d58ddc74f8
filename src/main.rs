use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use nlp_suite::app::{App, NotificationLevel, Tab, required_pipelines};
use nlp_suite::config::{Config, RuntimeConfig};
use nlp_suite::pipelines::{PipelineSet, Pipelines};

#[derive(Parser, Debug)]
#[command(
    name = "nlp-suite",
    version,
    about = "Environment classification, named entities and fill-mask in the terminal"
)]
struct Cli {
    /// Path to the TOML config file (defaults to $NLPS_CONFIG or ./nlp_suite.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Start without loading any model; NER and fill-mask report unavailable
    #[arg(long, global = true)]
    no_models: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive tabbed interface (default)
    Tui,
    /// Keyword-based environment classification
    Classify { text: Vec<String> },
    /// Named-entity recognition
    Entities { text: Vec<String> },
    /// Masked-language-model predictions for the first mask token
    FillMask { text: Vec<String> },
    /// Image prompt acknowledgement
    Image { prompt: Vec<String> },
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config =
        Config::load_with(cli.config.as_deref()).context("Failed to load configuration")?;
    if cli.no_models {
        config.runtime.skip_models = true;
    }
    Ok(config)
}

/// Run one action without the UI. Returns false when a warning or error was raised.
fn run_headless(config: &Config, tab: Tab, words: &[String]) -> bool {
    let input = words.join(" ");
    let which = required_pipelines(tab, &input, &config.fill_mask.mask_token);
    let pipelines = Pipelines::load(config, which);
    let mut app = App::new(pipelines, config);

    app.set_input(tab, input);
    if let Some(job) = app.submit_tab(tab) {
        let completion = job.run();
        app.complete(completion);
    }

    let mut ok = true;
    for note in app.take_notifications() {
        if note.level != NotificationLevel::Info {
            ok = false;
        }
        eprintln!("{}: {}", note.title, note.message);
    }
    if !app.tab(tab).output.is_empty() {
        println!("{}", app.output(tab));
    }
    ok
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let tab = match &cli.command {
        None | Some(Command::Tui) => None,
        Some(Command::Classify { .. }) => Some(Tab::Environment),
        Some(Command::Entities { .. }) => Some(Tab::Entities),
        Some(Command::FillMask { .. }) => Some(Tab::FillMask),
        Some(Command::Image { .. }) => Some(Tab::Image),
    };

    // Subscriber before config load, which logs warnings
    Config::load_env_file();
    nlp_suite::logging::init(&RuntimeConfig::load_from_env(), tab.is_none())?;
    let config = load_config(&cli)?;

    if let Some(tab) = tab {
        let words = match cli.command {
            Some(Command::Classify { text })
            | Some(Command::Entities { text })
            | Some(Command::FillMask { text }) => text,
            Some(Command::Image { prompt }) => prompt,
            _ => Vec::new(),
        };
        let ok = tokio::task::block_in_place(|| run_headless(&config, tab, &words));
        if !ok {
            std::process::exit(1);
        }
        return Ok(());
    }

    tracing::info!("Starting nlp-suite");
    if !config.runtime.skip_models {
        println!("Loading NLP models...");
    }
    let pipelines = tokio::task::block_in_place(|| Pipelines::load(&config, PipelineSet::ALL));
    let app = App::new(pipelines, &config);

    let handle = tokio::runtime::Handle::current();
    tokio::task::block_in_place(|| nlp_suite::tui::run(app, handle))
}
