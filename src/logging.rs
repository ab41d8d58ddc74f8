//! tracing-subscriber setup. Built from [`RuntimeConfig`] alone, so it can be
//! installed before the config file is read and see its warnings.

use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{DEFAULT_LOG_FILTER, RuntimeConfig};

fn env_filter(runtime: &RuntimeConfig) -> EnvFilter {
    EnvFilter::try_new(&runtime.log_filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// fmt subscriber filtered by `runtime.log_filter`, writing to `writer`
pub fn subscriber<W>(
    runtime: &RuntimeConfig,
    writer: W,
    ansi: bool,
) -> impl tracing::Subscriber + Send + Sync + 'static + use<W>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(runtime))
        .with_ansi(ansi)
        .with_writer(writer)
        .finish()
}

/// Install the global subscriber. The TUI logs to a file so the screen stays
/// clean; headless commands log to stderr.
pub fn init(runtime: &RuntimeConfig, to_file: bool) -> Result<()> {
    if to_file {
        let path = runtime.log_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        subscriber(runtime, Mutex::new(file), false).try_init()?;
    } else {
        subscriber(runtime, std::io::stderr, true).try_init()?;
    }
    Ok(())
}

/// In-memory log sink for tests
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct Captured(std::sync::Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl std::io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
impl Captured {
    pub(crate) fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

/// A subscriber for `filter` whose output lands in the returned [`Captured`]
#[cfg(test)]
pub(crate) fn capture(filter: &str) -> (Captured, impl tracing::Subscriber + Send + Sync + 'static) {
    let captured = Captured::default();
    let sink = captured.clone();
    let runtime = RuntimeConfig {
        log_filter: filter.to_string(),
        ..RuntimeConfig::default()
    };
    (captured, subscriber(&runtime, move || sink.clone(), false))
}
