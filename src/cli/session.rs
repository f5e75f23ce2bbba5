// src/cli/session.rs — Controller wired to the terminal and the on-disk history
//
// Applications that bring a render backend drive sessions through the
// controller built here. Records land in the same JSONL file that
// `shaderloop history` reads, and progress goes to stderr.

use std::path::Path;
use std::sync::Arc;

use crate::cli::progress::terminal_progress;
use crate::core::controller::Controller;
use crate::history::{HistoryLog, JsonlHistory};
use crate::infra::config::Config;
use crate::infra::paths;
use crate::provider::ModelProvider;
use crate::render::RenderBackend;

/// Controller recording to `paths::history_path()`.
pub fn terminal_controller(
    provider: Arc<dyn ModelProvider>,
    backend: Box<dyn RenderBackend>,
    config: &Config,
) -> anyhow::Result<Controller> {
    terminal_controller_at(&paths::history_path(), provider, backend, config)
}

pub fn terminal_controller_at(
    history_path: &Path,
    provider: Arc<dyn ModelProvider>,
    backend: Box<dyn RenderBackend>,
    config: &Config,
) -> anyhow::Result<Controller> {
    let history: Arc<dyn HistoryLog> = Arc::new(JsonlHistory::open(history_path)?);
    Ok(Controller::from_config(provider, backend, history, config).with_progress(terminal_progress()))
}
