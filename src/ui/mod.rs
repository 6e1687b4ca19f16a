use std::sync::Arc;

use anyhow::Result;
use tokio::runtime::Handle;

use crate::config::Config;
use crate::store::DocumentStore;

pub mod app;
mod draw;
pub mod edit;
pub mod panes;

/// Run the terminal UI until the user quits.
pub fn run(config: &Config, store: Arc<dyn DocumentStore>, runtime: Handle) -> Result<()> {
    let mut app = app::App::new(config, store, runtime);
    app.run()
}
