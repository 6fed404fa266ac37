use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{config::Config, counter::CounterStore};

#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    counter: CounterStore,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let counter = CounterStore::new(config.counter_file.clone());
        Self {
            config: Arc::new(config),
            counter,
        }
    }

    /// Creates the upload root and seeds the counter file if absent, the
    /// same way the config bootstraps on first run.
    pub fn initialize_storage(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config.upload_root).with_context(|| {
            format!(
                "failed to create upload root at {}",
                self.config.upload_root.display()
            )
        })?;
        self.counter.initialize().with_context(|| {
            format!(
                "failed to initialize counter file at {}",
                self.counter.path().display()
            )
        })?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn counter(&self) -> &CounterStore {
        &self.counter
    }
}
