pub mod cli;
pub mod core;
pub mod orchestrator;
pub mod providers;
pub mod result_cache;
pub mod store;

use crate::core::config::AppConfig;
use crate::orchestrator::RequestOrchestrator;
use crate::providers::kraken::KrakenProvider;
use crate::result_cache::ResultCache;
use crate::store::KeyValueStore;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Lookup { symbols: Vec<String>, investment: u64 },
    Usage { limit: usize },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Lambo starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let data_path = config.default_data_path()?;
    let store = KeyValueStore::open(&data_path)?;
    let cache = Arc::new(ResultCache::open(&store)?);

    match command {
        AppCommand::Lookup {
            symbols,
            investment,
        } => {
            let source = Arc::new(
                KrakenProvider::new(&config.providers.kraken)
                    .with_request_timeout(config.lookup.request_timeout()),
            );
            let orchestrator = RequestOrchestrator::new(cache, source, &config.lookup);
            cli::lookup::run(&orchestrator, &symbols, investment).await
        }
        AppCommand::Usage { limit } => cli::usage::run(&cache, limit).await,
    }
}
