use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use homedir::my_home;

use crate::{
    app::AppContext,
    config::Config,
    corpus::CorpusStore,
    crawler::ThreadPacer,
    scrape::ReqwestFetcher,
    semantic::EmbeddingModel,
    storage,
};

/// Factory for wiring the production application context
pub struct AppFactory;

impl AppFactory {
    /// Base directory for config, catalog and model cache.
    pub fn get_base_path() -> Result<String> {
        if let Ok(base_path) = std::env::var("COURSE_SEARCH_BASE_PATH") {
            return Ok(base_path);
        }

        let home = my_home()
            .context("Could not determine home directory")?
            .context("Home directory path is empty")?;

        Ok(format!("{}/.local/share/course-search", home.to_string_lossy()))
    }

    pub fn load_config() -> Result<Config> {
        let base_path = Self::get_base_path()?;
        Config::load_with(&base_path)
            .with_context(|| format!("failed to load config from {base_path}"))
    }

    pub fn corpus_store(config: &Config) -> Result<CorpusStore> {
        let storage = storage::BackendLocal::new(config.base_path())
            .context("Failed to create application base directory")?;
        Ok(CorpusStore::new(Arc::new(storage), &config.corpus_file))
    }

    /// Loads the embedding model. Fails when the model is unknown or cannot be
    /// downloaded; nothing can be served without it.
    pub fn encoder(config: &Config) -> Result<EmbeddingModel> {
        let sem = &config.semantic_search;
        log::info!("Initializing semantic search with model '{}'", sem.model);

        EmbeddingModel::new(
            &sem.model,
            PathBuf::from(config.base_path()),
            Some(Duration::from_secs(sem.download_timeout_secs)),
        )
        .with_context(|| format!("failed to load embedding model '{}'", sem.model))
    }

    pub fn fetcher(config: &Config) -> Result<ReqwestFetcher> {
        ReqwestFetcher::new(config.crawl.request_timeout()).context("failed to build http client")
    }

    /// Full context: catalog loaded and embedded, ready to serve.
    pub fn create_context(config: Config) -> Result<AppContext> {
        let store = Self::corpus_store(&config)?;
        let encoder = Arc::new(Self::encoder(&config)?);
        let fetcher = Arc::new(Self::fetcher(&config)?);

        AppContext::new(config, store, encoder, fetcher, Arc::new(ThreadPacer))
            .context("failed to build search index")
    }
}
