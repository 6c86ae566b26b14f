use std::sync::{Arc, Mutex, TryLockError};

use serde::{Deserialize, Serialize};

use crate::{
    app::AppError,
    config::Config,
    corpus::{CorpusSnapshot, CorpusStore},
    crawler::{CrawlSummary, Crawler, Pacer},
    scrape::Fetcher,
    semantic::{IndexError, SearchIndex, TextEncoder},
};

/// One search result as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub content: String,
    pub similarity: f32,
}

/// Application context built once at startup and shared by every request.
///
/// The search index is immutable for the lifetime of the context. A crawl
/// rewrites the catalog on disk but the index keeps serving the catalog it
/// was built from until the process restarts.
pub struct AppContext {
    config: Config,
    store: CorpusStore,
    encoder: Arc<dyn TextEncoder>,
    fetcher: Arc<dyn Fetcher>,
    pacer: Arc<dyn Pacer>,
    index: Arc<SearchIndex>,
    crawl_lock: Mutex<()>,
}

/// Loads the persisted catalog and embeds it.
///
/// A missing or unreadable catalog is served as an empty one. Encoder
/// failures are returned: the index is never served half built.
pub fn load_index(store: &CorpusStore, encoder: &dyn TextEncoder) -> Result<SearchIndex, IndexError> {
    let corpus = match store.load() {
        Ok(corpus) => corpus,
        Err(err) => {
            log::warn!("{err}; serving an empty catalog");
            CorpusSnapshot::empty()
        }
    };

    log::info!("embedding {} courses", corpus.len());
    let index = SearchIndex::build(corpus, encoder)?;
    if index.is_empty() {
        log::warn!("catalog is empty, run a crawl and restart to enable search");
    } else {
        log::info!("search index ready ({} courses)", index.len());
    }

    Ok(index)
}

impl AppContext {
    pub fn new(
        config: Config,
        store: CorpusStore,
        encoder: Arc<dyn TextEncoder>,
        fetcher: Arc<dyn Fetcher>,
        pacer: Arc<dyn Pacer>,
    ) -> Result<Self, AppError> {
        let index = load_index(&store, encoder.as_ref())?;

        Ok(Self {
            config,
            store,
            encoder,
            fetcher,
            pacer,
            index: Arc::new(index),
            crawl_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    /// Top matches for `keyword`, best first.
    pub fn search(&self, keyword: &str) -> Result<Vec<SearchHit>, AppError> {
        let top_n = self.config.semantic_search.top_n;
        let results = self.index.search(self.encoder.as_ref(), keyword, top_n)?;

        Ok(results
            .into_iter()
            .map(|scored| SearchHit {
                title: scored.record.title.clone(),
                link: scored.record.link.clone(),
                content: scored.record.content.clone(),
                similarity: scored.score,
            })
            .collect())
    }

    /// The catalog as currently persisted, which may be newer than the index.
    pub fn courses(&self) -> CorpusSnapshot {
        self.store.load().unwrap_or_else(|err| {
            log::warn!("{err}");
            CorpusSnapshot::empty()
        })
    }

    /// Runs a full crawl and replaces the persisted catalog.
    ///
    /// Only one crawl runs at a time; a concurrent call fails with
    /// [`AppError::CrawlInProgress`].
    pub fn crawl(&self) -> Result<CrawlSummary, AppError> {
        let _guard = match self.crawl_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(AppError::CrawlInProgress),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let mut crawler = Crawler::new(
            self.fetcher.clone(),
            self.pacer.clone(),
            self.config.crawl.clone(),
        )?;

        let summary = crawler.run(&self.store)?;
        log::info!("restart the server to search the new catalog");

        Ok(summary)
    }
}
