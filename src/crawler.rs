//! Paginated crawl of the course listing site.
//!
//! A crawl walks listing pages `1, 2, 3, ...` until a page has no course
//! cards, then fetches every discovered course page one at a time with the
//! configured pauses in between, and finally replaces the persisted catalog.
//!
//! A listing page that fails to load also ends pagination. That makes a
//! transient outage look like the end of the catalog; both cases are logged
//! differently so they can be told apart afterwards.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

use crate::config::CrawlConfig;
use crate::corpus::{CorpusError, CorpusSnapshot, CorpusStore, CourseRecord};
use crate::scrape::{self, CourseLink, Fetcher, ScrapeError};

/// Sleeps between outbound requests.
pub trait Pacer: Send + Sync {
    fn pause(&self, duration: Duration);
}

/// Blocks the current thread.
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlState {
    Idle,
    Discovering,
    Scraping,
    Completed,
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error("invalid crawl url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid crawl setting: {0}")]
    InvalidSetting(String),

    #[error("failed to persist crawl results: {0}")]
    Persist(#[from] CorpusError),
}

/// Result of a finished crawl, returned to whoever triggered it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrawlSummary {
    pub pages_visited: u32,
    pub discovered: usize,
    pub scraped: usize,
    pub missing_content: usize,
    pub persisted: usize,
    pub location: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// The running search index still reflects the previous catalog until the
    /// process restarts.
    pub index_stale: bool,
}

/// Counters collected while crawling, before anything is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub pages_visited: u32,
    pub discovered: usize,
    pub scraped: usize,
    pub missing_content: usize,
}

/// Lazily walks listing pages and yields the courses found on them.
///
/// Stops at the first page that fails to load or has no cards.
pub struct PageDiscovery<'a> {
    fetcher: &'a dyn Fetcher,
    base_url: String,
    root: Url,
    next_page: u32,
    max_pages: Option<u32>,
    pending: VecDeque<CourseLink>,
    done: bool,
    pages_visited: u32,
}

impl<'a> PageDiscovery<'a> {
    /// Number of listing pages requested so far, the terminating one included.
    pub fn pages_visited(&self) -> u32 {
        self.pages_visited
    }

    fn fetch_next_page(&mut self) {
        let page = self.next_page;

        if let Some(max_pages) = self.max_pages {
            if page > max_pages {
                log::warn!("reached crawl.max_pages ({max_pages}), stopping pagination");
                self.done = true;
                return;
            }
        }

        log::info!("scraping page {page}...");
        self.pages_visited += 1;
        self.next_page += 1;

        let url = format!("{}{page}", self.base_url);
        let html = match scrape::fetch_ok(self.fetcher, &url) {
            Ok(html) => html,
            Err(err) => {
                log::warn!("failed to retrieve page {page}, stopping: {err}");
                self.done = true;
                return;
            }
        };

        let cards = scrape::parse_course_cards(&html, &self.root);
        if cards.is_empty() {
            log::info!("no more cards found on page {page}, stopping");
            self.done = true;
            return;
        }

        log::debug!("page {page}: {} cards", cards.len());
        self.pending.extend(cards);
    }
}

impl Iterator for PageDiscovery<'_> {
    type Item = CourseLink;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(link) = self.pending.pop_front() {
                return Some(link);
            }
            if self.done {
                return None;
            }
            self.fetch_next_page();
        }
    }
}

pub struct Crawler {
    fetcher: Arc<dyn Fetcher>,
    pacer: Arc<dyn Pacer>,
    config: CrawlConfig,
    root: Url,
    state: CrawlState,
}

impl Crawler {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        pacer: Arc<dyn Pacer>,
        config: CrawlConfig,
    ) -> Result<Self, CrawlError> {
        // zero pages would persist an empty catalog over the existing one
        if config.max_pages == Some(0) {
            return Err(CrawlError::InvalidSetting(
                "max_pages must be greater than 0".to_string(),
            ));
        }

        let root = Url::parse(&config.root_url).map_err(|err| CrawlError::InvalidUrl {
            url: config.root_url.clone(),
            reason: err.to_string(),
        })?;

        Ok(Self {
            fetcher,
            pacer,
            config,
            root,
            state: CrawlState::Idle,
        })
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    fn set_state(&mut self, state: CrawlState) {
        log::debug!("crawl state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Listing pages under `base_url`, starting at page 1.
    pub fn discover_pages(&self, base_url: &str) -> PageDiscovery<'_> {
        PageDiscovery {
            fetcher: self.fetcher.as_ref(),
            base_url: base_url.to_string(),
            root: self.root.clone(),
            next_page: 1,
            max_pages: self.config.max_pages,
            pending: VecDeque::new(),
            done: false,
            pages_visited: 0,
        }
    }

    /// Fetches a course page and returns the text of its description region.
    pub fn scrape_content(&self, course_url: &str) -> Result<String, ScrapeError> {
        let html = scrape::fetch_ok(self.fetcher.as_ref(), course_url)?;
        scrape::extract_course_content(&html)
            .ok_or_else(|| ScrapeError::MissingContent(course_url.to_string()))
    }

    /// Discovers and scrapes every course without persisting anything.
    ///
    /// Courses whose page could not be scraped are kept with empty content.
    pub fn crawl(&mut self) -> (CorpusSnapshot, CrawlStats) {
        self.set_state(CrawlState::Discovering);

        let mut discovery = self.discover_pages(&self.config.base_url);
        let links: Vec<CourseLink> = discovery.by_ref().collect();
        let mut stats = CrawlStats {
            pages_visited: discovery.pages_visited(),
            discovered: links.len(),
            ..Default::default()
        };

        log::info!(
            "discovered {} courses on {} pages",
            links.len(),
            stats.pages_visited
        );

        self.set_state(CrawlState::Scraping);

        let batch_size = self.config.batch_size.max(1);
        let mut records = Vec::with_capacity(links.len());

        for (batch_idx, batch) in links.chunks(batch_size).enumerate() {
            if batch_idx > 0 {
                self.pacer.pause(self.config.batch_delay());
            }

            for (item_idx, course) in batch.iter().enumerate() {
                if item_idx > 0 {
                    self.pacer.pause(self.config.item_delay());
                }

                log::info!("scraping course: {} | link: {}", course.title, course.link);

                let content = match self.scrape_content(&course.link) {
                    Ok(content) => {
                        stats.scraped += 1;
                        content
                    }
                    Err(err) => {
                        log::warn!("failed to retrieve content for {}: {err}", course.title);
                        stats.missing_content += 1;
                        String::new()
                    }
                };

                records.push(CourseRecord::new(&course.title, &course.link, content));
            }
        }

        (CorpusSnapshot::new(records), stats)
    }

    /// Full crawl followed by a whole-file replace of the catalog.
    pub fn run(&mut self, store: &CorpusStore) -> Result<CrawlSummary, CrawlError> {
        let started_at = Utc::now();
        let timer = Instant::now();

        let (snapshot, stats) = self.crawl();

        if let Err(err) = store.save(&snapshot) {
            log::error!("crawl failed while saving: {err}");
            self.set_state(CrawlState::Failed);
            return Err(err.into());
        }

        self.set_state(CrawlState::Completed);

        let summary = CrawlSummary {
            pages_visited: stats.pages_visited,
            discovered: stats.discovered,
            scraped: stats.scraped,
            missing_content: stats.missing_content,
            persisted: snapshot.len(),
            location: store.location(),
            started_at,
            duration_ms: timer.elapsed().as_millis() as u64,
            index_stale: true,
        };

        log::info!(
            "crawl {:?}: {} courses ({} without content) in {}ms",
            self.state(),
            summary.persisted,
            summary.missing_content,
            summary.duration_ms
        );

        Ok(summary)
    }
}
