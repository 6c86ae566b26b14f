//! Cross-module tests. Everything here runs offline: the site, the encoder
//! and the clock are replaced by the fakes below.

mod search;

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::StatusCode;

use crate::config::CrawlConfig;
use crate::corpus::{CorpusStore, CourseRecord};
use crate::crawler::Pacer;
use crate::scrape::{FetchedPage, Fetcher, ScrapeError};
use crate::semantic::{EmbeddingError, TextEncoder};
use crate::storage::{BackendLocal, StorageManager};

pub const BASE_URL: &str = "https://courses.example.com/collections?page=";
pub const ROOT_URL: &str = "https://courses.example.com";

/// Serves canned pages and records every url it was asked for.
/// Unknown urls fail like an unreachable host.
#[derive(Default)]
pub struct FakeFetcher {
    pages: HashMap<String, (StatusCode, String)>,
    requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, status: StatusCode, body: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), (status, body.into()));
        self
    }

    /// Listing page `n` with one card per title, linking to `/courses/<slug>`.
    pub fn listing(self, n: u32, titles: &[&str]) -> Self {
        let url = format!("{BASE_URL}{n}");
        self.page(&url, StatusCode::OK, listing_html(titles))
    }

    /// Course page whose description region holds `content`.
    pub fn course(self, title: &str, content: &str) -> Self {
        let url = course_url(title);
        self.page(&url, StatusCode::OK, course_html(content))
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn listing_requests(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|url| url.starts_with(BASE_URL))
            .collect()
    }
}

impl Fetcher for FakeFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedPage, ScrapeError> {
        self.requests.lock().unwrap().push(url.to_string());

        match self.pages.get(url) {
            Some((status, body)) => Ok(FetchedPage {
                status: *status,
                body: body.clone(),
            }),
            None => Err(ScrapeError::Request {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            }),
        }
    }
}

pub fn slug(title: &str) -> String {
    title.to_lowercase().replace(' ', "-")
}

pub fn course_url(title: &str) -> String {
    format!("{ROOT_URL}/courses/{}", slug(title))
}

pub fn listing_html(titles: &[&str]) -> String {
    let cards: String = titles
        .iter()
        .map(|title| {
            format!(
                r#"<a class="course-card" href="/courses/{}"><div><h3>{title}</h3></div></a>"#,
                slug(title)
            )
        })
        .collect();

    format!("<html><body><main><div class=\"grid\">{cards}</div></main></body></html>")
}

pub fn course_html(content: &str) -> String {
    format!(
        r#"<html><body><main>
            <section><h1>header</h1></section>
            <section><p>pricing</p></section>
            <section><article><section><p>{content}</p></section></article></section>
        </main></body></html>"#
    )
}

/// Course page without the description region.
pub fn course_html_without_content() -> String {
    "<html><body><main><section>only one section</section></main></body></html>".to_string()
}

/// Records pauses instead of sleeping.
#[derive(Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().unwrap().clone()
    }
}

impl Pacer for RecordingPacer {
    fn pause(&self, duration: Duration) {
        self.pauses.lock().unwrap().push(duration);
    }
}

/// Bag-of-words encoder: each lowercase word adds 1.0 to a hashed bucket.
/// Texts sharing words point in similar directions.
pub struct HashEncoder {
    name: String,
    calls: AtomicUsize,
}

impl HashEncoder {
    pub const DIMENSIONS: usize = 256;

    pub fn new() -> Self {
        Self::named("hash-bow")
    }

    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextEncoder for HashEncoder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> usize {
        Self::DIMENSIONS
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut vector = vec![0.0; Self::DIMENSIONS];
        for word in text.split_whitespace() {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            vector[(hasher.finish() % Self::DIMENSIONS as u64) as usize] += 1.0;
        }
        Ok(vector)
    }
}

/// Crawl settings pointing at the fake site, with a small batch size.
pub fn crawl_config() -> CrawlConfig {
    CrawlConfig {
        base_url: BASE_URL.to_string(),
        root_url: ROOT_URL.to_string(),
        batch_size: 2,
        ..CrawlConfig::default()
    }
}

pub fn create_store() -> (CorpusStore, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let storage = BackendLocal::new(tmp.path().to_str().unwrap()).expect("failed to create storage");
    (CorpusStore::new(Arc::new(storage), "courses_data.json"), tmp)
}

/// Storage whose writes always fail.
pub struct ReadOnlyStorage;

impl StorageManager for ReadOnlyStorage {
    fn write(&self, _ident: &str, _data: &[u8]) -> std::io::Result<()> {
        Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        ))
    }

    fn read(&self, _ident: &str) -> std::io::Result<Vec<u8>> {
        Err(std::io::ErrorKind::NotFound.into())
    }

    fn exists(&self, _ident: &str) -> bool {
        false
    }

    fn location(&self, ident: &str) -> String {
        format!("readonly://{ident}")
    }
}

pub fn record(title: &str, content: &str) -> CourseRecord {
    CourseRecord::new(title, course_url(title), content)
}
