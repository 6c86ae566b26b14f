use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::storage::{self, StorageManager};

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_LISTEN: &str = "0.0.0.0:8000";
const DEFAULT_CORPUS_FILE: &str = "courses_data.json";

const DEFAULT_BASE_URL: &str = "https://courses.analyticsvidhya.com/collections?page=";
const DEFAULT_ROOT_URL: &str = "https://courses.analyticsvidhya.com";
/// Items fetched back to back before the longer batch pause.
const DEFAULT_BATCH_SIZE: usize = 31;
const DEFAULT_ITEM_DELAY_SECS: u64 = 2;
const DEFAULT_BATCH_DELAY_SECS: u64 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Same encoder the catalog was historically indexed with.
const DEFAULT_SEMANTIC_MODEL: &str = "all-MiniLM-L6-v2";
const DEFAULT_TOP_N: usize = 5;
/// Default model download timeout in seconds
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Crawl target and politeness settings.
///
/// The delays protect the remote origin. They are not a throughput knob;
/// lowering them mostly gets the crawler rate limited.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CrawlConfig {
    /// Listing URL prefix; the page number is appended (`...?page=` + `1`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Site root that relative course links are resolved against.
    #[serde(default = "default_root_url")]
    pub root_url: String,

    /// Number of detail pages fetched per group.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between two detail page fetches inside a group.
    #[serde(default = "default_item_delay_secs")]
    pub item_delay_secs: u64,

    /// Pause between two groups.
    #[serde(default = "default_batch_delay_secs")]
    pub batch_delay_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Hard stop for pagination. `None` paginates until an empty page.
    #[serde(default)]
    pub max_pages: Option<u32>,
}

impl CrawlConfig {
    pub fn item_delay(&self) -> Duration {
        Duration::from_secs(self.item_delay_secs)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_secs(self.batch_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            root_url: default_root_url(),
            batch_size: DEFAULT_BATCH_SIZE,
            item_delay_secs: DEFAULT_ITEM_DELAY_SECS,
            batch_delay_secs: DEFAULT_BATCH_DELAY_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_pages: None,
        }
    }
}

/// Configuration for semantic search functionality
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SemanticSearchConfig {
    /// `all-MiniLM-L6-v2`, or `all-MiniLM-L6-v2-q` for the quantized build.
    /// Changing it requires a restart so the index is rebuilt with the same model.
    #[serde(default = "default_semantic_model")]
    pub model: String,

    /// Number of results returned per query
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Timeout for model download in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for SemanticSearchConfig {
    fn default() -> Self {
        Self {
            model: default_semantic_model(),
            top_n: DEFAULT_TOP_N,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        }
    }
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_corpus_file() -> String {
    DEFAULT_CORPUS_FILE.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_root_url() -> String {
    DEFAULT_ROOT_URL.to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_item_delay_secs() -> u64 {
    DEFAULT_ITEM_DELAY_SECS
}

fn default_batch_delay_secs() -> u64 {
    DEFAULT_BATCH_DELAY_SECS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_semantic_model() -> String {
    DEFAULT_SEMANTIC_MODEL.to_string()
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_corpus_file")]
    pub corpus_file: String,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub semantic_search: SemanticSearchConfig,

    #[serde(skip_serializing, skip_deserializing)]
    pub(crate) base_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            corpus_file: default_corpus_file(),
            crawl: CrawlConfig::default(),
            semantic_search: SemanticSearchConfig::default(),
            base_path: String::new(),
        }
    }
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        if self.corpus_file.trim().is_empty() {
            bail!("corpus_file must not be empty");
        }

        let crawl = &self.crawl;
        if crawl.batch_size == 0 {
            bail!("crawl.batch_size must be greater than 0");
        }
        if crawl.request_timeout_secs == 0 {
            bail!("crawl.request_timeout_secs must be greater than 0");
        }
        if crawl.max_pages == Some(0) {
            bail!("crawl.max_pages must be greater than 0");
        }
        url::Url::parse(&crawl.root_url)
            .with_context(|| format!("crawl.root_url is not a valid url: {}", crawl.root_url))?;
        url::Url::parse(&format!("{}1", crawl.base_url))
            .with_context(|| format!("crawl.base_url is not a valid url: {}", crawl.base_url))?;

        let sem = &self.semantic_search;
        if sem.top_n == 0 {
            bail!("semantic_search.top_n must be greater than 0");
        }
        if sem.download_timeout_secs == 0 {
            bail!("semantic_search.download_timeout_secs must be greater than 0");
        }

        Ok(())
    }

    /// Loads `config.yaml` from `base_path`, writing defaults first if it does
    /// not exist yet.
    pub fn load_with(base_path: &str) -> anyhow::Result<Self> {
        let store = storage::BackendLocal::new(base_path)
            .with_context(|| format!("failed to create base directory {base_path}"))?;

        // create new if does not exist
        if !store.exists(CONFIG_FILE) {
            store
                .write(CONFIG_FILE, serde_yml::to_string(&Self::default())?.as_bytes())
                .context("failed to write default config")?;
        }

        let config_bytes = store.read(CONFIG_FILE).context("failed to read config")?;
        let config_str = String::from_utf8(config_bytes).context("config file is not valid utf8")?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_string();
        config.validate()?;

        Ok(config)
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Listen address with the port replaced by `$PORT` when it is set.
    pub fn listen_addr(&self) -> String {
        self.listen_addr_with(std::env::var("PORT").ok().as_deref())
    }

    fn listen_addr_with(&self, port: Option<&str>) -> String {
        match port.map(str::trim) {
            Some(port) if !port.is_empty() => {
                let host = self
                    .listen
                    .rsplit_once(':')
                    .map(|(host, _)| host)
                    .unwrap_or("0.0.0.0");
                format!("{host}:{port}")
            }
            _ => self.listen.clone(),
        }
    }
}
