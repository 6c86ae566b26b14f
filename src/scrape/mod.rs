pub mod extract;

use reqwest::StatusCode;
use std::{error::Error, time::Duration};

pub use extract::{extract_course_content, parse_course_cards, CourseLink};

const USER_AGENT_DEFAULT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0";

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("{url} answered {status}")]
    Status { url: String, status: StatusCode },

    #[error("{0}: course content section not found")]
    MissingContent(String),

    #[error("invalid url {0}")]
    InvalidUrl(String),

    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// A fetched document. Non-200 answers are returned as pages too; callers
/// decide what a status means for them.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: StatusCode,
    pub body: String,
}

/// Blocking page fetch. One request per call, never retried.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<FetchedPage, ScrapeError>;
}

fn get_error(error: &reqwest::Error) -> String {
    match error.source() {
        Some(e) => match e.source() {
            Some(e) => e.to_string(),
            None => e.to_string(),
        },
        None => error.to_string(),
    }
}

pub struct ReqwestFetcher {
    client: reqwest::blocking::Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ScrapeError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT_DEFAULT)
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client })
    }
}

impl Fetcher for ReqwestFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedPage, ScrapeError> {
        let url_parsed =
            reqwest::Url::parse(url).map_err(|_| ScrapeError::InvalidUrl(url.to_string()))?;
        let iden = format!(
            "{}{}",
            url_parsed.host_str().unwrap_or_default(),
            url_parsed.path()
        );

        log::debug!("{iden}: requesting");

        let resp = self
            .client
            .get(url_parsed)
            .send()
            .map_err(|err| ScrapeError::Request {
                url: url.to_string(),
                reason: get_error(&err),
            })?;

        let status = resp.status();
        if !status.is_success() {
            log::debug!("{iden}: {status}");
        }

        let bytes = resp.bytes().map_err(|err| ScrapeError::Request {
            url: url.to_string(),
            reason: get_error(&err),
        })?;

        Ok(FetchedPage {
            status,
            body: String::from_utf8_lossy(&bytes).to_string(),
        })
    }
}

/// Fetches `url` and fails unless the origin answered 200.
pub fn fetch_ok(fetcher: &dyn Fetcher, url: &str) -> Result<String, ScrapeError> {
    let page = fetcher.fetch(url)?;
    if page.status != StatusCode::OK {
        return Err(ScrapeError::Status {
            url: url.to_string(),
            status: page.status,
        });
    }
    Ok(page.body)
}
