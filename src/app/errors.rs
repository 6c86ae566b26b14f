use crate::{
    crawler::CrawlError,
    semantic::{IndexError, SearchError},
};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("a crawl is already running")]
    CrawlInProgress,

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("crawl failed: {0}")]
    Crawl(#[from] CrawlError),

    #[error("index build failed: {0}")]
    Index(#[from] IndexError),

    #[error("io error: {0:?}")]
    IO(#[from] std::io::Error),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}
