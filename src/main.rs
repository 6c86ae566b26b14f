use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

mod app;
mod cli;
mod config;
mod corpus;
mod crawler;
mod scrape;
mod semantic;
mod storage;
#[cfg(test)]
mod tests;
mod web;

use app::AppFactory;
use crawler::{Crawler, ThreadPacer};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = cli::Args::parse();
    let mut config = AppFactory::load_config()?;

    match args.command {
        cli::Command::Serve {} => {
            let ctx = AppFactory::create_context(config)?;
            web::start_daemon(ctx)
        }

        cli::Command::Crawl { max_pages } => {
            if let Some(max_pages) = max_pages {
                if max_pages == 0 {
                    bail!("--max-pages must be greater than 0");
                }
                config.crawl.max_pages = Some(max_pages);
            }

            let store = AppFactory::corpus_store(&config)?;
            let fetcher = Arc::new(AppFactory::fetcher(&config)?);
            let mut crawler = Crawler::new(fetcher, Arc::new(ThreadPacer), config.crawl.clone())?;

            let summary = crawler.run(&store).context("crawl failed")?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }

        cli::Command::Search { keyword, top_n } => {
            if keyword.trim().is_empty() {
                bail!("Keyword is required");
            }

            if let Some(top_n) = top_n {
                if top_n == 0 {
                    bail!("--top-n must be greater than 0");
                }
                config.semantic_search.top_n = top_n;
            }

            let ctx = AppFactory::create_context(config)?;
            let hits = ctx.search(&keyword)?;
            println!("{}", serde_json::to_string_pretty(&hits)?);
            Ok(())
        }

        cli::Command::Courses { count } => {
            let store = AppFactory::corpus_store(&config)?;
            let courses = store.load()?;

            if count {
                println!("{} courses", courses.len());
            } else {
                println!("{}", serde_json::to_string_pretty(&courses)?);
            }
            Ok(())
        }
    }
}
