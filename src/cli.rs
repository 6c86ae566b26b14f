use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about = "Semantic search over a crawled course catalog", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Load the catalog, build the search index and serve the http api.
    Serve {},

    /// Crawl the course site and replace the persisted catalog.
    ///
    /// A running server keeps its index until it is restarted.
    Crawl {
        /// Stop after this many listing pages
        #[clap(long)]
        max_pages: Option<u32>,
    },

    /// Rank the persisted catalog against a phrase.
    Search {
        /// Search phrase
        keyword: String,

        /// Number of results, overrides semantic_search.top_n
        #[clap(short = 'n', long)]
        top_n: Option<usize>,
    },

    /// Print the persisted catalog.
    Courses {
        /// Only print the number of courses
        #[clap(short, long, default_value = "false")]
        count: bool,
    },
}
