//! Crawler module for thread-page fetching and orchestration
//!
//! This module contains the crawl side of the pipeline:
//! - HTTP fetching with a politeness throttle and error classification
//! - Page-URL construction for paginated threads
//! - Cache-aside page retrieval and page-range crawling

mod coordinator;
mod fetcher;

pub use coordinator::{build_page_url, ThreadCrawler};
pub use fetcher::{build_http_client, Fetcher};
