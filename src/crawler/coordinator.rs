//! Thread crawler - page-level crawl orchestration
//!
//! [`ThreadCrawler`] composes the fetcher, the page cache, and the page
//! parser to retrieve one page or a page range of a thread. Pagination is
//! validated against the total the server reports inside the page itself:
//! the forum silently serves the last valid page instead of erroring on an
//! out-of-range request, so transport status alone proves nothing.

use crate::cache::PageCache;
use crate::config::Config;
use crate::crawler::fetcher::Fetcher;
use crate::parser::{PageParser, PageRecord};
use crate::{CrawlError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static PAGE_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/page-\d+/?$").expect("invalid regex"));

/// Builds the URL for one page of a thread
///
/// Any existing `/page-N` suffix and trailing slash are stripped from
/// `thread_url` first; page 1 maps to the bare thread URL with a trailing
/// slash, page N > 1 appends `/page-N`.
pub fn build_page_url(thread_url: &str, page: u32) -> String {
    let trimmed = thread_url.trim_end_matches('/');
    let base = PAGE_SUFFIX_RE.replace(trimmed, "");
    if page <= 1 {
        format!("{base}/")
    } else {
        format!("{base}/page-{page}")
    }
}

/// Crawls a forum thread one page at a time, with caching
///
/// The pipeline is sequential: pages are fetched in order, one at a time,
/// and the first failure aborts the whole call.
pub struct ThreadCrawler {
    fetcher: Fetcher,
    cache: PageCache,
    parser: PageParser,
}

impl ThreadCrawler {
    /// Creates a crawler from a validated configuration
    pub fn new(config: Config) -> Result<Self> {
        crate::config::validate(&config)?;

        Ok(Self {
            fetcher: Fetcher::new(&config.crawler)?,
            cache: PageCache::new(&config.cache)?,
            parser: PageParser::new(&config.crawler.base_url)?,
        })
    }

    /// Fetches the raw HTML for `url`, consulting the cache first
    ///
    /// On a network fetch the body is written back to the cache
    /// unconditionally, refreshing whatever was there. Cache hits do not
    /// touch the fetcher's throttle clock.
    pub async fn fetch_html(&mut self, url: &str, use_cache: bool) -> Result<String> {
        if use_cache {
            if let Some(html) = self.cache.get(url)? {
                tracing::debug!("Cache hit for {}", url);
                return Ok(html);
            }
            tracing::debug!("Cache miss for {}", url);
        }

        let html = self.fetcher.fetch(url).await?;
        self.cache.put(url, &html)?;
        Ok(html)
    }

    /// Crawls a single page of a thread
    ///
    /// # Arguments
    ///
    /// * `thread_url` - Base thread URL (any `/page-N` suffix is stripped)
    /// * `page` - 1-based page number
    ///
    /// # Errors
    ///
    /// [`CrawlError::PageOutOfRange`] if `page` exceeds the total page
    /// count reported inside the served page, plus any fetch or parse
    /// error from the underlying components.
    pub async fn crawl_page(&mut self, thread_url: &str, page: u32) -> Result<PageRecord> {
        self.crawl_page_with_cache(thread_url, page, true).await
    }

    /// [`Self::crawl_page`] with an explicit cache opt-out
    pub async fn crawl_page_with_cache(
        &mut self,
        thread_url: &str,
        page: u32,
        use_cache: bool,
    ) -> Result<PageRecord> {
        let url = build_page_url(thread_url, page);
        let html = self.fetch_html(&url, use_cache).await?;
        let record = self.parser.parse_page(&html, &url)?;

        if page > record.total_pages {
            return Err(CrawlError::PageOutOfRange {
                page,
                total: record.total_pages,
                url: thread_url.to_string(),
            });
        }

        Ok(record)
    }

    /// Crawls a range of pages, in page order
    ///
    /// The start page is fetched first to discover the thread's total page
    /// count; the effective end page is the smaller of `end_page` (or the
    /// discovered total when `None`) and that total. Any page failure
    /// aborts the whole range.
    pub async fn crawl_pages(
        &mut self,
        thread_url: &str,
        start_page: u32,
        end_page: Option<u32>,
    ) -> Result<Vec<PageRecord>> {
        let first = self.crawl_page(thread_url, start_page).await?;
        let total = first.total_pages;
        tracing::info!("Thread {} reports {} pages", thread_url, total);

        let last = end_page.unwrap_or(total).min(total);
        let mut results = vec![first];

        for page in (start_page + 1)..=last {
            let record = self.crawl_page(thread_url, page).await?;
            results.push(record);
            tracing::info!("Crawled page {}/{} of {}", page, last, thread_url);
        }

        Ok(results)
    }

    /// Invalidates the cached copy of a specific page
    ///
    /// Returns `true` if an entry existed.
    pub fn invalidate_page(&self, thread_url: &str, page: u32) -> bool {
        self.cache.invalidate(&build_page_url(thread_url, page))
    }

    /// Removes all cached entries, returning the number deleted
    pub fn clear_cache(&self) -> u64 {
        self.cache.clear()
    }
}
