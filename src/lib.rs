//! Vozgraph: a forum-thread crawler with reply-graph analysis
//!
//! This crate crawls paginated XenForo-style discussion threads (voz.vn
//! layout), caches raw HTML on disk, extracts structured post records from
//! the markup, and derives a directed reply graph by resolving quotation
//! references between posts.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod graph;
pub mod parser;

use thiserror::Error;

/// Main error type for vozgraph operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Connection failed for {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Cloudflare blocked request to {url}")]
    CloudflareBlocked { url: String },

    #[error("Thread not found: {url}")]
    ThreadNotFound { url: String },

    #[error("Failed to parse page {url}: {detail}")]
    PageParsing { url: String, detail: String },

    #[error("Page {page} out of range (thread has {total} pages): {url}")]
    PageOutOfRange { page: u32, total: u32, url: String },

    #[error("Corrupted cache entry for {key}: {detail}")]
    CacheRead { key: String, detail: String },

    #[error("Failed to write cache for {key}: {detail}")]
    CacheWrite { key: String, detail: String },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl CrawlError {
    /// Returns the HTTP status code associated with this error, if any.
    ///
    /// `CloudflareBlocked` reports 403 so callers can still bucket it as an
    /// HTTP failure without matching the variant separately.
    pub fn status(&self) -> Option<u16> {
        match self {
            CrawlError::Http { status, .. } => Some(*status),
            CrawlError::CloudflareBlocked { .. } => Some(403),
            CrawlError::ThreadNotFound { .. } => Some(404),
            _ => None,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for vozgraph operations
pub type Result<T> = std::result::Result<T, CrawlError>;

// Re-export commonly used types
pub use cache::PageCache;
pub use config::Config;
pub use crawler::{build_page_url, ThreadCrawler};
pub use graph::stats::{compute_graph_stats, GraphStats};
pub use graph::{build_reply_graph, extract_reply_edges, ReplyEdge, ReplyGraph};
pub use parser::{PageParser, PageRecord, PostRecord};
