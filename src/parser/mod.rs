//! HTML parser for XenForo thread pages
//!
//! This module turns the raw HTML of one thread page into a structured
//! [`PageRecord`]: pagination position plus an ordered list of
//! [`PostRecord`]s. The delicate part, quotation-aware body reconstruction,
//! lives in [`quotes`].

pub mod quotes;

use crate::{CrawlError, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Parsed data for a single forum post
#[derive(Debug, Clone, PartialEq)]
pub struct PostRecord {
    /// Numeric post identifier (as a string, e.g. `"27772183"`)
    pub post_id: String,
    /// Absolute permalink to the post
    pub post_url: String,
    /// ISO-8601 datetime string from the post's `<time>` element
    pub datetime: String,
    /// Unix timestamp of the post, `0` when absent
    pub timestamp: i64,
    /// Author username
    pub username: String,
    /// Numeric author id parsed from the profile link, when parseable
    pub user_id: Option<u64>,
    /// Absolute URL of the author's profile
    pub user_url: String,
    /// Author title text (empty when absent)
    pub user_title: String,
    /// Author banner text (empty when absent)
    pub user_banner: String,
    /// Avatar image URL as it appears in the markup
    pub avatar_url: String,
    /// Reconstructed plain-text body with inline `<quote>` annotations
    pub content_text: String,
    /// Raw body markup
    pub content_html: String,
    /// Content image URLs, in document order (emoji/reaction icons excluded)
    pub images: Vec<String>,
    /// Outbound content link URLs, in document order
    pub links: Vec<String>,
    /// Distinct reaction-type labels, in first-seen order
    pub reaction_types: Vec<String>,
    /// Total reaction count (named users plus the "N others" overflow)
    pub reaction_count: u32,
}

/// Parse result for one page of a thread
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    /// 1-based page number of this page
    pub current_page: u32,
    /// Total page count as reported by the site
    pub total_pages: u32,
    /// Posts on this page, in document order
    pub posts: Vec<PostRecord>,
    /// URL the page was fetched from
    pub thread_url: String,
}

/// Parser for thread pages, holding its selectors and patterns
///
/// All CSS selectors and regexes are compiled once here and reused for
/// every page; the parser itself is stateless across calls.
pub struct PageParser {
    base_url: Url,

    article: Selector,
    page_nav: Selector,
    current_page_link: Selector,
    last_page_link: Selector,
    permalink: Selector,
    time_el: Selector,
    user_link: Selector,
    user_title: Selector,
    user_banner: Selector,
    avatar_img: Selector,
    body: Selector,
    body_img: Selector,
    body_link: Selector,
    reactions_bar: Selector,
    reaction_img: Selector,
    reactions_link: Selector,
    reactions_named: Selector,
    quote_block: Selector,
    quote_expanded: Selector,
    quote_content: Selector,

    quoted_post_id_re: Regex,
    user_id_re: Regex,
    others_re: Regex,
}

impl PageParser {
    /// Creates a parser resolving relative links against `base_url`
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            crate::ConfigError::Validation(format!("invalid base URL {base_url}: {e}"))
        })?;

        Ok(Self {
            base_url,

            article: sel("article.message"),
            page_nav: sel("ul.pageNav-main"),
            current_page_link: sel("li.pageNav-page--current a"),
            last_page_link: sel("li:last-child a"),
            permalink: sel("header.message-attribution a[href*='post-']"),
            time_el: sel("time.u-dt"),
            user_link: sel("a.username"),
            user_title: sel(".userTitle"),
            user_banner: sel(".userBanner span"),
            avatar_img: sel(".message-avatar img"),
            body: sel(".message-body .bbWrapper"),
            body_img: sel("img"),
            body_link: sel("a.link"),
            reactions_bar: sel(".reactionsBar"),
            reaction_img: sel(".reaction img"),
            reactions_link: sel(".reactionsBar-link"),
            reactions_named: sel(".reactionsBar-link bdi"),
            quote_block: sel(".bbCodeBlock--quote"),
            quote_expanded: sel(".bbCodeBlock-expandContent"),
            quote_content: sel(".bbCodeBlock-content"),

            quoted_post_id_re: re(r"post:\s*(\d+)"),
            user_id_re: re(r"\.(\d+)/?$"),
            others_re: re(r"(\d+)\s+others?"),
        })
    }

    /// Parses the full HTML of one thread page
    ///
    /// # Arguments
    ///
    /// * `html` - Raw page markup
    /// * `source_url` - URL the markup was fetched from (used in errors and
    ///   carried into the result)
    ///
    /// # Errors
    ///
    /// [`CrawlError::PageParsing`] if no post elements are found. Valid
    /// threads always carry at least the opening post, so an empty page
    /// means the markup is not a thread page at all.
    pub fn parse_page(&self, html: &str, source_url: &str) -> Result<PageRecord> {
        let document = Html::parse_document(html);

        let articles: Vec<ElementRef> = document.select(&self.article).collect();
        if articles.is_empty() {
            return Err(CrawlError::PageParsing {
                url: source_url.to_string(),
                detail: "no posts found on page".to_string(),
            });
        }

        let (current_page, total_pages) = self.parse_pagination(&document);
        let posts = articles.iter().map(|a| self.parse_post(*a)).collect();

        Ok(PageRecord {
            current_page,
            total_pages,
            posts,
            thread_url: source_url.to_string(),
        })
    }

    /// Reads `(current_page, total_pages)` from the pagination bar
    ///
    /// A page without a pagination bar is a single-page thread: `(1, 1)`.
    /// Unparsable labels fall back leniently (current to 1, total to
    /// current) rather than failing the whole page.
    fn parse_pagination(&self, document: &Html) -> (u32, u32) {
        let Some(nav) = document.select(&self.page_nav).next() else {
            return (1, 1);
        };

        let current_label = nav
            .select(&self.current_page_link)
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();
        let last_label = nav
            .select(&self.last_page_link)
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();

        let current_page = match current_label.trim().parse::<u32>() {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!("Unparsable current-page label {:?}, assuming 1", current_label);
                1
            }
        };
        let total_pages = match last_label.trim().parse::<u32>() {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!(
                    "Unparsable last-page label {:?}, assuming {}",
                    last_label,
                    current_page
                );
                current_page
            }
        };

        (current_page, total_pages)
    }

    /// Parses a single `<article class="message">` element
    fn parse_post(&self, article: ElementRef) -> PostRecord {
        let post_id = article
            .value()
            .attr("data-content")
            .unwrap_or("")
            .trim_start_matches("post-")
            .to_string();

        let post_url = article
            .select(&self.permalink)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| self.resolve(href))
            .unwrap_or_default();

        let (datetime, timestamp) = article
            .select(&self.time_el)
            .next()
            .map(|t| {
                let datetime = t.value().attr("datetime").unwrap_or("").to_string();
                let timestamp = t
                    .value()
                    .attr("data-timestamp")
                    .and_then(|v| v.parse::<i64>().ok())
                    .unwrap_or(0);
                (datetime, timestamp)
            })
            .unwrap_or_default();

        let username = article.value().attr("data-author").unwrap_or("").to_string();
        let user_link = article
            .select(&self.user_link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .unwrap_or("");
        let user_id = self
            .user_id_re
            .captures(user_link)
            .and_then(|c| c[1].parse::<u64>().ok());
        let user_url = if user_link.is_empty() {
            String::new()
        } else {
            self.resolve(user_link)
        };

        let user_title = article
            .select(&self.user_title)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        let user_banner = article
            .select(&self.user_banner)
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();
        let avatar_url = article
            .select(&self.avatar_img)
            .next()
            .and_then(|img| img.value().attr("src"))
            .unwrap_or("")
            .to_string();

        let body = article.select(&self.body).next();
        let content_html = body.map(|b| b.html()).unwrap_or_default();
        let content_text = self.reconstruct_body(body);

        let images = body
            .map(|b| {
                b.select(&self.body_img)
                    .filter_map(|img| img.value().attr("src"))
                    .filter(|src| {
                        !src.is_empty() && !src.contains("smilies") && !src.contains("reactions")
                    })
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let links = body
            .map(|b| {
                b.select(&self.body_link)
                    .filter_map(|a| a.value().attr("href"))
                    .filter(|href| !href.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let (reaction_types, reaction_count) = self.parse_reactions(article);

        PostRecord {
            post_id,
            post_url,
            datetime,
            timestamp,
            username,
            user_id,
            user_url,
            user_title,
            user_banner,
            avatar_url,
            content_text,
            content_html,
            images,
            links,
            reaction_types,
            reaction_count,
        }
    }

    /// Extracts reaction labels and the total reaction count
    ///
    /// The reactions bar names a handful of reacting users and may end with
    /// an "and N others" phrase; the total is the named users plus that
    /// overflow count.
    fn parse_reactions(&self, article: ElementRef) -> (Vec<String>, u32) {
        let Some(bar) = article.select(&self.reactions_bar).next() else {
            return (Vec::new(), 0);
        };

        let mut reaction_types: Vec<String> = Vec::new();
        for img in bar.select(&self.reaction_img) {
            let rtype = img
                .value()
                .attr("alt")
                .filter(|v| !v.is_empty())
                .or_else(|| img.value().attr("title"))
                .unwrap_or("");
            if !rtype.is_empty() && !reaction_types.iter().any(|t| t == rtype) {
                reaction_types.push(rtype.to_string());
            }
        }

        let summary_text = bar
            .select(&self.reactions_link)
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();
        let named_users = bar.select(&self.reactions_named).count() as u32;

        let total = match self.others_re.captures(&summary_text) {
            Some(c) => c[1].parse::<u32>().unwrap_or(0) + named_users,
            None => named_users,
        };

        (reaction_types, total)
    }

    /// Resolves an href against the forum base URL
    fn resolve(&self, href: &str) -> String {
        self.base_url
            .join(href)
            .map(|u| u.to_string())
            .unwrap_or_default()
    }
}

fn sel(selector: &str) -> Selector {
    Selector::parse(selector).expect("invalid selector")
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("invalid regex")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> PageParser {
        PageParser::new("https://voz.vn").unwrap()
    }

    fn post_html(post_id: &str, author: &str, body: &str) -> String {
        format!(
            r#"<article class="message" data-content="post-{post_id}" data-author="{author}">
              <div class="message-avatar"><img src="/data/avatars/s/99/{post_id}.jpg" /></div>
              <a class="username" href="/u/{author}.4242/">{author}</a>
              <span class="userTitle">Senior Member</span>
              <div class="userBanner"><span>Moderator</span></div>
              <header class="message-attribution">
                <a href="/t/example.1/post-{post_id}">
                  <time class="u-dt" datetime="2024-05-01T10:00:00+0700" data-timestamp="1714532400">May 1, 2024</time>
                </a>
              </header>
              <div class="message-body"><div class="bbWrapper">{body}</div></div>
            </article>"#
        )
    }

    fn page_html(posts: &[String], pagination: Option<&str>) -> String {
        format!(
            "<html><body>{}{}</body></html>",
            pagination.unwrap_or(""),
            posts.join("\n")
        )
    }

    #[test]
    fn test_no_posts_is_parsing_error() {
        let result = parser().parse_page("<html><body><p>nothing</p></body></html>", "https://voz.vn/t/x.1/");
        assert!(matches!(result, Err(CrawlError::PageParsing { .. })));
    }

    #[test]
    fn test_single_page_thread_defaults_pagination() {
        let html = page_html(&[post_html("100", "alice", "hello")], None);
        let page = parser().parse_page(&html, "https://voz.vn/t/x.1/").unwrap();
        assert_eq!(page.current_page, 1);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.posts.len(), 1);
    }

    #[test]
    fn test_pagination_extraction() {
        let nav = r#"<ul class="pageNav-main">
            <li class="pageNav-page"><a href="/t/x.1/">1</a></li>
            <li class="pageNav-page pageNav-page--current"><a href="/t/x.1/page-2">2</a></li>
            <li class="pageNav-page"><a href="/t/x.1/page-7">7</a></li>
        </ul>"#;
        let html = page_html(&[post_html("100", "alice", "hi")], Some(nav));
        let page = parser().parse_page(&html, "https://voz.vn/t/x.1/page-2").unwrap();
        assert_eq!(page.current_page, 2);
        assert_eq!(page.total_pages, 7);
    }

    #[test]
    fn test_pagination_lenient_fallback() {
        // Non-numeric last-page label falls back to the current page
        let nav = r#"<ul class="pageNav-main">
            <li class="pageNav-page pageNav-page--current"><a href="/t/x.1/page-3">3</a></li>
            <li><a href="/t/x.1/page-4">Next</a></li>
        </ul>"#;
        let html = page_html(&[post_html("100", "alice", "hi")], Some(nav));
        let page = parser().parse_page(&html, "https://voz.vn/t/x.1/page-3").unwrap();
        assert_eq!(page.current_page, 3);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn test_post_fields() {
        let html = page_html(&[post_html("27772183", "alice", "hello world")], None);
        let page = parser().parse_page(&html, "https://voz.vn/t/x.1/").unwrap();
        let post = &page.posts[0];

        assert_eq!(post.post_id, "27772183");
        assert_eq!(post.post_url, "https://voz.vn/t/example.1/post-27772183");
        assert_eq!(post.datetime, "2024-05-01T10:00:00+0700");
        assert_eq!(post.timestamp, 1714532400);
        assert_eq!(post.username, "alice");
        assert_eq!(post.user_id, Some(4242));
        assert_eq!(post.user_url, "https://voz.vn/u/alice.4242/");
        assert_eq!(post.user_title, "Senior Member");
        assert_eq!(post.user_banner, "Moderator");
        assert_eq!(post.avatar_url, "/data/avatars/s/99/27772183.jpg");
        assert_eq!(post.content_text, "hello world");
        assert!(post.content_html.contains("hello world"));
    }

    #[test]
    fn test_missing_time_defaults() {
        let html = page_html(
            &[r#"<article class="message" data-content="post-5" data-author="bob">
                <div class="message-body"><div class="bbWrapper">text</div></div>
            </article>"#
                .to_string()],
            None,
        );
        let page = parser().parse_page(&html, "https://voz.vn/t/x.1/").unwrap();
        let post = &page.posts[0];
        assert_eq!(post.datetime, "");
        assert_eq!(post.timestamp, 0);
        assert_eq!(post.user_id, None);
        assert_eq!(post.user_url, "");
    }

    #[test]
    fn test_image_extraction_skips_decorations() {
        let body = r#"<img src="https://i.imgur.com/photo.jpg" />
            <img src="/styles/smilies/grin.png" />
            <img src="/styles/reactions/like.png" />
            <img src="https://i.imgur.com/second.png" />"#;
        let html = page_html(&[post_html("100", "alice", body)], None);
        let page = parser().parse_page(&html, "https://voz.vn/t/x.1/").unwrap();
        assert_eq!(
            page.posts[0].images,
            vec![
                "https://i.imgur.com/photo.jpg".to_string(),
                "https://i.imgur.com/second.png".to_string()
            ]
        );
    }

    #[test]
    fn test_link_extraction_only_content_links() {
        let body = r#"<a class="link" href="https://example.com/a">a</a>
            <a href="https://example.com/plain">plain anchor</a>
            <a class="link" href="https://example.com/b">b</a>"#;
        let html = page_html(&[post_html("100", "alice", body)], None);
        let page = parser().parse_page(&html, "https://voz.vn/t/x.1/").unwrap();
        assert_eq!(
            page.posts[0].links,
            vec![
                "https://example.com/a".to_string(),
                "https://example.com/b".to_string()
            ]
        );
    }

    #[test]
    fn test_reactions_with_overflow() {
        let article = r#"<article class="message" data-content="post-9" data-author="carol">
            <div class="message-body"><div class="bbWrapper">nice</div></div>
            <div class="reactionsBar">
                <span class="reaction"><img src="/r/1.png" alt="Like" /></span>
                <span class="reaction"><img src="/r/2.png" alt="Haha" /></span>
                <span class="reaction"><img src="/r/1.png" alt="Like" /></span>
                <a class="reactionsBar-link"><bdi>dave</bdi>, <bdi>erin</bdi> and 12 others</a>
            </div>
        </article>"#;
        let html = page_html(&[article.to_string()], None);
        let page = parser().parse_page(&html, "https://voz.vn/t/x.1/").unwrap();
        let post = &page.posts[0];
        assert_eq!(post.reaction_types, vec!["Like".to_string(), "Haha".to_string()]);
        assert_eq!(post.reaction_count, 14);
    }

    #[test]
    fn test_reactions_named_only() {
        let article = r#"<article class="message" data-content="post-9" data-author="carol">
            <div class="message-body"><div class="bbWrapper">nice</div></div>
            <div class="reactionsBar">
                <span class="reaction"><img src="/r/1.png" alt="Like" /></span>
                <a class="reactionsBar-link"><bdi>dave</bdi> and <bdi>erin</bdi></a>
            </div>
        </article>"#;
        let html = page_html(&[article.to_string()], None);
        let page = parser().parse_page(&html, "https://voz.vn/t/x.1/").unwrap();
        assert_eq!(page.posts[0].reaction_count, 2);
    }

    #[test]
    fn test_posts_keep_document_order() {
        let html = page_html(
            &[
                post_html("1", "alice", "first"),
                post_html("2", "bob", "second"),
                post_html("3", "carol", "third"),
            ],
            None,
        );
        let page = parser().parse_page(&html, "https://voz.vn/t/x.1/").unwrap();
        let ids: Vec<&str> = page.posts.iter().map(|p| p.post_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }
}
