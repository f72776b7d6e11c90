//! Reply graph construction from quotation annotations
//!
//! This module constructs a petgraph-based directed reply graph from the
//! crawled post collection. Edges come from the `<quote …>` annotations the
//! parser embeds in reconstructed post text: a post that quotes another
//! post points at it. The graph feeds the ranking statistics in [`stats`].

pub mod stats;

use crate::parser::PageRecord;
use once_cell::sync::Lazy;
use petgraph::graph::{DiGraph, NodeIndex};
use regex::Regex;
use std::collections::HashMap;

/// Matches the opening tag of a quote annotation. The author attribute is
/// required for an edge; the post_id back-reference is optional here and
/// checked against the post index separately.
static QUOTE_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<quote\s+author="([^"]+)"(?:\s+post_id="(\d+)")?>"#).expect("invalid regex")
});

/// A single reply relationship between two posts (source quotes target)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyEdge {
    pub from_post_id: String,
    pub from_username: String,
    pub to_post_id: String,
    pub to_username: String,
}

/// Node payload in the reply graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostNode {
    pub post_id: String,
    pub username: String,
    /// 1-based page the post was crawled from
    pub page: u32,
}

/// Directed reply graph over a crawled post collection
///
/// Nodes are posts (in crawl order), edges point from the quoting post to
/// the quoted post. Derived once from a post collection plus an edge list;
/// never mutated afterwards.
pub struct ReplyGraph {
    graph: DiGraph<PostNode, ()>,
    index: HashMap<String, NodeIndex>,
}

impl ReplyGraph {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Looks up a node by post id
    pub fn node(&self, post_id: &str) -> Option<&PostNode> {
        self.index.get(post_id).map(|ix| &self.graph[*ix])
    }

    /// Whether the graph contains an edge from one post to another
    pub fn has_edge(&self, from_post_id: &str, to_post_id: &str) -> bool {
        match (self.index.get(from_post_id), self.index.get(to_post_id)) {
            (Some(a), Some(b)) => self.graph.find_edge(*a, *b).is_some(),
            _ => false,
        }
    }

    pub(crate) fn inner(&self) -> &DiGraph<PostNode, ()> {
        &self.graph
    }
}

/// Extracts reply edges from a crawled page collection
///
/// A post-id to username index is built over the whole collection first:
/// once pages are pooled, an early post can quote a later one across page
/// boundaries. Quotes whose referenced post is outside the collection are
/// dropped, not backfilled.
///
/// # Arguments
///
/// * `pages` - Crawled pages, in page order
/// * `exclude_self_quotes` - Skip quotes where the author quotes themselves
pub fn extract_reply_edges(pages: &[PageRecord], exclude_self_quotes: bool) -> Vec<ReplyEdge> {
    let mut post_user_map: HashMap<&str, &str> = HashMap::new();
    for page in pages {
        for post in &page.posts {
            post_user_map.insert(&post.post_id, &post.username);
        }
    }

    let mut edges = Vec::new();
    for page in pages {
        for post in &page.posts {
            for captures in QUOTE_TAG_RE.captures_iter(&post.content_text) {
                let quoted_author = &captures[1];
                if exclude_self_quotes && quoted_author == post.username {
                    continue;
                }
                let Some(quoted_post_id) = captures.get(2) else {
                    continue;
                };
                if post_user_map.contains_key(quoted_post_id.as_str()) {
                    edges.push(ReplyEdge {
                        from_post_id: post.post_id.clone(),
                        from_username: post.username.clone(),
                        to_post_id: quoted_post_id.as_str().to_string(),
                        to_username: quoted_author.to_string(),
                    });
                }
            }
        }
    }

    edges
}

/// Builds the directed reply graph for a page collection and edge list
///
/// One node is added per post, in crawl order, carrying the username and
/// source page number. An edge is added only when both endpoints are
/// existing nodes; this re-check keeps the builder safe when handed a
/// partial post collection. The edge set is deduplicated: a post quoting
/// the same target more than once still yields a single edge.
pub fn build_reply_graph(pages: &[PageRecord], edges: &[ReplyEdge]) -> ReplyGraph {
    let mut graph = DiGraph::new();
    let mut index = HashMap::new();

    for page in pages {
        for post in &page.posts {
            let ix = graph.add_node(PostNode {
                post_id: post.post_id.clone(),
                username: post.username.clone(),
                page: page.current_page,
            });
            index.insert(post.post_id.clone(), ix);
        }
    }

    for edge in edges {
        if let (Some(from), Some(to)) = (index.get(&edge.from_post_id), index.get(&edge.to_post_id))
        {
            graph.update_edge(*from, *to, ());
        }
    }

    ReplyGraph { graph, index }
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use crate::parser::{PageRecord, PostRecord};

    /// Builds a minimal post record for graph tests
    pub fn post(post_id: &str, username: &str, content_text: &str) -> PostRecord {
        PostRecord {
            post_id: post_id.to_string(),
            post_url: format!("https://voz.vn/t/example.1/post-{post_id}"),
            datetime: String::new(),
            timestamp: 0,
            username: username.to_string(),
            user_id: None,
            user_url: String::new(),
            user_title: String::new(),
            user_banner: String::new(),
            avatar_url: String::new(),
            content_text: content_text.to_string(),
            content_html: String::new(),
            images: Vec::new(),
            links: Vec::new(),
            reaction_types: Vec::new(),
            reaction_count: 0,
        }
    }

    pub fn page(current_page: u32, total_pages: u32, posts: Vec<PostRecord>) -> PageRecord {
        PageRecord {
            current_page,
            total_pages,
            posts,
            thread_url: format!("https://voz.vn/t/example.1/page-{current_page}"),
        }
    }
}
