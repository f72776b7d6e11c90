//! Summary statistics over a reply graph
//!
//! In-degree ranks posts by how often they were quoted; per-user aggregates
//! sum those degrees over each user's posts. All rankings are deterministic:
//! counts sort descending with ties kept in node insertion order (i.e.
//! crawl order), so repeated calls over the same graph agree exactly.

use crate::graph::ReplyGraph;
use petgraph::Direction;
use std::collections::HashMap;

/// Summary statistics for a reply graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphStats {
    pub num_nodes: usize,
    pub num_edges: usize,
    /// Most-quoted posts: `(post_id, username, times quoted)`, zero counts dropped
    pub top_quoted_posts: Vec<(String, String, usize)>,
    /// Most-quoted users: `(username, total times their posts were quoted)`
    pub top_quoted_users: Vec<(String, usize)>,
    /// Most active repliers: `(username, total quotes made)`
    pub top_repliers: Vec<(String, usize)>,
}

/// Computes summary statistics for a reply graph
///
/// # Arguments
///
/// * `graph` - The reply graph
/// * `top_n` - Number of entries to keep in each ranking
pub fn compute_graph_stats(graph: &ReplyGraph, top_n: usize) -> GraphStats {
    let g = graph.inner();

    let mut top_quoted_posts: Vec<(String, String, usize)> = g
        .node_indices()
        .map(|ix| {
            let node = &g[ix];
            let quoted = g.neighbors_directed(ix, Direction::Incoming).count();
            (node.post_id.clone(), node.username.clone(), quoted)
        })
        .collect();
    top_quoted_posts.sort_by(|a, b| b.2.cmp(&a.2));
    top_quoted_posts.truncate(top_n);
    top_quoted_posts.retain(|(_, _, count)| *count > 0);

    let mut user_quoted = UserCounts::default();
    let mut user_replies = UserCounts::default();
    for ix in g.node_indices() {
        let username = &g[ix].username;
        user_quoted.add(username, g.neighbors_directed(ix, Direction::Incoming).count());
        user_replies.add(username, g.neighbors_directed(ix, Direction::Outgoing).count());
    }

    GraphStats {
        num_nodes: g.node_count(),
        num_edges: g.edge_count(),
        top_quoted_posts,
        top_quoted_users: user_quoted.top(top_n),
        top_repliers: user_replies.top(top_n),
    }
}

/// Per-username counter preserving first-seen order for stable ties
#[derive(Default)]
struct UserCounts {
    order: Vec<(String, usize)>,
    positions: HashMap<String, usize>,
}

impl UserCounts {
    fn add(&mut self, username: &str, count: usize) {
        match self.positions.get(username) {
            Some(pos) => self.order[*pos].1 += count,
            None => {
                self.positions
                    .insert(username.to_string(), self.order.len());
                self.order.push((username.to_string(), count));
            }
        }
    }

    fn top(mut self, top_n: usize) -> Vec<(String, usize)> {
        self.order.sort_by(|a, b| b.1.cmp(&a.1));
        self.order.truncate(top_n);
        self.order
    }
}
