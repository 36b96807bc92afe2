//! Co-change graph construction.
//!
//! Files modified in the same commits are mined for frequent itemsets; every
//! pair inside a frequent itemset becomes an undirected edge. Nodes are then
//! annotated with their hotspot score, PageRank, and Louvain community.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use churnmap_core::HotgraphConfig;
use petgraph::graph::{NodeIndex, UnGraph};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, info};

use crate::community::louvain;
use crate::hotspots::HotspotEntry;
use crate::patterns::{mine_unbounded, mine_with_retry, MiningOutcome, RetryPolicy};
use crate::table::FileChangeRecord;

const DAMPING: f64 = 0.85;
const MAX_ITERATIONS: usize = 100;
const TOLERANCE: f64 = 1e-6;

/// Settings for [`build_hotgraph`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HotgraphOptions {
    /// Rank of the file whose occurrence count anchors the support threshold.
    pub rank: usize,
    /// Floor for the rank-derived threshold.
    pub min_threshold: usize,
    /// Mine once without a deadline instead of retrying.
    pub stop_retry: bool,
    /// Deadline and escalation when retrying.
    pub retry: RetryPolicy,
}

impl Default for HotgraphOptions {
    fn default() -> Self {
        Self::from(&HotgraphConfig::default())
    }
}

impl From<&HotgraphConfig> for HotgraphOptions {
    fn from(config: &HotgraphConfig) -> Self {
        Self {
            rank: config.rank,
            min_threshold: config.min_threshold,
            stop_retry: false,
            retry: RetryPolicy::from(config),
        }
    }
}

/// A file in the co-change graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    /// Rename-resolved path.
    pub file_name: String,
    /// Hotspot score, 0 when the file has no hotspot entry.
    pub hotspot: f64,
    /// Weighted PageRank over the graph.
    pub pagerank: f64,
    /// Louvain community.
    pub community_id: usize,
    /// Number of co-change partners.
    pub degree: usize,
}

/// An undirected co-change relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoChangeEdge {
    /// Lexicographically smaller endpoint.
    pub source: String,
    /// Lexicographically larger endpoint.
    pub target: String,
    /// Commits touching both files.
    pub weight: usize,
    /// Frequent itemsets containing both files.
    pub itemsets: usize,
}

/// Annotated co-change graph.
///
/// # Examples
///
/// ```
/// use churnmap_history::hotgraph::CoChangeGraph;
///
/// let graph = CoChangeGraph::default();
/// assert!(graph.is_empty());
/// assert!(graph.communities().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CoChangeGraph {
    graph: UnGraph<FileNode, CoChangeEdge>,
    index: HashMap<String, NodeIndex>,
}

impl CoChangeGraph {
    /// Number of files.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of co-change relations.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Nodes in insertion (name) order.
    pub fn nodes(&self) -> impl Iterator<Item = &FileNode> {
        self.graph.node_weights()
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &CoChangeEdge> {
        self.graph.edge_weights()
    }

    /// Look up a node by file name.
    pub fn node(&self, file_name: &str) -> Option<&FileNode> {
        self.index.get(file_name).map(|idx| &self.graph[*idx])
    }

    /// Edge between two files, in either order.
    pub fn edge(&self, a: &str, b: &str) -> Option<&CoChangeEdge> {
        let (ia, ib) = (self.index.get(a)?, self.index.get(b)?);
        self.graph.find_edge(*ia, *ib).map(|e| &self.graph[e])
    }

    /// Nodes sorted by hotspot descending, then PageRank descending.
    pub fn ranked_nodes(&self) -> Vec<&FileNode> {
        let mut nodes: Vec<&FileNode> = self.nodes().collect();
        nodes.sort_by(|a, b| {
            b.hotspot
                .total_cmp(&a.hotspot)
                .then_with(|| b.pagerank.total_cmp(&a.pagerank))
                .then_with(|| a.file_name.cmp(&b.file_name))
        });
        nodes
    }

    /// File names grouped by community id.
    pub fn communities(&self) -> BTreeMap<usize, Vec<String>> {
        let mut groups: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for node in self.nodes() {
            groups
                .entry(node.community_id)
                .or_default()
                .push(node.file_name.clone());
        }
        groups
    }

    fn build(pairs: BTreeMap<(String, String), (usize, usize)>, hotspots: &[HotspotEntry]) -> Self {
        let scores: HashMap<&str, f64> = hotspots
            .iter()
            .map(|h| (h.file_name.as_str(), h.hotspot))
            .collect();

        let names: BTreeSet<&String> = pairs.keys().flat_map(|(a, b)| [a, b]).collect();
        let mut graph: UnGraph<FileNode, CoChangeEdge> = UnGraph::default();
        let mut index: HashMap<String, NodeIndex> = HashMap::new();
        for name in names {
            let idx = graph.add_node(FileNode {
                file_name: name.clone(),
                hotspot: scores.get(name.as_str()).copied().unwrap_or(0.0),
                pagerank: 0.0,
                community_id: 0,
                degree: 0,
            });
            index.insert(name.clone(), idx);
        }

        for ((a, b), (weight, itemsets)) in pairs {
            let (ia, ib) = (index[&a], index[&b]);
            graph.add_edge(
                ia,
                ib,
                CoChangeEdge {
                    source: a,
                    target: b,
                    weight,
                    itemsets,
                },
            );
        }

        let mut this = Self { graph, index };
        this.annotate();
        this
    }

    fn weighted_edges(&self) -> Vec<(usize, usize, f64)> {
        self.graph
            .edge_indices()
            .filter_map(|e| {
                let (a, b) = self.graph.edge_endpoints(e)?;
                Some((a.index(), b.index(), self.graph[e].weight as f64))
            })
            .collect()
    }

    fn annotate(&mut self) {
        let n = self.graph.node_count();
        let edges = self.weighted_edges();
        let ranks = pagerank(n, &edges);
        let communities = louvain(n, &edges);

        for idx in self.graph.node_indices().collect::<Vec<_>>() {
            let degree = self.graph.neighbors(idx).count();
            let node = &mut self.graph[idx];
            node.pagerank = ranks[idx.index()];
            node.community_id = communities[idx.index()];
            node.degree = degree;
        }
    }
}

impl Serialize for CoChangeGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CoChangeGraph", 2)?;
        state.serialize_field("nodes", &self.nodes().collect::<Vec<_>>())?;
        state.serialize_field("edges", &self.edges().collect::<Vec<_>>())?;
        state.end()
    }
}

/// PageRank over a weighted undirected graph.
///
/// Each undirected edge is followed in both directions, proportionally to
/// weight. Mass at nodes without edges is spread uniformly. Iterates until
/// the L1 change drops below `n * 1e-6`.
pub(crate) fn pagerank(n: usize, edges: &[(usize, usize, f64)]) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    let n_f64 = n as f64;
    let mut strength = vec![0.0; n];
    for &(a, b, w) in edges {
        strength[a] += w;
        strength[b] += w;
    }

    let mut ranks = vec![1.0 / n_f64; n];
    for _ in 0..MAX_ITERATIONS {
        let dangling: f64 = (0..n).filter(|i| strength[*i] == 0.0).map(|i| ranks[i]).sum();
        let base = (1.0 - DAMPING) / n_f64 + DAMPING * dangling / n_f64;
        let mut next = vec![base; n];

        for &(a, b, w) in edges {
            next[b] += DAMPING * ranks[a] * w / strength[a];
            next[a] += DAMPING * ranks[b] * w / strength[b];
        }

        let change: f64 = next.iter().zip(&ranks).map(|(x, y)| (x - y).abs()).sum();
        ranks = next;
        if change < n_f64 * TOLERANCE {
            break;
        }
    }
    ranks
}

/// The distinct files touched by each commit, in first-appearance order.
///
/// # Examples
///
/// ```
/// use churnmap_history::hotgraph::itemsets;
///
/// assert!(itemsets(&[]).is_empty());
/// ```
pub fn itemsets(rows: &[FileChangeRecord]) -> Vec<Vec<String>> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_commit: HashMap<&str, BTreeSet<&str>> = HashMap::new();
    for row in rows {
        let files = by_commit.entry(row.hash.as_str()).or_insert_with(|| {
            order.push(row.hash.as_str());
            BTreeSet::new()
        });
        files.insert(row.file_name.as_str());
    }
    order
        .into_iter()
        .filter_map(|hash| by_commit.remove(hash))
        .map(|files| files.into_iter().map(str::to_string).collect())
        .collect()
}

/// Support threshold from the file occurrence distribution.
///
/// With more than `rank` distinct files, the count of the file at 0-based
/// position `rank` (most frequent first), floored at `min_threshold`;
/// otherwise the smallest count. Empty input gives 0.
///
/// # Examples
///
/// ```
/// use churnmap_history::hotgraph::search_threshold;
///
/// assert_eq!(search_threshold(&[], 70, 3), 0);
/// ```
pub fn search_threshold(rows: &[FileChangeRecord], rank: usize, min_threshold: usize) -> usize {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        *counts.entry(row.file_name.as_str()).or_default() += 1;
    }
    let mut counts: Vec<usize> = counts.into_values().collect();
    counts.sort_unstable_by(|a, b| b.cmp(a));

    if counts.len() > rank {
        counts[rank].max(min_threshold)
    } else {
        counts.last().copied().unwrap_or(0)
    }
}

/// The graph together with how mining went.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotgraphReport {
    /// Threshold derived from the occurrence distribution.
    pub initial_threshold: usize,
    /// Mining result, including the final threshold.
    pub outcome: MiningOutcome,
    /// Annotated co-change graph.
    pub graph: CoChangeGraph,
}

/// Build the co-change graph for expanded, rename-resolved rows.
///
/// Empty input, or a threshold nothing reaches, yields an empty graph.
///
/// # Examples
///
/// ```
/// use churnmap_history::hotgraph::{build_hotgraph, HotgraphOptions};
///
/// let report = build_hotgraph(&[], &[], &HotgraphOptions::default());
/// assert!(report.graph.is_empty());
/// assert!(!report.outcome.timed_out);
/// ```
pub fn build_hotgraph(
    rows: &[FileChangeRecord],
    hotspots: &[HotspotEntry],
    options: &HotgraphOptions,
) -> HotgraphReport {
    let transactions = itemsets(rows);
    if transactions.is_empty() {
        return HotgraphReport {
            initial_threshold: 0,
            outcome: MiningOutcome {
                patterns: Vec::new(),
                threshold: 0,
                attempts: 0,
                timed_out: false,
            },
            graph: CoChangeGraph::default(),
        };
    }

    let threshold = search_threshold(rows, options.rank, options.min_threshold);
    debug!(threshold, commits = transactions.len(), "support threshold");
    let outcome = if options.stop_retry {
        mine_unbounded(&transactions, threshold)
    } else {
        mine_with_retry(&transactions, threshold, &options.retry)
    };

    let mut pair_support: HashMap<(&str, &str), usize> = HashMap::new();
    let mut pairs: BTreeMap<(String, String), (usize, usize)> = BTreeMap::new();
    for pattern in &outcome.patterns {
        if pattern.items.len() == 2 {
            pair_support.insert(
                (pattern.items[0].as_str(), pattern.items[1].as_str()),
                pattern.support,
            );
        }
    }
    for pattern in outcome.patterns.iter().filter(|p| p.items.len() >= 2) {
        for (i, a) in pattern.items.iter().enumerate() {
            for b in &pattern.items[i + 1..] {
                let weight = pair_support.get(&(a.as_str(), b.as_str())).copied().unwrap_or(0);
                let entry = pairs.entry((a.clone(), b.clone())).or_insert((weight, 0));
                entry.1 += 1;
            }
        }
    }

    let graph = CoChangeGraph::build(pairs, hotspots);
    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        threshold = outcome.threshold,
        "built co-change graph"
    );
    HotgraphReport {
        initial_threshold: threshold,
        outcome,
        graph,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rows(commits: &[&[&str]]) -> Vec<FileChangeRecord> {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        commits
            .iter()
            .enumerate()
            .flat_map(|(i, files)| {
                files.iter().map(move |f| FileChangeRecord {
                    date,
                    hash: format!("c{i}"),
                    author: "alice".into(),
                    file_name: f.to_string(),
                    insertions: 1,
                    deletions: 0,
                    lines: 1,
                })
            })
            .collect()
    }

    fn strict(rank: usize, min_threshold: usize) -> HotgraphOptions {
        HotgraphOptions {
            rank,
            min_threshold,
            stop_retry: true,
            ..HotgraphOptions::default()
        }
    }

    #[test]
    fn paired_files_share_one_weighted_edge() {
        let input = rows(&[&["a", "b"], &["a", "b"], &["c"]]);
        let report = build_hotgraph(&input, &[], &strict(1, 2));
        assert_eq!(report.initial_threshold, 2);
        let graph = &report.graph;
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edge("a", "b").unwrap().weight, 2);
        assert_eq!(graph.edge("b", "a").unwrap().itemsets, 1);
        assert!(graph.node("c").is_none());
    }

    #[test]
    fn low_threshold_still_leaves_lonely_files_out() {
        let input = rows(&[&["a", "b"], &["a", "b"], &["c"]]);
        let report = build_hotgraph(&input, &[], &HotgraphOptions::default());
        assert_eq!(report.initial_threshold, 1);
        assert_eq!(report.graph.node_count(), 2);
        assert!(report.graph.nodes().all(|n| n.file_name != "c"));
    }

    #[test]
    fn empty_input_gives_empty_graph() {
        let report = build_hotgraph(&[], &[], &HotgraphOptions::default());
        assert!(report.graph.is_empty());
        assert_eq!(report.graph.edge_count(), 0);
        assert_eq!(report.outcome.attempts, 0);
    }

    #[test]
    fn unreachable_threshold_gives_empty_graph() {
        let input = rows(&[&["a", "b"], &["c", "d"]]);
        let report = build_hotgraph(&input, &[], &strict(0, 5));
        assert_eq!(report.initial_threshold, 5);
        assert!(report.graph.is_empty());
    }

    #[test]
    fn threshold_uses_ranked_count_with_floor() {
        let input = rows(&[
            &["a", "b", "c"],
            &["a", "b"],
            &["a", "b"],
            &["a", "d"],
            &["a"],
        ]);
        // Counts: a=5, b=3, c=1, d=1.
        assert_eq!(search_threshold(&input, 1, 1), 3);
        assert_eq!(search_threshold(&input, 1, 4), 4);
        assert_eq!(search_threshold(&input, 2, 0), 1);
        assert_eq!(search_threshold(&input, 10, 3), 1);
    }

    #[test]
    fn itemsets_group_distinct_files_per_commit() {
        let mut input = rows(&[&["b", "a"], &["c"]]);
        input.push(input[0].clone());
        let sets = itemsets(&input);
        assert_eq!(sets, vec![vec!["a".to_string(), "b".to_string()], vec!["c".to_string()]]);
    }

    #[test]
    fn nodes_carry_hotspot_rank_and_community() {
        let input = rows(&[
            &["a", "b", "c"],
            &["a", "b", "c"],
            &["x", "y"],
            &["x", "y"],
        ]);
        let hotspots = vec![HotspotEntry {
            file_name: "a".into(),
            hotspot: 2.5,
            commits: 2,
            authors: 1,
            edit_rate: 1.0,
            insertions: 2,
            deletions: 0,
            lines: 2,
        }];
        let report = build_hotgraph(&input, &hotspots, &strict(0, 2));
        let graph = &report.graph;

        assert_eq!(graph.node("a").unwrap().hotspot, 2.5);
        assert_eq!(graph.node("x").unwrap().hotspot, 0.0);
        assert_eq!(graph.node("a").unwrap().degree, 2);
        assert_eq!(graph.edge("a", "b").unwrap().itemsets, 2);

        let total: f64 = graph.nodes().map(|n| n.pagerank).sum();
        assert!((total - 1.0).abs() < 1e-6);

        let a = graph.node("a").unwrap().community_id;
        let x = graph.node("x").unwrap().community_id;
        assert_eq!(graph.node("c").unwrap().community_id, a);
        assert_eq!(graph.node("y").unwrap().community_id, x);
        assert_ne!(a, x);
        assert_eq!(graph.communities().len(), 2);
        assert_eq!(graph.ranked_nodes()[0].file_name, "a");
    }

    #[test]
    fn pagerank_favours_central_nodes() {
        // Star centred on node 0.
        let edges = [(0, 1, 1.0), (0, 2, 1.0), (0, 3, 1.0)];
        let ranks = pagerank(4, &edges);
        assert!(ranks[0] > ranks[1]);
        assert!((ranks[1] - ranks[2]).abs() < 1e-9);
        assert!((ranks.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn pagerank_handles_isolated_nodes() {
        let ranks = pagerank(3, &[]);
        assert!(ranks.iter().all(|r| (r - 1.0 / 3.0).abs() < 1e-12));
        assert!(pagerank(0, &[]).is_empty());
    }

    #[test]
    fn graph_serializes_nodes_and_edges() {
        let input = rows(&[&["a", "b"], &["a", "b"]]);
        let report = build_hotgraph(&input, &[], &strict(0, 2));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["graph"]["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(json["graph"]["edges"][0]["weight"], 2);
        assert_eq!(json["outcome"]["timedOut"], false);
    }
}
