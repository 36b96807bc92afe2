//! Modularity-based community detection (Louvain).
//!
//! Nodes are visited in index order and ties go to the lowest community id,
//! so the partition is deterministic for a given edge list.

use std::collections::BTreeMap;

const MIN_GAIN: f64 = 1e-7;

/// Weighted undirected graph in adjacency form, one level of the hierarchy.
struct Level {
    adj: Vec<Vec<(usize, f64)>>,
    self_loops: Vec<f64>,
    degree: Vec<f64>,
    total_weight: f64,
}

impl Level {
    fn new(node_count: usize, edges: &[(usize, usize, f64)]) -> Self {
        let mut adj = vec![Vec::new(); node_count];
        let mut self_loops = vec![0.0; node_count];
        let mut degree = vec![0.0; node_count];
        let mut total_weight = 0.0;

        for &(u, v, w) in edges {
            if u >= node_count || v >= node_count {
                continue;
            }
            total_weight += w;
            if u == v {
                self_loops[u] += w;
                degree[u] += 2.0 * w;
            } else {
                adj[u].push((v, w));
                adj[v].push((u, w));
                degree[u] += w;
                degree[v] += w;
            }
        }
        Self {
            adj,
            self_loops,
            degree,
            total_weight,
        }
    }

    fn len(&self) -> usize {
        self.adj.len()
    }

    fn modularity(&self, community: &[usize]) -> f64 {
        let m2 = 2.0 * self.total_weight;
        if m2 == 0.0 {
            return 0.0;
        }
        let count = community.iter().max().map_or(0, |c| c + 1);
        let mut internal = vec![0.0; count];
        let mut total = vec![0.0; count];
        for node in 0..self.len() {
            let c = community[node];
            total[c] += self.degree[node];
            internal[c] += 2.0 * self.self_loops[node];
            for &(other, w) in &self.adj[node] {
                if community[other] == c {
                    internal[c] += w;
                }
            }
        }
        internal
            .iter()
            .zip(&total)
            .map(|(inside, tot)| inside / m2 - (tot / m2).powi(2))
            .sum()
    }

    /// Local moving phase. Returns a renumbered community per node.
    fn local_moves(&self) -> Vec<usize> {
        let n = self.len();
        let m2 = 2.0 * self.total_weight;
        let mut community: Vec<usize> = (0..n).collect();
        if m2 == 0.0 {
            return community;
        }
        let mut tot = self.degree.clone();
        let mut current = self.modularity(&community);

        loop {
            let mut moved = false;
            for node in 0..n {
                let home = community[node];
                let k = self.degree[node];

                let mut links: BTreeMap<usize, f64> = BTreeMap::new();
                for &(other, w) in &self.adj[node] {
                    *links.entry(community[other]).or_default() += w;
                }

                tot[home] -= k;
                let mut best = home;
                let mut best_gain = links.get(&home).copied().unwrap_or(0.0) - tot[home] * k / m2;
                for (&candidate, &w) in &links {
                    let gain = w - tot[candidate] * k / m2;
                    if gain > best_gain + 1e-12 {
                        best = candidate;
                        best_gain = gain;
                    }
                }
                tot[best] += k;
                if best != home {
                    community[node] = best;
                    moved = true;
                }
            }

            let next = self.modularity(&community);
            if !moved || next - current < MIN_GAIN {
                break;
            }
            current = next;
        }
        renumber(&community)
    }

    /// Collapse each community into one node; internal weight becomes a self-loop.
    fn aggregate(&self, community: &[usize]) -> Self {
        let count = community.iter().max().map_or(0, |c| c + 1);
        let mut merged: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for node in 0..self.len() {
            let c = community[node];
            if self.self_loops[node] > 0.0 {
                *merged.entry((c, c)).or_default() += self.self_loops[node];
            }
            for &(other, w) in &self.adj[node] {
                // Each undirected edge appears twice in `adj`.
                if node < other {
                    let d = community[other];
                    *merged.entry((c.min(d), c.max(d))).or_default() += w;
                }
            }
        }
        let edges: Vec<(usize, usize, f64)> = merged.into_iter().map(|((u, v), w)| (u, v, w)).collect();
        Self::new(count, &edges)
    }
}

/// Relabel ids as 0, 1, 2, ... in order of first appearance.
fn renumber(labels: &[usize]) -> Vec<usize> {
    let mut mapping: BTreeMap<usize, usize> = BTreeMap::new();
    let mut first_seen = Vec::with_capacity(labels.len());
    for &label in labels {
        let next = mapping.len();
        first_seen.push(*mapping.entry(label).or_insert(next));
    }
    first_seen
}

/// Partition nodes `0..node_count` into communities maximizing modularity.
///
/// `edges` are undirected `(u, v, weight)` triples; out-of-range endpoints
/// are ignored. Community ids are dense and numbered by first appearance.
/// A graph without edge weight puts every node in its own community.
///
/// # Examples
///
/// ```
/// use churnmap_history::community::louvain;
///
/// let edges = [(0, 1, 1.0), (2, 3, 1.0)];
/// let parts = louvain(4, &edges);
/// assert_eq!(parts[0], parts[1]);
/// assert_eq!(parts[2], parts[3]);
/// assert_ne!(parts[0], parts[2]);
/// ```
pub fn louvain(node_count: usize, edges: &[(usize, usize, f64)]) -> Vec<usize> {
    let mut level = Level::new(node_count, edges);
    let mut partition: Vec<usize> = (0..node_count).collect();

    while level.len() > 0 {
        let community = level.local_moves();
        let merged = community.iter().max().map_or(0, |c| c + 1);
        if merged == level.len() {
            break;
        }
        for slot in partition.iter_mut() {
            *slot = community[*slot];
        }
        level = level.aggregate(&community);
    }
    renumber(&partition)
}

/// Newman modularity of `partition` over the weighted undirected graph.
///
/// # Examples
///
/// ```
/// use churnmap_history::community::modularity;
///
/// let edges = [(0, 1, 1.0)];
/// assert_eq!(modularity(2, &edges, &[0, 0]), 0.0);
/// assert!(modularity(2, &edges, &[0, 1]) < 0.0);
/// ```
pub fn modularity(node_count: usize, edges: &[(usize, usize, f64)], partition: &[usize]) -> f64 {
    if partition.len() != node_count {
        return 0.0;
    }
    Level::new(node_count, edges).modularity(partition)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn barbell() -> Vec<(usize, usize, f64)> {
        vec![
            (0, 1, 1.0),
            (1, 2, 1.0),
            (0, 2, 1.0),
            (3, 4, 1.0),
            (4, 5, 1.0),
            (3, 5, 1.0),
            (2, 3, 1.0),
        ]
    }

    #[test]
    fn two_cliques_joined_by_a_bridge() {
        let parts = louvain(6, &barbell());
        assert_eq!(parts, vec![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn partition_beats_singletons() {
        let edges = barbell();
        let parts = louvain(6, &edges);
        let singletons: Vec<usize> = (0..6).collect();
        assert!(modularity(6, &edges, &parts) > modularity(6, &edges, &singletons));
    }

    #[test]
    fn ring_of_cliques_is_split_per_clique() {
        let mut edges = Vec::new();
        for clique in 0..4 {
            let base = clique * 4;
            for a in 0..4 {
                for b in (a + 1)..4 {
                    edges.push((base + a, base + b, 1.0));
                }
            }
            edges.push((base + 3, (base + 4) % 16, 1.0));
        }
        let parts = louvain(16, &edges);
        for clique in 0..4 {
            let base = clique * 4;
            assert!(parts[base..base + 4].iter().all(|p| *p == parts[base]));
        }
        let mut distinct = parts.clone();
        distinct.sort_unstable();
        distinct.dedup();
        assert_eq!(distinct.len(), 4);
    }

    #[test]
    fn isolated_nodes_keep_their_own_community() {
        let parts = louvain(3, &[]);
        assert_eq!(parts, vec![0, 1, 2]);
        assert!(louvain(0, &[]).is_empty());
    }

    #[test]
    fn heavier_edges_pull_nodes_together() {
        let edges = [(0, 1, 10.0), (1, 2, 0.1), (2, 3, 10.0)];
        let parts = louvain(4, &edges);
        assert_eq!(parts[0], parts[1]);
        assert_eq!(parts[2], parts[3]);
        assert_ne!(parts[1], parts[2]);
    }

    #[test]
    fn deterministic_across_runs() {
        let edges = barbell();
        assert_eq!(louvain(6, &edges), louvain(6, &edges));
    }

    #[test]
    fn renumbering_follows_first_appearance() {
        assert_eq!(renumber(&[7, 3, 7, 9]), vec![0, 1, 0, 2]);
    }
}
