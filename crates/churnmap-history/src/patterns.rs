//! Frequent itemset mining (FP-growth) with a wall-clock budget.
//!
//! [`find_frequent_patterns`] checks an optional deadline while it grows
//! conditional trees and gives up with [`TimedOut`] once it passes.
//! [`mine_with_retry`] turns that into a bounded search: each timeout raises
//! the support threshold and tries again, and running out of attempts yields
//! an empty result instead of an error.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::{Duration, Instant};

use churnmap_core::HotgraphConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// A set of items that co-occur in at least `support` transactions.
///
/// # Examples
///
/// ```
/// use churnmap_history::patterns::find_frequent_patterns;
///
/// let tx = vec![
///     vec!["a".to_string(), "b".to_string()],
///     vec!["a".to_string(), "b".to_string()],
///     vec!["c".to_string()],
/// ];
/// let patterns = find_frequent_patterns(&tx, 2, None).unwrap();
/// assert!(patterns.iter().any(|p| p.items == ["a", "b"] && p.support == 2));
/// assert!(patterns.iter().all(|p| !p.items.contains(&"c".to_string())));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    /// Items in ascending order.
    pub items: Vec<String>,
    /// Number of transactions containing every item.
    pub support: usize,
}

/// The mining deadline passed before the search finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedOut;

impl fmt::Display for TimedOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("frequent pattern search timed out")
    }
}

impl std::error::Error for TimedOut {}

fn check(deadline: Option<Instant>) -> Result<(), TimedOut> {
    match deadline {
        Some(d) if Instant::now() >= d => Err(TimedOut),
        _ => Ok(()),
    }
}

struct Node {
    item: u32,
    count: usize,
    parent: Option<usize>,
    children: Vec<(u32, usize)>,
}

/// Prefix tree of frequent items, ordered by descending support.
struct FpTree {
    nodes: Vec<Node>,
    /// Item -> nodes carrying it.
    header: HashMap<u32, Vec<usize>>,
    /// Frequent items, most frequent first.
    order: Vec<(u32, usize)>,
}

impl FpTree {
    fn build(transactions: &[(Vec<u32>, usize)], threshold: usize) -> Self {
        let mut support: HashMap<u32, usize> = HashMap::new();
        for (items, weight) in transactions {
            for item in items {
                *support.entry(*item).or_default() += weight;
            }
        }
        let mut order: Vec<(u32, usize)> = support
            .into_iter()
            .filter(|(_, count)| *count >= threshold)
            .collect();
        order.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let rank: HashMap<u32, usize> = order.iter().enumerate().map(|(i, (item, _))| (*item, i)).collect();

        let mut tree = Self {
            nodes: vec![Node {
                item: u32::MAX,
                count: 0,
                parent: None,
                children: Vec::new(),
            }],
            header: HashMap::new(),
            order,
        };

        for (items, weight) in transactions {
            let mut path: Vec<u32> = items.iter().copied().filter(|i| rank.contains_key(i)).collect();
            path.sort_by_key(|i| rank[i]);
            path.dedup();
            tree.insert(&path, *weight);
        }
        tree
    }

    fn insert(&mut self, path: &[u32], weight: usize) {
        let mut current = 0;
        for &item in path {
            let existing = self.nodes[current]
                .children
                .iter()
                .find(|(child_item, _)| *child_item == item)
                .map(|(_, idx)| *idx);
            current = match existing {
                Some(idx) => {
                    self.nodes[idx].count += weight;
                    idx
                }
                None => {
                    let idx = self.nodes.len();
                    self.nodes.push(Node {
                        item,
                        count: weight,
                        parent: Some(current),
                        children: Vec::new(),
                    });
                    self.nodes[current].children.push((item, idx));
                    self.header.entry(item).or_default().push(idx);
                    idx
                }
            };
        }
    }

    /// Prefix paths ending at `item`, each weighted by that node's count.
    fn conditional_base(&self, item: u32) -> Vec<(Vec<u32>, usize)> {
        let Some(nodes) = self.header.get(&item) else {
            return Vec::new();
        };
        nodes
            .iter()
            .filter_map(|&idx| {
                let mut path = Vec::new();
                let mut parent = self.nodes[idx].parent;
                while let Some(p) = parent {
                    if p == 0 {
                        break;
                    }
                    path.push(self.nodes[p].item);
                    parent = self.nodes[p].parent;
                }
                (!path.is_empty()).then_some((path, self.nodes[idx].count))
            })
            .collect()
    }
}

fn grow(
    tree: &FpTree,
    suffix: &[u32],
    threshold: usize,
    deadline: Option<Instant>,
    out: &mut Vec<(Vec<u32>, usize)>,
) -> Result<(), TimedOut> {
    check(deadline)?;
    for &(item, support) in tree.order.iter().rev() {
        check(deadline)?;
        let mut itemset = suffix.to_vec();
        itemset.push(item);
        out.push((itemset.clone(), support));

        let base = tree.conditional_base(item);
        if base.is_empty() {
            continue;
        }
        let conditional = FpTree::build(&base, threshold);
        if !conditional.order.is_empty() {
            grow(&conditional, &itemset, threshold, deadline, out)?;
        }
    }
    Ok(())
}

/// Every itemset (singletons included) supported by at least `threshold`
/// transactions.
///
/// Items repeated within one transaction count once. A threshold of 0 is
/// treated as 1. Results are sorted by item list.
///
/// # Errors
///
/// Returns [`TimedOut`] if `deadline` passes before the search completes.
pub fn find_frequent_patterns(
    transactions: &[Vec<String>],
    threshold: usize,
    deadline: Option<Instant>,
) -> Result<Vec<Pattern>, TimedOut> {
    let threshold = threshold.max(1);

    let mut ids: BTreeMap<&str, u32> = BTreeMap::new();
    for tx in transactions {
        for item in tx {
            let next = ids.len() as u32;
            ids.entry(item.as_str()).or_insert(next);
        }
    }
    let names: HashMap<u32, &str> = ids.iter().map(|(name, id)| (*id, *name)).collect();

    let encoded: Vec<(Vec<u32>, usize)> = transactions
        .iter()
        .map(|tx| {
            let mut items: Vec<u32> = tx.iter().map(|item| ids[item.as_str()]).collect();
            items.sort_unstable();
            items.dedup();
            (items, 1)
        })
        .collect();

    check(deadline)?;
    let tree = FpTree::build(&encoded, threshold);
    let mut raw = Vec::new();
    grow(&tree, &[], threshold, deadline, &mut raw)?;

    let mut patterns: Vec<Pattern> = raw
        .into_iter()
        .map(|(items, support)| {
            let mut items: Vec<String> = items.iter().map(|id| names[id].to_string()).collect();
            items.sort();
            Pattern { items, support }
        })
        .collect();
    patterns.sort_by(|a, b| a.items.cmp(&b.items));
    Ok(patterns)
}

/// Budget and escalation for [`mine_with_retry`].
///
/// # Examples
///
/// ```
/// use churnmap_history::patterns::RetryPolicy;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_attempts, 5);
/// assert_eq!(policy.next_threshold(10), 13);
/// assert_eq!(policy.next_threshold(1), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Wall-clock budget per attempt.
    pub timeout: Duration,
    /// Attempts before giving up.
    pub max_attempts: u32,
    /// Threshold multiplier after a timeout.
    pub growth_rate: f64,
}

impl RetryPolicy {
    /// The threshold for the attempt after one at `threshold` timed out.
    ///
    /// Always strictly larger than `threshold`.
    pub fn next_threshold(&self, threshold: usize) -> usize {
        let grown = (threshold as f64 * self.growth_rate).round() as usize;
        grown.max(threshold + 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&HotgraphConfig::default())
    }
}

impl From<&HotgraphConfig> for RetryPolicy {
    fn from(config: &HotgraphConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            max_attempts: config.max_attempts,
            growth_rate: config.growth_rate,
        }
    }
}

/// Result of a (possibly retried) mining run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningOutcome {
    /// Frequent itemsets; empty when every attempt timed out.
    pub patterns: Vec<Pattern>,
    /// Threshold of the last attempt.
    pub threshold: usize,
    /// Attempts made.
    pub attempts: u32,
    /// Whether the search gave up.
    pub timed_out: bool,
}

/// Mine under `policy`, escalating the threshold after each timeout.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use churnmap_history::patterns::{mine_with_retry, RetryPolicy};
///
/// let tx = vec![vec!["a".to_string(), "b".to_string()]; 3];
/// let outcome = mine_with_retry(&tx, 2, &RetryPolicy::default());
/// assert!(!outcome.timed_out);
/// assert_eq!(outcome.attempts, 1);
///
/// let impatient = RetryPolicy { timeout: Duration::ZERO, max_attempts: 3, growth_rate: 1.3 };
/// let outcome = mine_with_retry(&tx, 2, &impatient);
/// assert!(outcome.timed_out);
/// assert!(outcome.patterns.is_empty());
/// ```
pub fn mine_with_retry(
    transactions: &[Vec<String>],
    threshold: usize,
    policy: &RetryPolicy,
) -> MiningOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut threshold = threshold.max(1);

    for attempt in 1..=max_attempts {
        info!(threshold, attempt, "mining frequent patterns");
        // A timeout too large for the clock means no deadline.
        let deadline = Instant::now().checked_add(policy.timeout);
        match find_frequent_patterns(transactions, threshold, deadline) {
            Ok(patterns) => {
                return MiningOutcome {
                    patterns,
                    threshold,
                    attempts: attempt,
                    timed_out: false,
                };
            }
            Err(TimedOut) if attempt < max_attempts => {
                let next = policy.next_threshold(threshold);
                warn!(threshold, next, "pattern search timed out, retrying");
                threshold = next;
            }
            Err(TimedOut) => {}
        }
    }

    warn!(
        attempts = max_attempts,
        threshold, "pattern search exhausted its retries, returning no patterns"
    );
    MiningOutcome {
        patterns: Vec::new(),
        threshold,
        attempts: max_attempts,
        timed_out: true,
    }
}

/// Mine once without a deadline.
pub fn mine_unbounded(transactions: &[Vec<String>], threshold: usize) -> MiningOutcome {
    info!(threshold, "mining frequent patterns without a time limit");
    let patterns = find_frequent_patterns(transactions, threshold, None).unwrap_or_default();
    MiningOutcome {
        patterns,
        threshold: threshold.max(1),
        attempts: 1,
        timed_out: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    fn support_of(patterns: &[Pattern], items: &[&str]) -> Option<usize> {
        patterns
            .iter()
            .find(|p| p.items.iter().map(String::as_str).eq(items.iter().copied()))
            .map(|p| p.support)
    }

    /// Support counts by brute force over all subsets of the item universe.
    fn brute_force(transactions: &[Vec<String>], threshold: usize) -> Vec<(Vec<String>, usize)> {
        let mut universe: Vec<String> = transactions.iter().flatten().cloned().collect();
        universe.sort();
        universe.dedup();
        let mut found = Vec::new();
        for mask in 1u32..(1 << universe.len()) {
            let items: Vec<String> = universe
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, s)| s.clone())
                .collect();
            let support = transactions
                .iter()
                .filter(|t| items.iter().all(|i| t.contains(i)))
                .count();
            if support >= threshold {
                found.push((items, support));
            }
        }
        found.sort();
        found
    }

    #[test]
    fn always_paired_files_form_a_pattern() {
        let transactions = tx(&[&["a", "b"], &["a", "b"], &["c"]]);
        let patterns = find_frequent_patterns(&transactions, 2, None).unwrap();
        assert_eq!(support_of(&patterns, &["a", "b"]), Some(2));
        assert_eq!(support_of(&patterns, &["a"]), Some(2));
        assert_eq!(support_of(&patterns, &["c"]), None);
    }

    #[test]
    fn matches_brute_force_enumeration() {
        let transactions = tx(&[
            &["a", "b", "c"],
            &["a", "b"],
            &["a", "c", "d"],
            &["b", "c", "e"],
            &["a", "b", "c", "e"],
            &["d", "e"],
            &["a", "b", "c"],
        ]);
        for threshold in 1..=4 {
            let mut got: Vec<(Vec<String>, usize)> = find_frequent_patterns(&transactions, threshold, None)
                .unwrap()
                .into_iter()
                .map(|p| (p.items, p.support))
                .collect();
            got.sort();
            assert_eq!(got, brute_force(&transactions, threshold), "threshold {threshold}");
        }
    }

    #[test]
    fn duplicate_items_in_a_transaction_count_once() {
        let transactions = tx(&[&["a", "a", "b"], &["a", "b"]]);
        let patterns = find_frequent_patterns(&transactions, 1, None).unwrap();
        assert_eq!(support_of(&patterns, &["a"]), Some(2));
        assert_eq!(support_of(&patterns, &["a", "b"]), Some(2));
    }

    #[test]
    fn threshold_above_everything_yields_nothing() {
        let transactions = tx(&[&["a", "b"], &["b"]]);
        assert!(find_frequent_patterns(&transactions, 3, None).unwrap().is_empty());
        assert!(find_frequent_patterns(&[], 1, None).unwrap().is_empty());
    }

    #[test]
    fn expired_deadline_times_out() {
        let transactions = tx(&[&["a", "b"]]);
        let past = Instant::now();
        assert_eq!(find_frequent_patterns(&transactions, 1, Some(past)), Err(TimedOut));
    }

    #[test]
    fn exhausted_retries_return_empty_outcome() {
        let transactions = tx(&[&["a", "b"], &["a", "b"]]);
        let policy = RetryPolicy {
            timeout: Duration::ZERO,
            max_attempts: 4,
            growth_rate: 1.3,
        };
        let outcome = mine_with_retry(&transactions, 10, &policy);
        assert!(outcome.timed_out);
        assert!(outcome.patterns.is_empty());
        assert_eq!(outcome.attempts, 4);
        // 10 -> 13 -> 17 -> 22
        assert_eq!(outcome.threshold, 22);
    }

    #[test]
    fn unbounded_timeout_mines_without_deadline() {
        let transactions = tx(&[&["a", "b"], &["a", "b"]]);
        let policy = RetryPolicy {
            timeout: Duration::MAX,
            max_attempts: 3,
            growth_rate: 1.3,
        };
        let outcome = mine_with_retry(&transactions, 2, &policy);
        assert!(!outcome.timed_out);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.patterns.iter().any(|p| p.items == ["a", "b"] && p.support == 2));
    }

    #[test]
    fn threshold_growth_is_strictly_increasing() {
        let policy = RetryPolicy {
            timeout: Duration::from_secs(1),
            max_attempts: 5,
            growth_rate: 1.01,
        };
        let mut th = 1;
        for _ in 0..20 {
            let next = policy.next_threshold(th);
            assert!(next > th);
            th = next;
        }
    }

    #[test]
    fn unbounded_run_reports_single_attempt() {
        let transactions = tx(&[&["a", "b"], &["a", "b"], &["c"]]);
        let outcome = mine_unbounded(&transactions, 0);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.threshold, 1);
        assert!(!outcome.timed_out);
        assert_eq!(support_of(&outcome.patterns, &["c"]), Some(1));
    }

    #[test]
    fn policy_follows_config() {
        let config = HotgraphConfig {
            timeout_secs: 3,
            max_attempts: 2,
            growth_rate: 2.0,
            ..HotgraphConfig::default()
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.timeout, Duration::from_secs(3));
        assert_eq!(policy.next_threshold(5), 10);
    }
}
