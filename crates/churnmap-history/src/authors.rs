//! Weekly commit activity per author.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::analytics::{partition, Timeslot};
use crate::table::CommitTable;

/// Column collecting every author not broken out individually.
pub const OTHERS: &str = "Others";

/// Commit counts for one week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekRow {
    /// Monday starting the week.
    pub start: NaiveDate,
    /// Distinct commits per column, aligned with [`AuthorActivity::columns`].
    pub counts: Vec<u64>,
}

/// Weekly commit counts for selected authors plus an "Others" column.
///
/// # Examples
///
/// ```
/// use churnmap_history::authors::AuthorActivity;
/// use churnmap_history::table::CommitTable;
///
/// let activity = AuthorActivity::weekly(&CommitTable::empty(), 10, None);
/// assert_eq!(activity.columns, vec!["Others"]);
/// assert!(activity.weeks.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorActivity {
    /// Author names followed by [`OTHERS`].
    pub columns: Vec<String>,
    /// One row per week, gaps included.
    pub weeks: Vec<WeekRow>,
}

impl AuthorActivity {
    /// Count commits per week for the `top` most active authors, or for
    /// `only` when given.
    pub fn weekly(table: &CommitTable, top: usize, only: Option<&[String]>) -> Self {
        let authors = match only {
            Some(names) if !names.is_empty() => names.to_vec(),
            _ => top_authors(table, top),
        };
        let column: HashMap<&str, usize> = authors
            .iter()
            .enumerate()
            .map(|(i, a)| (a.as_str(), i))
            .collect();
        let others = authors.len();

        let weeks = partition(table.records(), Timeslot::WEEK)
            .into_iter()
            .map(|(start, group)| {
                let mut seen: Vec<HashSet<&str>> = vec![HashSet::new(); others + 1];
                for record in group {
                    let slot = column.get(record.author.as_str()).copied().unwrap_or(others);
                    seen[slot].insert(record.hash.as_str());
                }
                WeekRow {
                    start,
                    counts: seen.iter().map(|s| s.len() as u64).collect(),
                }
            })
            .collect();

        let mut columns = authors;
        columns.push(OTHERS.to_string());
        Self { columns, weeks }
    }

    /// Each week's counts as shares of that week's total; empty weeks stay 0.
    pub fn ratios(&self) -> Vec<Vec<f64>> {
        self.weeks
            .iter()
            .map(|week| {
                let total: u64 = week.counts.iter().sum();
                week.counts
                    .iter()
                    .map(|c| if total == 0 { 0.0 } else { *c as f64 / total as f64 })
                    .collect()
            })
            .collect()
    }

    /// Total commits per column over all weeks.
    pub fn totals(&self) -> Vec<u64> {
        let mut totals = vec![0; self.columns.len()];
        for week in &self.weeks {
            for (total, count) in totals.iter_mut().zip(&week.counts) {
                *total += count;
            }
        }
        totals
    }
}

/// The `n` authors with the most commits, ties broken by name.
///
/// # Examples
///
/// ```
/// use churnmap_history::authors::top_authors;
/// use churnmap_history::table::CommitTable;
///
/// assert!(top_authors(&CommitTable::empty(), 5).is_empty());
/// ```
pub fn top_authors(table: &CommitTable, n: usize) -> Vec<String> {
    let mut commits: HashMap<&str, HashSet<&str>> = HashMap::new();
    for record in table.records() {
        commits
            .entry(record.author.as_str())
            .or_default()
            .insert(record.hash.as_str());
    }
    let mut ranked: Vec<(&str, usize)> = commits.into_iter().map(|(a, c)| (a, c.len())).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked.into_iter().take(n).map(|(a, _)| a.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mining::CommitRecord;

    fn commit(hash: &str, author: &str, y: i32, m: u32, d: u32) -> CommitRecord {
        CommitRecord {
            date: NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            hash: hash.into(),
            author: author.into(),
            insertions: 1,
            deletions: 0,
            lines: 1,
            file_count: 1,
            per_file: None,
        }
    }

    fn table() -> CommitTable {
        // 2024-01-01 and 2024-01-15 are Mondays.
        CommitTable::from_records(vec![
            commit("1", "alice", 2024, 1, 1),
            commit("2", "alice", 2024, 1, 2),
            commit("3", "bob", 2024, 1, 3),
            commit("4", "carol", 2024, 1, 3),
            commit("5", "alice", 2024, 1, 16),
            commit("6", "bob", 2024, 1, 17),
        ])
    }

    #[test]
    fn top_authors_by_commit_count() {
        assert_eq!(top_authors(&table(), 2), vec!["alice", "bob"]);
        assert_eq!(top_authors(&table(), 10).len(), 3);
    }

    #[test]
    fn others_collects_remaining_authors() {
        let activity = AuthorActivity::weekly(&table(), 1, None);
        assert_eq!(activity.columns, vec!["alice", "Others"]);
        assert_eq!(activity.weeks.len(), 3);
        assert_eq!(activity.weeks[0].counts, vec![2, 2]);
        assert_eq!(activity.weeks[1].counts, vec![0, 0]);
        assert_eq!(activity.weeks[2].counts, vec![1, 1]);
        assert_eq!(activity.totals(), vec![3, 3]);
    }

    #[test]
    fn explicit_author_list_wins() {
        let only = vec!["carol".to_string()];
        let activity = AuthorActivity::weekly(&table(), 5, Some(&only));
        assert_eq!(activity.columns, vec!["carol", "Others"]);
        assert_eq!(activity.weeks[0].counts, vec![1, 3]);
    }

    #[test]
    fn ratios_sum_to_one_or_zero() {
        let activity = AuthorActivity::weekly(&table(), 2, None);
        for (row, week) in activity.ratios().iter().zip(&activity.weeks) {
            let sum: f64 = row.iter().sum();
            if week.counts.iter().all(|c| *c == 0) {
                assert_eq!(sum, 0.0);
            } else {
                assert!((sum - 1.0).abs() < 1e-12);
            }
        }
    }
}
