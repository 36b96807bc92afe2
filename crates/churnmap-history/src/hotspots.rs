//! Recency-weighted hotspot scoring.
//!
//! Each per-file change contributes `w(d) * log10(lines)`, where `w` is a
//! logistic weight over the normalized distance of its date from now inside a
//! trailing window. Contributions are summed per rename-resolved file after
//! volume outliers are trimmed.

use std::collections::{BTreeMap, HashSet};

use chrono::{Months, NaiveDateTime};
use churnmap_core::HotspotConfig;
use serde::{Deserialize, Serialize};

use crate::analytics::percentile;
use crate::table::FileChangeRecord;

/// A file ranked by recent change attention.
///
/// # Examples
///
/// ```
/// use churnmap_history::hotspots::HotspotEntry;
///
/// let h = HotspotEntry {
///     file_name: "src/main.rs".into(),
///     hotspot: 1.7,
///     commits: 4,
///     authors: 2,
///     edit_rate: 0.8,
///     insertions: 80,
///     deletions: 20,
///     lines: 100,
/// };
/// assert_eq!(h.edit_rate, h.insertions as f64 / h.lines as f64);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotEntry {
    /// Rename-resolved path.
    pub file_name: String,
    /// Summed recency-weighted contribution.
    pub hotspot: f64,
    /// Distinct commits touching the file.
    pub commits: u32,
    /// Distinct authors touching the file.
    pub authors: u32,
    /// `insertions / lines`, or 0 when nothing changed.
    pub edit_rate: f64,
    /// Summed insertions.
    pub insertions: u64,
    /// Summed deletions.
    pub deletions: u64,
    /// Summed changed lines.
    pub lines: u64,
}

/// Scoring constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HotspotOptions {
    /// Length of the recency window ending now, in months.
    pub window_months: u32,
    /// Logistic steepness.
    pub steepness: f64,
    /// Lower `lines` percentile kept by the outlier trim.
    pub lower_percentile: f64,
    /// Upper `lines` percentile kept by the outlier trim.
    pub upper_percentile: f64,
}

impl Default for HotspotOptions {
    fn default() -> Self {
        Self::from(&HotspotConfig::default())
    }
}

impl From<&HotspotConfig> for HotspotOptions {
    fn from(config: &HotspotConfig) -> Self {
        Self {
            window_months: config.window_months,
            steepness: config.steepness,
            lower_percentile: config.lower_percentile,
            upper_percentile: config.upper_percentile,
        }
    }
}

/// Keep rows whose `lines` lies within the configured percentile band.
///
/// Bounds are inclusive, so a single row or a constant series survives.
///
/// # Examples
///
/// ```
/// use churnmap_history::hotspots::{trim_outliers, HotspotOptions};
///
/// assert!(trim_outliers(Vec::new(), &HotspotOptions::default()).is_empty());
/// ```
pub fn trim_outliers(rows: Vec<FileChangeRecord>, options: &HotspotOptions) -> Vec<FileChangeRecord> {
    if rows.is_empty() {
        return rows;
    }
    let mut lines: Vec<f64> = rows.iter().map(|r| r.lines as f64).collect();
    lines.sort_by(|a, b| a.total_cmp(b));
    let low = percentile(&lines, options.lower_percentile);
    let high = percentile(&lines, options.upper_percentile);

    rows.into_iter()
        .filter(|r| {
            let v = r.lines as f64;
            low <= v && v <= high
        })
        .collect()
}

/// Logistic recency weight of a change at `date`, seen from `now`.
///
/// `ntd = 1 - (date - now) / (window_start - now)`, clamped at 0, mapped
/// through `1 / (1 + exp(-k * ntd + k))`. A change made now weighs 0.5 and
/// weight decays toward 0 at the start of the window.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use churnmap_history::hotspots::{recency_weight, HotspotOptions};
///
/// let now = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let opts = HotspotOptions::default();
/// assert!((recency_weight(now, now, &opts) - 0.5).abs() < 1e-12);
/// ```
pub fn recency_weight(date: NaiveDateTime, now: NaiveDateTime, options: &HotspotOptions) -> f64 {
    let window_start = now
        .checked_sub_months(Months::new(options.window_months))
        .unwrap_or(NaiveDateTime::MIN);
    let span = (window_start - now).num_seconds() as f64;
    let ntd = if span == 0.0 {
        1.0
    } else {
        (1.0 - (date - now).num_seconds() as f64 / span).max(0.0)
    };
    let k = options.steepness;
    1.0 / (1.0 + (-k * ntd + k).exp())
}

#[derive(Default)]
struct Accumulator<'a> {
    hotspot: f64,
    insertions: u64,
    deletions: u64,
    lines: u64,
    commits: HashSet<&'a str>,
    authors: HashSet<&'a str>,
}

/// Score and rank files from expanded, rename-resolved change rows.
///
/// Rows with `lines == 0` count toward commits and authors but add nothing
/// to the score. Output is sorted by score descending, ties by name.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use churnmap_history::hotspots::{detect_hotspots, HotspotOptions};
///
/// let ranked = detect_hotspots(Vec::new(), Utc::now().naive_utc(), &HotspotOptions::default());
/// assert!(ranked.is_empty());
/// ```
pub fn detect_hotspots(
    rows: Vec<FileChangeRecord>,
    now: NaiveDateTime,
    options: &HotspotOptions,
) -> Vec<HotspotEntry> {
    let rows = trim_outliers(rows, options);

    let mut by_file: BTreeMap<&str, Accumulator> = BTreeMap::new();
    for row in &rows {
        let acc = by_file.entry(row.file_name.as_str()).or_default();
        if row.lines > 0 {
            acc.hotspot += recency_weight(row.date, now, options) * (row.lines as f64).log10();
        }
        acc.insertions += row.insertions;
        acc.deletions += row.deletions;
        acc.lines += row.lines;
        acc.commits.insert(row.hash.as_str());
        acc.authors.insert(row.author.as_str());
    }

    let mut entries: Vec<HotspotEntry> = by_file
        .into_iter()
        .map(|(file_name, acc)| HotspotEntry {
            file_name: file_name.to_string(),
            hotspot: acc.hotspot,
            commits: acc.commits.len() as u32,
            authors: acc.authors.len() as u32,
            edit_rate: if acc.lines == 0 {
                0.0
            } else {
                acc.insertions as f64 / acc.lines as f64
            },
            insertions: acc.insertions,
            deletions: acc.deletions,
            lines: acc.lines,
        })
        .collect();

    entries.sort_by(|a, b| {
        b.hotspot
            .total_cmp(&a.hotspot)
            .then_with(|| a.file_name.cmp(&b.file_name))
    });
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeDelta};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn row(file: &str, hash: &str, author: &str, days_ago: i64, ins: u64, del: u64) -> FileChangeRecord {
        FileChangeRecord {
            date: now() - TimeDelta::days(days_ago),
            hash: hash.into(),
            author: author.into(),
            file_name: file.into(),
            insertions: ins,
            deletions: del,
            lines: ins + del,
        }
    }

    #[test]
    fn single_record_scenario() {
        let ranked = detect_hotspots(
            vec![row("a.rs", "c1", "alice", 3, 70, 30)],
            now(),
            &HotspotOptions::default(),
        );
        assert_eq!(ranked.len(), 1);
        let entry = &ranked[0];
        assert_eq!(entry.commits, 1);
        assert_eq!(entry.authors, 1);
        assert_eq!(entry.lines, 100);
        assert!((entry.edit_rate - 0.7).abs() < 1e-12);
        assert!(entry.hotspot > 0.0);
    }

    #[test]
    fn trimming_never_adds_rows() {
        let mut rows = Vec::new();
        for i in 0..300u64 {
            rows.push(row("a.rs", &format!("c{i}"), "alice", (i % 90) as i64, i % 17, 1));
        }
        rows.push(row("vendor.js", "big", "bob", 1, 100_000, 0));
        rows.push(row("empty.txt", "tiny", "bob", 1, 0, 0));

        let before = rows.len();
        let trimmed = trim_outliers(rows, &HotspotOptions::default());
        assert!(trimmed.len() <= before);
        assert!(trimmed.iter().all(|r| r.file_name != "vendor.js"));
        assert!(trimmed.iter().all(|r| r.file_name != "empty.txt"));
    }

    #[test]
    fn constant_series_is_not_trimmed() {
        let rows: Vec<_> = (0..5).map(|i| row("a.rs", &format!("c{i}"), "a", i, 5, 5)).collect();
        assert_eq!(trim_outliers(rows, &HotspotOptions::default()).len(), 5);
    }

    #[test]
    fn recency_weight_decays_with_age() {
        let opts = HotspotOptions::default();
        let fresh = recency_weight(now() - TimeDelta::days(1), now(), &opts);
        let month = recency_weight(now() - TimeDelta::days(30), now(), &opts);
        let stale = recency_weight(now() - TimeDelta::days(720), now(), &opts);
        assert!(fresh > month);
        assert!(month > stale);
        assert!(stale < 1e-5);
    }

    #[test]
    fn weight_at_window_start_is_logistic_floor() {
        let opts = HotspotOptions::default();
        let start = now().checked_sub_months(Months::new(12)).unwrap();
        let expected = 1.0 / (1.0 + 12f64.exp());
        assert!((recency_weight(start, now(), &opts) - expected).abs() < 1e-12);
        assert!((recency_weight(start - TimeDelta::days(400), now(), &opts) - expected).abs() < 1e-12);
    }

    #[test]
    fn recent_activity_outranks_old_activity() {
        let rows = vec![
            row("old.rs", "c1", "alice", 300, 50, 50),
            row("old.rs", "c2", "alice", 310, 50, 50),
            row("new.rs", "c3", "bob", 2, 50, 50),
        ];
        let ranked = detect_hotspots(rows, now(), &HotspotOptions::default());
        assert_eq!(ranked[0].file_name, "new.rs");
        assert_eq!(ranked[1].commits, 2);
    }

    #[test]
    fn distinct_commits_and_authors_are_counted() {
        let rows = vec![
            row("a.rs", "c1", "alice", 1, 5, 5),
            row("a.rs", "c2", "bob", 2, 5, 5),
            row("a.rs", "c3", "alice", 3, 5, 5),
        ];
        let ranked = detect_hotspots(rows, now(), &HotspotOptions::default());
        assert_eq!(ranked[0].commits, 3);
        assert_eq!(ranked[0].authors, 2);
        assert_eq!(ranked[0].edit_rate, 0.5);
    }

    #[test]
    fn zero_line_files_have_zero_rate_and_score() {
        let rows = vec![row("bin.png", "c1", "alice", 1, 0, 0)];
        let ranked = detect_hotspots(rows, now(), &HotspotOptions::default());
        assert_eq!(ranked[0].hotspot, 0.0);
        assert_eq!(ranked[0].edit_rate, 0.0);
    }

    #[test]
    fn options_follow_config() {
        let config = HotspotConfig {
            window_months: 3,
            steepness: 6.0,
            lower_percentile: 1.0,
            upper_percentile: 99.0,
        };
        let opts = HotspotOptions::from(&config);
        assert_eq!(opts.window_months, 3);
        assert_eq!(opts.steepness, 6.0);
    }
}
