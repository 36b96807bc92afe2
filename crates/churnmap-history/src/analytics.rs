//! Distribution statistics over the commit table.
//!
//! Gini coefficient and Lorenz curve of change volume, fixed-width time
//! bucket resampling, and the JSON statistics document behind `info`.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate, TimeDelta};
use churnmap_core::ChurnmapError;
use serde::{Deserialize, Serialize};

use crate::mining::CommitRecord;
use crate::table::CommitTable;

/// Percentile of `sorted` (ascending) with linear interpolation between ranks.
///
/// Returns 0 for an empty slice.
///
/// # Examples
///
/// ```
/// use churnmap_history::analytics::percentile;
///
/// let v = [1.0, 2.0, 3.0, 4.0];
/// assert_eq!(percentile(&v, 0.0), 1.0);
/// assert_eq!(percentile(&v, 50.0), 2.5);
/// assert_eq!(percentile(&v, 100.0), 4.0);
/// ```
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (pct.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Gini coefficient: half the mean absolute pairwise difference over the mean.
///
/// 0 for perfectly even series, approaching 1 as volume concentrates.
/// Empty or all-zero input yields 0.
///
/// # Examples
///
/// ```
/// use churnmap_history::analytics::gini;
///
/// assert_eq!(gini(&[5.0, 5.0, 5.0]), 0.0);
/// assert!(gini(&[0.0, 0.0, 0.0, 100.0]) > 0.7);
/// ```
pub fn gini(values: &[f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    if mean == 0.0 {
        return 0.0;
    }
    // Sum over ordered pairs of |xi - xj| via the sorted-rank identity.
    let sorted = sorted_copy(values);
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, x)| (2.0 * i as f64 - n as f64 + 1.0) * x)
        .sum();
    let mean_abs_diff = 2.0 * weighted / (n * n) as f64;
    0.5 * mean_abs_diff / mean
}

/// One point of a Lorenz curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LorenzPoint {
    /// Percentile of entries, 0–100.
    pub percentile: f64,
    /// Percent of the total contributed by entries at or below that percentile.
    pub share: f64,
}

/// Lorenz curve sampled at 21 evenly spaced percentiles (0, 5, …, 100).
///
/// # Examples
///
/// ```
/// use churnmap_history::analytics::lorenz;
///
/// let curve = lorenz(&[1.0, 1.0, 1.0, 1.0]);
/// assert_eq!(curve.len(), 21);
/// assert_eq!(curve[20].share, 100.0);
/// ```
pub fn lorenz(values: &[f64]) -> Vec<LorenzPoint> {
    let sorted = sorted_copy(values);
    let total: f64 = sorted.iter().sum();
    (0..=20)
        .map(|step| {
            let pct = step as f64 * 5.0;
            let share = if total == 0.0 {
                0.0
            } else {
                let cut = percentile(&sorted, pct);
                let below: f64 = sorted.iter().filter(|v| **v <= cut).sum();
                below / total * 100.0
            };
            LorenzPoint {
                percentile: pct,
                share,
            }
        })
        .collect()
}

/// Calendar unit of a [`Timeslot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotUnit {
    /// Calendar days.
    Day,
    /// Weeks starting on Monday.
    Week,
    /// Calendar months.
    Month,
    /// Calendar years.
    Year,
}

/// A resampling period such as `2W`, `7D`, or `1M`.
///
/// # Examples
///
/// ```
/// use churnmap_history::analytics::Timeslot;
///
/// let slot: Timeslot = "2W".parse().unwrap();
/// assert_eq!(slot.label(), "2 Weeks");
/// assert_eq!(slot.to_string(), "2W");
/// assert!("fortnight".parse::<Timeslot>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeslot {
    /// Units per bucket (at least 1).
    pub count: u32,
    /// Bucket unit.
    pub unit: SlotUnit,
}

impl Timeslot {
    /// One-week buckets.
    pub const WEEK: Timeslot = Timeslot {
        count: 1,
        unit: SlotUnit::Week,
    };

    /// Human-readable label like "2 Weeks".
    pub fn label(&self) -> String {
        let unit = match self.unit {
            SlotUnit::Day => "Days",
            SlotUnit::Week => "Weeks",
            SlotUnit::Month => "Months",
            SlotUnit::Year => "Years",
        };
        format!("{} {unit}", self.count)
    }

    /// Start of the bucket containing `date`, before any offset.
    fn align(&self, date: NaiveDate) -> NaiveDate {
        match self.unit {
            SlotUnit::Day => date,
            SlotUnit::Week => date - TimeDelta::days(date.weekday().num_days_from_monday() as i64),
            SlotUnit::Month => date.with_day(1).unwrap_or(date),
            SlotUnit::Year => date.with_ordinal(1).unwrap_or(date),
        }
    }

    fn next(&self, start: NaiveDate) -> NaiveDate {
        let count = self.count.max(1);
        let next = match self.unit {
            SlotUnit::Day => start.checked_add_signed(TimeDelta::days(count as i64)),
            SlotUnit::Week => start.checked_add_signed(TimeDelta::weeks(count as i64)),
            SlotUnit::Month => start.checked_add_months(Months::new(count)),
            SlotUnit::Year => start.checked_add_months(Months::new(count * 12)),
        };
        next.unwrap_or(NaiveDate::MAX)
    }

    /// Bucket start dates covering `first..=last`.
    pub fn bucket_starts(&self, first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
        let mut starts = Vec::new();
        let mut start = self.align(first);
        loop {
            starts.push(start);
            let next = self.next(start);
            if next > last || next == start {
                break;
            }
            start = next;
        }
        starts
    }
}

impl FromStr for Timeslot {
    type Err = ChurnmapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, unit) = s.split_at(split);
        let invalid = || ChurnmapError::Parse(format!("invalid timeslot '{s}' (expected e.g. 2W, 7D, 1M, 1Y)"));

        let count: u32 = digits.parse().map_err(|_| invalid())?;
        if count == 0 {
            return Err(invalid());
        }
        let unit = match unit.to_ascii_uppercase().as_str() {
            "D" => SlotUnit::Day,
            "W" => SlotUnit::Week,
            "M" => SlotUnit::Month,
            "Y" => SlotUnit::Year,
            _ => return Err(invalid()),
        };
        Ok(Self { count, unit })
    }
}

impl fmt::Display for Timeslot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            SlotUnit::Day => 'D',
            SlotUnit::Week => 'W',
            SlotUnit::Month => 'M',
            SlotUnit::Year => 'Y',
        };
        write!(f, "{}{unit}", self.count)
    }
}

/// Aggregated activity for one time bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBucket {
    /// First day of the bucket.
    pub start: NaiveDate,
    /// Commits in the bucket.
    pub commits: u64,
    /// Summed insertions.
    pub insertions: u64,
    /// Summed deletions.
    pub deletions: u64,
    /// Summed `lines`.
    pub lines: u64,
    /// Summed file counts.
    pub files: u64,
    /// Distinct authors.
    pub authors: u64,
}

impl TimeBucket {
    fn empty(start: NaiveDate) -> Self {
        Self {
            start,
            commits: 0,
            insertions: 0,
            deletions: 0,
            lines: 0,
            files: 0,
            authors: 0,
        }
    }
}

/// Assign date-sorted records to consecutive buckets.
///
/// Returns the bucket starts and, per bucket, the records falling in it.
pub(crate) fn partition<'a>(
    records: &'a [CommitRecord],
    slot: Timeslot,
) -> Vec<(NaiveDate, Vec<&'a CommitRecord>)> {
    let (Some(first), Some(last)) = (records.first(), records.last()) else {
        return Vec::new();
    };
    let starts = slot.bucket_starts(first.date.date(), last.date.date());
    let mut groups: Vec<(NaiveDate, Vec<&CommitRecord>)> =
        starts.iter().map(|s| (*s, Vec::new())).collect();

    let mut idx = 0;
    for record in records {
        let day = record.date.date();
        while idx + 1 < starts.len() && starts[idx + 1] <= day {
            idx += 1;
        }
        groups[idx].1.push(record);
    }
    groups
}

/// Resample a table into fixed-width buckets.
///
/// Flow quantities are summed and authors counted distinctly. Buckets with
/// no commits between the first and last are kept with zeros.
///
/// # Examples
///
/// ```
/// use churnmap_history::analytics::{resample, Timeslot};
/// use churnmap_history::table::CommitTable;
///
/// assert!(resample(&CommitTable::empty(), Timeslot::WEEK).is_empty());
/// ```
pub fn resample(table: &CommitTable, slot: Timeslot) -> Vec<TimeBucket> {
    partition(table.records(), slot)
        .into_iter()
        .map(|(start, group)| {
            let mut bucket = TimeBucket::empty(start);
            let mut authors: HashSet<&str> = HashSet::new();
            for r in group {
                bucket.commits += 1;
                bucket.insertions += r.insertions;
                bucket.deletions += r.deletions;
                bucket.lines += r.lines;
                bucket.files += r.file_count;
                authors.insert(r.author.as_str());
            }
            bucket.authors = authors.len() as u64;
            bucket
        })
        .collect()
}

/// Descriptive statistics for one numeric column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    /// Arithmetic mean.
    pub mean: f64,
    /// Sample standard deviation (0 with fewer than two values).
    pub std: f64,
    /// Smallest value.
    pub min: f64,
    /// First quartile.
    #[serde(rename = "25%")]
    pub p25: f64,
    /// Median.
    #[serde(rename = "50%")]
    pub p50: f64,
    /// Third quartile.
    #[serde(rename = "75%")]
    pub p75: f64,
    /// Largest value.
    pub max: f64,
}

/// Summarize a numeric series. Empty input yields all zeros.
///
/// # Examples
///
/// ```
/// use churnmap_history::analytics::describe;
///
/// let s = describe(&[1.0, 2.0, 3.0, 4.0, 5.0]);
/// assert_eq!(s.mean, 3.0);
/// assert_eq!(s.p50, 3.0);
/// assert_eq!(s.max, 5.0);
/// ```
pub fn describe(values: &[f64]) -> ColumnSummary {
    if values.is_empty() {
        return ColumnSummary::default();
    }
    let sorted = sorted_copy(values);
    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let std = if sorted.len() < 2 {
        0.0
    } else {
        (sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    };
    ColumnSummary {
        mean,
        std,
        min: sorted[0],
        p25: percentile(&sorted, 25.0),
        p50: percentile(&sorted, 50.0),
        p75: percentile(&sorted, 75.0),
        max: sorted[sorted.len() - 1],
    }
}

/// The statistics document reported by `info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    /// Total changed lines.
    pub lines: u64,
    /// Net added lines (`insertions - deletions`).
    pub added: i64,
    /// `1 - added / lines`, or 0 when nothing changed.
    pub refactor: f64,
    /// Gini coefficient of per-bucket `lines`.
    pub gini: f64,
    /// Resampling period used for the buckets.
    pub timeslot: String,
    /// Number of buckets.
    pub buckets: usize,
    /// Per-column summaries of the bucketed series.
    pub describe: BTreeMap<String, ColumnSummary>,
}

/// Build the statistics document for a table.
///
/// # Examples
///
/// ```
/// use churnmap_history::analytics::{summarize, Timeslot};
/// use churnmap_history::table::CommitTable;
///
/// let stats = summarize(&CommitTable::empty(), Timeslot::WEEK);
/// assert_eq!(stats.lines, 0);
/// assert_eq!(stats.refactor, 0.0);
/// assert_eq!(stats.buckets, 0);
/// ```
pub fn summarize(table: &CommitTable, slot: Timeslot) -> Statistics {
    let lines: u64 = table.records().iter().map(|r| r.lines).sum();
    let insertions: i64 = table.records().iter().map(|r| r.insertions as i64).sum();
    let deletions: i64 = table.records().iter().map(|r| r.deletions as i64).sum();
    let added = insertions - deletions;
    let refactor = if lines == 0 {
        0.0
    } else {
        1.0 - added as f64 / lines as f64
    };

    let buckets = resample(table, slot);
    let column = |f: fn(&TimeBucket) -> u64| -> Vec<f64> {
        buckets.iter().map(|b| f(b) as f64).collect()
    };
    let bucket_lines = column(|b| b.lines);

    let mut describe_map = BTreeMap::new();
    describe_map.insert("insertions".to_string(), describe(&column(|b| b.insertions)));
    describe_map.insert("deletions".to_string(), describe(&column(|b| b.deletions)));
    describe_map.insert("lines".to_string(), describe(&bucket_lines));
    describe_map.insert("files".to_string(), describe(&column(|b| b.files)));
    describe_map.insert("authors".to_string(), describe(&column(|b| b.authors)));

    Statistics {
        lines,
        added,
        refactor,
        gini: gini(&bucket_lines),
        timeslot: slot.to_string(),
        buckets: buckets.len(),
        describe: describe_map,
    }
}
