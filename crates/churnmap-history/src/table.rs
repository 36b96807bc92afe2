//! The commit table and its flat CSV form.
//!
//! A [`CommitTable`] is an immutable, date-sorted snapshot of
//! [`CommitRecord`]s. Filtering and expansion always produce new values.
//!
//! CSV layout: `date,hexsha,author,insertions,deletions,lines,files` plus a
//! `files_json` column (path → `{insertions, deletions, lines}`) when the
//! table carries per-file detail.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use chrono::NaiveDateTime;
use churnmap_core::ChurnmapError;
use serde::{Deserialize, Serialize};

use crate::filter::GlobFilter;
use crate::mining::{CommitRecord, FileStat};
use crate::tracker::FileTracker;

/// Timestamp layout used in CSV files.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const HEADER: [&str; 7] = [
    "date",
    "hexsha",
    "author",
    "insertions",
    "deletions",
    "lines",
    "files",
];
const FILES_JSON: &str = "files_json";

/// One `(commit, file)` row of an expanded table.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use churnmap_history::table::FileChangeRecord;
///
/// let row = FileChangeRecord {
///     date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(3, 4, 5).unwrap(),
///     hash: "abc".into(),
///     author: "alice".into(),
///     file_name: "src/lib.rs".into(),
///     insertions: 7,
///     deletions: 3,
///     lines: 10,
/// };
/// assert_eq!(row.lines, row.insertions + row.deletions);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChangeRecord {
    /// Commit timestamp.
    pub date: NaiveDateTime,
    /// Commit hash.
    pub hash: String,
    /// Commit author.
    pub author: String,
    /// Rename-resolved path.
    pub file_name: String,
    /// Lines added to this file.
    pub insertions: u64,
    /// Lines removed from this file.
    pub deletions: u64,
    /// `insertions + deletions`.
    pub lines: u64,
}

/// Date-sorted commit records.
///
/// # Examples
///
/// ```
/// use churnmap_history::table::CommitTable;
///
/// let table = CommitTable::empty();
/// assert!(table.is_empty());
/// assert!(table.expand_files(None).is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitTable {
    records: Vec<CommitRecord>,
}

impl CommitTable {
    /// A table with no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table, sorting records by date ascending.
    pub fn from_records(mut records: Vec<CommitRecord>) -> Self {
        records.sort_by(|a, b| a.date.cmp(&b.date));
        Self { records }
    }

    /// Rows in date order.
    pub fn records(&self) -> &[CommitRecord] {
        &self.records
    }

    /// Consume the table, returning its rows.
    pub fn into_records(self) -> Vec<CommitRecord> {
        self.records
    }

    /// Number of commits.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no commits.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether any row carries a per-file breakdown.
    pub fn has_detail(&self) -> bool {
        self.records.iter().any(|r| r.per_file.is_some())
    }

    /// Concatenate tables, dropping repeated hashes (first copy wins).
    ///
    /// # Examples
    ///
    /// ```
    /// use churnmap_history::table::CommitTable;
    ///
    /// let merged = CommitTable::concat([CommitTable::empty(), CommitTable::empty()]);
    /// assert!(merged.is_empty());
    /// ```
    pub fn concat<I>(tables: I) -> Self
    where
        I: IntoIterator<Item = CommitTable>,
    {
        let mut seen: HashSet<String> = HashSet::new();
        let records = tables
            .into_iter()
            .flat_map(|t| t.records)
            .filter(|r| seen.insert(r.hash.clone()))
            .collect();
        Self::from_records(records)
    }

    /// Rename tracker over every per-file path expression in the table.
    pub fn file_tracker(&self) -> FileTracker {
        FileTracker::create(
            self.records
                .iter()
                .filter_map(|r| r.per_file.as_ref())
                .flat_map(|files| files.keys()),
        )
    }

    /// One row per `(commit, file)`, with paths resolved to their newest name.
    ///
    /// Rows whose resolved name is rejected by `filter` are dropped. Commits
    /// without per-file detail contribute nothing.
    pub fn expand_files(&self, filter: Option<&GlobFilter>) -> Vec<FileChangeRecord> {
        let tracker = self.file_tracker();
        let mut rows = Vec::new();
        for record in &self.records {
            let Some(files) = &record.per_file else {
                continue;
            };
            for (path, stat) in files {
                let file_name = tracker.newest_name(path);
                if filter.is_some_and(|f| !f.matches(&file_name)) {
                    continue;
                }
                rows.push(FileChangeRecord {
                    date: record.date,
                    hash: record.hash.clone(),
                    author: record.author.clone(),
                    file_name,
                    insertions: stat.insertions,
                    deletions: stat.deletions,
                    lines: stat.lines,
                });
            }
        }
        rows
    }

    /// A new table restricted to files accepted by `filter`.
    ///
    /// Per-file maps keep only matching paths (judged by their newest name)
    /// and totals are recomputed. Commits whose touched files were all
    /// rejected are dropped. Rows without detail are kept unchanged.
    pub fn filter_files(&self, filter: &GlobFilter) -> Self {
        let tracker = self.file_tracker();
        let records = self
            .records
            .iter()
            .filter_map(|record| {
                let Some(files) = &record.per_file else {
                    return Some(record.clone());
                };
                if files.is_empty() {
                    return Some(record.clone());
                }
                let kept: BTreeMap<String, FileStat> = files
                    .iter()
                    .filter(|(path, _)| filter.matches(&tracker.newest_name(path)))
                    .map(|(path, stat)| (path.clone(), *stat))
                    .collect();
                if kept.is_empty() {
                    return None;
                }
                let insertions = kept.values().map(|s| s.insertions).sum();
                let deletions = kept.values().map(|s| s.deletions).sum();
                Some(CommitRecord {
                    insertions,
                    deletions,
                    lines: insertions + deletions,
                    file_count: kept.len() as u64,
                    per_file: Some(kept),
                    ..record.clone()
                })
            })
            .collect();
        Self { records }
    }

    /// A new table keeping commits whose author is accepted by `filter`.
    pub fn filter_authors(&self, filter: &GlobFilter) -> Self {
        Self {
            records: self
                .records
                .iter()
                .filter(|r| filter.matches(&r.author))
                .cloned()
                .collect(),
        }
    }

    /// Write the table as CSV.
    ///
    /// # Errors
    ///
    /// Returns [`ChurnmapError::Csv`] or [`ChurnmapError::Serialization`] on
    /// write or encoding failure.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ChurnmapError> {
        let detail = self.has_detail();
        let mut wtr = csv::Writer::from_writer(writer);

        let mut header: Vec<&str> = HEADER.to_vec();
        if detail {
            header.push(FILES_JSON);
        }
        wtr.write_record(&header)?;

        for r in &self.records {
            let mut row = vec![
                r.date.format(DATE_FORMAT).to_string(),
                r.hash.clone(),
                r.author.clone(),
                r.insertions.to_string(),
                r.deletions.to_string(),
                r.lines.to_string(),
                r.file_count.to_string(),
            ];
            if detail {
                // Rows without detail stay blank so they read back as `None`.
                let files = r.per_file.as_ref().map(serde_json::to_string).transpose()?;
                row.push(files.unwrap_or_default());
            }
            wtr.write_record(&row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Write the table to a CSV file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ChurnmapError::Io`] if the file cannot be created, or any
    /// error from [`CommitTable::write_csv`].
    pub fn write_csv_path(&self, path: &Path) -> Result<(), ChurnmapError> {
        self.write_csv(File::create(path)?)
    }

    /// Read one CSV export.
    ///
    /// # Errors
    ///
    /// Returns [`ChurnmapError::Csv`] for malformed rows,
    /// [`ChurnmapError::Parse`] for bad dates, and
    /// [`ChurnmapError::Serialization`] for a bad `files_json` cell.
    pub fn read_csv<R: Read>(reader: R) -> Result<Self, ChurnmapError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut records = Vec::new();
        for row in rdr.deserialize::<CsvRow>() {
            records.push(row?.into_record()?);
        }
        Ok(Self::from_records(records))
    }

    /// Read and concatenate several CSV exports, dropping repeated hashes.
    ///
    /// A path of `-` reads standard input.
    ///
    /// # Errors
    ///
    /// Returns [`ChurnmapError::Io`] if a file cannot be opened, or any
    /// error from [`CommitTable::read_csv`].
    pub fn read_csvs<P: AsRef<Path>>(paths: &[P]) -> Result<Self, ChurnmapError> {
        let mut tables = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let table = if path == Path::new("-") {
                Self::read_csv(io::stdin().lock())?
            } else {
                Self::read_csv(File::open(path)?)?
            };
            tables.push(table);
        }
        Ok(Self::concat(tables))
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    hexsha: String,
    author: String,
    insertions: u64,
    deletions: u64,
    lines: u64,
    files: u64,
    #[serde(default)]
    files_json: Option<String>,
}

impl CsvRow {
    fn into_record(self) -> Result<CommitRecord, ChurnmapError> {
        let date = NaiveDateTime::parse_from_str(self.date.trim(), DATE_FORMAT)
            .map_err(|e| ChurnmapError::Parse(format!("invalid timestamp '{}': {e}", self.date)))?;
        let per_file = match self.files_json.as_deref().map(str::trim) {
            Some(json) if !json.is_empty() => Some(serde_json::from_str(json)?),
            _ => None,
        };
        Ok(CommitRecord {
            date,
            hash: self.hexsha,
            author: self.author,
            insertions: self.insertions,
            deletions: self.deletions,
            lines: self.lines,
            file_count: self.files,
            per_file,
        })
    }
}
