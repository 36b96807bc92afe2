//! Git history extraction via git2.
//!
//! Walks one branch of a repository inside a [`Duration`] and normalizes
//! every commit into a [`CommitRecord`]. Merge commits are recorded with all
//! numeric fields zeroed so their diffs are never counted twice.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use churnmap_core::ChurnmapError;
use git2::{Delta, DiffFindOptions, DiffOptions, Patch, Repository, Sort};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::duration::Duration;
use crate::table::CommitTable;
use crate::tracker::rename_expression;

/// Line counts for one file, or for a whole commit.
///
/// # Examples
///
/// ```
/// use churnmap_history::mining::FileStat;
///
/// let stat = FileStat::new(10, 3);
/// assert_eq!(stat.lines, 13);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    /// Lines added.
    pub insertions: u64,
    /// Lines removed.
    pub deletions: u64,
    /// `insertions + deletions`.
    pub lines: u64,
}

impl FileStat {
    /// Build a stat, deriving `lines`.
    pub fn new(insertions: u64, deletions: u64) -> Self {
        Self {
            insertions,
            deletions,
            lines: insertions + deletions,
        }
    }
}

/// One normalized commit.
///
/// # Examples
///
/// ```
/// use churnmap_history::mining::{CommitRecord, DiffStat, FileStat, RawCommit};
///
/// let merge = RawCommit {
///     hash: "abc123".into(),
///     author: "alice".into(),
///     timestamp: 1_700_000_000,
///     parent_count: 2,
///     diff: DiffStat::from_files([("src/lib.rs".to_string(), FileStat::new(40, 2))]),
/// };
/// let record = CommitRecord::from_raw(merge, true);
/// assert_eq!(record.lines, 0);
/// assert_eq!(record.file_count, 0);
/// assert!(record.per_file.unwrap().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRecord {
    /// Commit timestamp (UTC, second precision).
    pub date: NaiveDateTime,
    /// Full hex object id.
    pub hash: String,
    /// Author display name.
    pub author: String,
    /// Lines added.
    pub insertions: u64,
    /// Lines removed.
    pub deletions: u64,
    /// `insertions + deletions`.
    pub lines: u64,
    /// Files touched.
    pub file_count: u64,
    /// Per-path breakdown, present only when detail was captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_file: Option<BTreeMap<String, FileStat>>,
}

impl CommitRecord {
    /// Normalize a raw commit.
    ///
    /// A commit with more than one parent keeps its identity but reports
    /// zero for every count and an empty per-file map.
    pub fn from_raw(raw: RawCommit, full: bool) -> Self {
        let date = DateTime::from_timestamp(raw.timestamp, 0)
            .unwrap_or_default()
            .naive_utc();

        if raw.is_merge() {
            return Self {
                date,
                hash: raw.hash,
                author: raw.author,
                insertions: 0,
                deletions: 0,
                lines: 0,
                file_count: 0,
                per_file: full.then(BTreeMap::new),
            };
        }

        let total = raw.diff.total();
        Self {
            date,
            hash: raw.hash,
            author: raw.author,
            insertions: total.insertions,
            deletions: total.deletions,
            lines: total.lines,
            file_count: raw.diff.files.len() as u64,
            per_file: full.then_some(raw.diff.files),
        }
    }
}

/// A commit as the repository reports it, before normalization.
#[derive(Debug, Clone)]
pub struct RawCommit {
    /// Full hex object id.
    pub hash: String,
    /// Author display name.
    pub author: String,
    /// Committer timestamp, seconds since the epoch.
    pub timestamp: i64,
    /// Number of parents; more than one marks a merge.
    pub parent_count: usize,
    /// Diff against the first parent.
    pub diff: DiffStat,
}

impl RawCommit {
    /// Whether this commit merges two or more lines of history.
    pub fn is_merge(&self) -> bool {
        self.parent_count > 1
    }
}

/// Per-path line counts for one diff.
///
/// Renamed paths are keyed by their rename expression (`a => b`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffStat {
    /// Line counts keyed by path or rename expression.
    pub files: BTreeMap<String, FileStat>,
}

impl DiffStat {
    /// Build from `(path, stat)` pairs; repeated paths accumulate.
    pub fn from_files<I>(files: I) -> Self
    where
        I: IntoIterator<Item = (String, FileStat)>,
    {
        let mut map: BTreeMap<String, FileStat> = BTreeMap::new();
        for (path, stat) in files {
            let entry = map.entry(path).or_default();
            *entry = FileStat::new(
                entry.insertions + stat.insertions,
                entry.deletions + stat.deletions,
            );
        }
        Self { files: map }
    }

    /// Sum over all files.
    pub fn total(&self) -> FileStat {
        self.files.values().fold(FileStat::default(), |acc, s| {
            FileStat::new(acc.insertions + s.insertions, acc.deletions + s.deletions)
        })
    }
}

/// Options for history ingestion.
///
/// # Examples
///
/// ```
/// use churnmap_history::mining::IngestOptions;
///
/// let opts = IngestOptions::default();
/// assert!(opts.branch.is_none());
/// assert!(!opts.full);
/// ```
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Revision to walk (default: HEAD).
    pub branch: Option<String>,
    /// Commit window.
    pub duration: Duration,
    /// Capture per-file detail.
    pub full: bool,
}

/// Ingest the commits of one branch inside the configured window.
///
/// Returns a table sorted by date ascending.
///
/// # Errors
///
/// Returns [`ChurnmapError::Git`] if the repository cannot be opened, the
/// branch does not resolve, or a commit cannot be diffed.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use churnmap_history::mining::{ingest, IngestOptions};
///
/// let table = ingest(Path::new("."), &IngestOptions::default()).unwrap();
/// for c in table.records() {
///     println!("{} {} +{} -{}", c.date, c.author, c.insertions, c.deletions);
/// }
/// ```
pub fn ingest(repo_path: &Path, options: &IngestOptions) -> Result<CommitTable, ChurnmapError> {
    ingest_with_progress(repo_path, options, |_| {})
}

/// [`ingest`], calling `progress` after each commit is recorded.
///
/// # Errors
///
/// Same as [`ingest`].
pub fn ingest_with_progress<F>(
    repo_path: &Path,
    options: &IngestOptions,
    mut progress: F,
) -> Result<CommitTable, ChurnmapError>
where
    F: FnMut(&CommitRecord),
{
    let repo = Repository::discover(repo_path)
        .map_err(|e| ChurnmapError::Git(format!("failed to open repository: {e}")))?;

    let mut revwalk = repo
        .revwalk()
        .map_err(|e| ChurnmapError::Git(format!("failed to create revwalk: {e}")))?;
    revwalk.set_sorting(Sort::TIME).ok();

    let branch = options.branch.as_deref().unwrap_or("HEAD");
    let tip = repo
        .revparse_single(branch)
        .and_then(|object| object.peel_to_commit())
        .map_err(|e| ChurnmapError::Git(format!("failed to resolve branch '{branch}': {e}")))?;
    revwalk
        .push(tip.id())
        .map_err(|e| ChurnmapError::Git(format!("failed to push oid: {e}")))?;

    let now = Utc::now();
    let since = options.duration.since_timestamp();
    let until = options.duration.until_timestamp(now);
    let mut records = Vec::new();

    for oid_result in revwalk {
        let oid = oid_result.map_err(|e| ChurnmapError::Git(format!("revwalk error: {e}")))?;
        let commit = repo
            .find_commit(oid)
            .map_err(|e| ChurnmapError::Git(format!("failed to find commit: {e}")))?;

        let timestamp = commit.time().seconds();
        if timestamp >= until {
            continue;
        }
        // Time-sorted walk: everything after this is older.
        if timestamp < since {
            break;
        }

        let parent_count = commit.parent_count();
        let diff = if parent_count > 1 {
            DiffStat::default()
        } else {
            diff_stat(&repo, &commit)?
        };

        let raw = RawCommit {
            hash: oid.to_string(),
            author: commit.author().name().unwrap_or("unknown").to_string(),
            timestamp,
            parent_count,
            diff,
        };
        let record = CommitRecord::from_raw(raw, options.full);
        progress(&record);
        records.push(record);
    }

    debug!(commits = records.len(), branch, "ingested history");
    Ok(CommitTable::from_records(records))
}

fn diff_stat(repo: &Repository, commit: &git2::Commit) -> Result<DiffStat, ChurnmapError> {
    let commit_tree = commit
        .tree()
        .map_err(|e| ChurnmapError::Git(format!("failed to get commit tree: {e}")))?;

    let parent_tree = if commit.parent_count() > 0 {
        let parent = commit
            .parent(0)
            .map_err(|e| ChurnmapError::Git(format!("failed to get parent: {e}")))?;
        Some(
            parent
                .tree()
                .map_err(|e| ChurnmapError::Git(format!("failed to get parent tree: {e}")))?,
        )
    } else {
        None
    };

    let mut diff_opts = DiffOptions::new();
    let mut diff = repo
        .diff_tree_to_tree(parent_tree.as_ref(), Some(&commit_tree), Some(&mut diff_opts))
        .map_err(|e| ChurnmapError::Git(format!("failed to compute diff: {e}")))?;

    let mut find_opts = DiffFindOptions::new();
    find_opts.renames(true);
    diff.find_similar(Some(&mut find_opts))
        .map_err(|e| ChurnmapError::Git(format!("failed to find renames: {e}")))?;

    let mut files = Vec::with_capacity(diff.deltas().len());
    for idx in 0..diff.deltas().len() {
        let Some(delta) = diff.get_delta(idx) else {
            continue;
        };
        let old_path = delta.old_file().path().map(|p| p.to_string_lossy().to_string());
        let new_path = delta.new_file().path().map(|p| p.to_string_lossy().to_string());

        let key = match (delta.status(), old_path, new_path) {
            (Delta::Renamed, Some(old), Some(new)) if old != new => rename_expression(&old, &new),
            (Delta::Deleted, Some(old), _) => old,
            (_, _, Some(new)) => new,
            (_, Some(old), None) => old,
            (_, None, None) => continue,
        };

        let patch = Patch::from_diff(&diff, idx)
            .map_err(|e| ChurnmapError::Git(format!("failed to build patch: {e}")))?;
        let stat = match patch {
            Some(patch) => {
                let (_, additions, deletions) = patch
                    .line_stats()
                    .map_err(|e| ChurnmapError::Git(format!("failed to count lines: {e}")))?;
                FileStat::new(additions as u64, deletions as u64)
            }
            // Binary content has no line stats.
            None => FileStat::default(),
        };
        files.push((key, stat));
    }

    Ok(DiffStat::from_files(files))
}
