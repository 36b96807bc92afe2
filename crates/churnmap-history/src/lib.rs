//! Git history analytics: recency-weighted hotspots, contribution
//! inequality, and co-change networks.
//!
//! Commits are ingested from a repository with git2 into a date-sorted
//! [`table::CommitTable`], which can be exported to and read back from CSV.
//! From there, per-file rows (with renames resolved by
//! [`tracker::FileTracker`]) feed the hotspot scorer and the co-change graph
//! builder, while the commit-level table feeds the distribution statistics.

pub mod analytics;
pub mod authors;
pub mod community;
pub mod duration;
pub mod filter;
pub mod hotgraph;
pub mod hotspots;
pub mod mining;
pub mod patterns;
pub mod table;
pub mod tracker;
