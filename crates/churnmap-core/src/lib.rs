//! Core types, configuration, and error handling for churnmap.
//!
//! This crate provides the shared foundation used by the history crate and
//! the `churnmap` binary:
//! - [`ChurnmapError`] — unified error type using `thiserror` and `miette`
//! - [`ChurnmapConfig`] — configuration loaded from `.churnmap.toml`
//! - [`OutputFormat`] — report rendering selector

mod config;
mod error;
mod types;

pub use config::{
    ChurnmapConfig, FilterConfig, HistoryConfig, HotgraphConfig, HotspotConfig, ReportConfig,
};
pub use error::ChurnmapError;
pub use types::OutputFormat;

/// A convenience `Result` type for churnmap operations.
pub type Result<T> = std::result::Result<T, ChurnmapError>;
