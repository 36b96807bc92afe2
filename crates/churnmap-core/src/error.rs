/// Errors that can occur across churnmap.
///
/// Library crates return this type directly; the binary reports it through
/// `miette` at the boundary.
///
/// # Examples
///
/// ```
/// use churnmap_core::ChurnmapError;
///
/// let err = ChurnmapError::Parse("not a date: 2020-13-01".into());
/// assert!(err.to_string().contains("2020-13-01"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ChurnmapError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    #[diagnostic(code(churnmap::io))]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(code(churnmap::config))]
    Config(String),

    /// Git operation failure (bad repository path, unknown branch, ...).
    #[error("git error: {0}")]
    #[diagnostic(
        code(churnmap::git),
        help("check the repository path and the branch or revision name")
    )]
    Git(String),

    /// Malformed date, timeslot, or other textual input.
    #[error("parse error: {0}")]
    #[diagnostic(
        code(churnmap::parse),
        help("dates must be ISO-8601 calendar dates like 2020-01-31")
    )]
    Parse(String),

    /// Invalid glob pattern in an allow/deny list.
    #[error("invalid pattern '{pattern}': {reason}")]
    #[diagnostic(code(churnmap::pattern))]
    Pattern {
        /// The offending pattern text.
        pattern: String,
        /// Why the pattern was rejected.
        reason: String,
    },

    /// CSV reading or writing failure.
    #[error("CSV error: {0}")]
    #[diagnostic(code(churnmap::csv))]
    Csv(#[from] csv::Error),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    #[diagnostic(code(churnmap::json))]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(churnmap::toml))]
    Toml(#[from] toml::de::Error),
}
