//! Allow/deny glob filtering for file names and authors.
//!
//! A name is kept when it matches at least one allow pattern and no deny
//! pattern. `*` also matches `/`, so `*.rs` selects Rust files at any depth.

use churnmap_core::{ChurnmapError, FilterConfig};

/// Compiled allow/deny pattern lists.
///
/// # Examples
///
/// ```
/// use churnmap_history::filter::GlobFilter;
///
/// let filter = GlobFilter::new(&["src/*".into()], &["*.gen.rs".into()]).unwrap();
/// assert!(filter.matches("src/lib.rs"));
/// assert!(!filter.matches("src/parser.gen.rs"));
/// assert!(!filter.matches("docs/index.md"));
/// ```
#[derive(Debug, Clone)]
pub struct GlobFilter {
    allow: Vec<glob::Pattern>,
    deny: Vec<glob::Pattern>,
}

impl GlobFilter {
    /// Compile allow and deny lists. An empty allow list means "everything".
    ///
    /// # Errors
    ///
    /// Returns [`ChurnmapError::Pattern`] for a malformed pattern.
    pub fn new(allow: &[String], deny: &[String]) -> Result<Self, ChurnmapError> {
        let allow = if allow.is_empty() {
            vec![match_all()]
        } else {
            compile(allow)?
        };
        Ok(Self {
            allow,
            deny: compile(deny)?,
        })
    }

    /// A filter that accepts every name.
    ///
    /// # Examples
    ///
    /// ```
    /// use churnmap_history::filter::GlobFilter;
    ///
    /// assert!(GlobFilter::allow_all().matches("any/path/at/all.txt"));
    /// ```
    pub fn allow_all() -> Self {
        Self {
            allow: vec![match_all()],
            deny: Vec::new(),
        }
    }

    /// Compile the `[filter]` section of the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ChurnmapError::Pattern`] for a malformed pattern.
    pub fn from_config(config: &FilterConfig) -> Result<Self, ChurnmapError> {
        Self::new(&config.allow, &config.deny)
    }

    /// Whether `name` is allowed and not denied.
    pub fn matches(&self, name: &str) -> bool {
        self.allow.iter().any(|p| p.matches(name)) && !self.deny.iter().any(|p| p.matches(name))
    }
}

fn match_all() -> glob::Pattern {
    glob::Pattern::new("*").unwrap_or_default()
}

fn compile(patterns: &[String]) -> Result<Vec<glob::Pattern>, ChurnmapError> {
    patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|e| ChurnmapError::Pattern {
                pattern: p.clone(),
                reason: e.msg.to_string(),
            })
        })
        .collect()
}
