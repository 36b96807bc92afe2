use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ChurnmapError;

/// Top-level configuration loaded from `.churnmap.toml`.
///
/// Supports layered resolution: CLI flags > local config > defaults.
///
/// # Examples
///
/// ```
/// use churnmap_core::ChurnmapConfig;
///
/// let config = ChurnmapConfig::default();
/// assert_eq!(config.history.months, 6);
/// assert_eq!(config.hotgraph.rank, 70);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChurnmapConfig {
    /// Commit ingestion settings.
    #[serde(default)]
    pub history: HistoryConfig,
    /// Hotspot scoring constants.
    #[serde(default)]
    pub hotspot: HotspotConfig,
    /// Co-change graph mining settings.
    #[serde(default)]
    pub hotgraph: HotgraphConfig,
    /// File allow/deny patterns applied before analysis.
    #[serde(default)]
    pub filter: FilterConfig,
    /// Report presentation settings.
    #[serde(default)]
    pub report: ReportConfig,
}

impl ChurnmapConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ChurnmapError::Io`] if the file cannot be read, or
    /// [`ChurnmapError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use churnmap_core::ChurnmapConfig;
    /// use std::path::Path;
    ///
    /// let config = ChurnmapConfig::from_file(Path::new(".churnmap.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, ChurnmapError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ChurnmapError::Toml`] if parsing fails, or
    /// [`ChurnmapError::Config`] if a value is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use churnmap_core::ChurnmapConfig;
    ///
    /// let toml = r#"
    /// [hotgraph]
    /// rank = 40
    /// "#;
    /// let config = ChurnmapConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.hotgraph.rank, 40);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, ChurnmapError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ChurnmapError> {
        let h = &self.hotspot;
        if !(0.0..=100.0).contains(&h.lower_percentile)
            || !(0.0..=100.0).contains(&h.upper_percentile)
            || h.lower_percentile > h.upper_percentile
        {
            return Err(ChurnmapError::Config(format!(
                "hotspot percentiles must satisfy 0 <= lower <= upper <= 100 (got {} and {})",
                h.lower_percentile, h.upper_percentile
            )));
        }
        if h.window_months == 0 {
            return Err(ChurnmapError::Config(
                "hotspot.window_months must be at least 1".into(),
            ));
        }
        if self.hotgraph.growth_rate <= 1.0 {
            return Err(ChurnmapError::Config(format!(
                "hotgraph.growth_rate must be greater than 1.0 (got {})",
                self.hotgraph.growth_rate
            )));
        }
        if self.hotgraph.max_attempts == 0 {
            return Err(ChurnmapError::Config(
                "hotgraph.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Commit ingestion configuration.
///
/// # Examples
///
/// ```
/// use churnmap_core::HistoryConfig;
///
/// let config = HistoryConfig::default();
/// assert_eq!(config.branch, "HEAD");
/// assert!(!config.full);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Branch or revision to walk (default: `"HEAD"`).
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Months of history when no explicit range is given (default: 6).
    #[serde(default = "default_months")]
    pub months: u32,
    /// Capture per-file detail (default: false).
    #[serde(default)]
    pub full: bool,
}

fn default_branch() -> String {
    "HEAD".into()
}

fn default_months() -> u32 {
    6
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            branch: default_branch(),
            months: default_months(),
            full: false,
        }
    }
}

/// Hotspot scoring constants.
///
/// The defaults are empirical; they are exposed so they can be tuned per
/// repository rather than re-derived.
///
/// # Examples
///
/// ```
/// use churnmap_core::HotspotConfig;
///
/// let config = HotspotConfig::default();
/// assert_eq!(config.window_months, 12);
/// assert_eq!(config.steepness, 12.0);
/// assert_eq!(config.lower_percentile, 0.5);
/// assert_eq!(config.upper_percentile, 99.5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotspotConfig {
    /// Length of the recency window ending now (default: 12 months).
    #[serde(default = "default_window_months")]
    pub window_months: u32,
    /// Steepness of the logistic recency curve (default: 12.0).
    #[serde(default = "default_steepness")]
    pub steepness: f64,
    /// Lower percentile bound for outlier trimming (default: 0.5).
    #[serde(default = "default_lower_percentile")]
    pub lower_percentile: f64,
    /// Upper percentile bound for outlier trimming (default: 99.5).
    #[serde(default = "default_upper_percentile")]
    pub upper_percentile: f64,
}

fn default_window_months() -> u32 {
    12
}

fn default_steepness() -> f64 {
    12.0
}

fn default_lower_percentile() -> f64 {
    0.5
}

fn default_upper_percentile() -> f64 {
    99.5
}

impl Default for HotspotConfig {
    fn default() -> Self {
        Self {
            window_months: default_window_months(),
            steepness: default_steepness(),
            lower_percentile: default_lower_percentile(),
            upper_percentile: default_upper_percentile(),
        }
    }
}

/// Co-change graph mining configuration.
///
/// # Examples
///
/// ```
/// use churnmap_core::HotgraphConfig;
///
/// let config = HotgraphConfig::default();
/// assert_eq!(config.timeout_secs, 10);
/// assert_eq!(config.max_attempts, 5);
/// assert_eq!(config.growth_rate, 1.3);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotgraphConfig {
    /// Rank of the file whose occurrence count anchors the support threshold (default: 70).
    #[serde(default = "default_rank")]
    pub rank: usize,
    /// Wall-clock budget per mining attempt in seconds (default: 10).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum mining attempts before giving up (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Threshold multiplier applied after a timeout (default: 1.3).
    #[serde(default = "default_growth_rate")]
    pub growth_rate: f64,
    /// Floor for the rank-derived support threshold (default: 3).
    #[serde(default = "default_min_threshold")]
    pub min_threshold: usize,
}

fn default_rank() -> usize {
    70
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    5
}

fn default_growth_rate() -> f64 {
    1.3
}

fn default_min_threshold() -> usize {
    3
}

impl Default for HotgraphConfig {
    fn default() -> Self {
        Self {
            rank: default_rank(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            growth_rate: default_growth_rate(),
            min_threshold: default_min_threshold(),
        }
    }
}

/// Glob allow/deny lists for file names.
///
/// # Examples
///
/// ```
/// use churnmap_core::FilterConfig;
///
/// let config = FilterConfig::default();
/// assert_eq!(config.allow, vec!["*"]);
/// assert!(config.deny.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Keep files matching at least one of these (default: `["*"]`).
    #[serde(default = "default_allow")]
    pub allow: Vec<String>,
    /// Drop files matching any of these.
    #[serde(default)]
    pub deny: Vec<String>,
}

fn default_allow() -> Vec<String> {
    vec!["*".into()]
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            allow: default_allow(),
            deny: Vec::new(),
        }
    }
}

/// Report presentation configuration.
///
/// # Examples
///
/// ```
/// use churnmap_core::ReportConfig;
///
/// let config = ReportConfig::default();
/// assert_eq!(config.timeslot, "2W");
/// assert_eq!(config.top, 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Resampling period like `2W`, `7D`, `1M` (default: `"2W"`).
    #[serde(default = "default_timeslot")]
    pub timeslot: String,
    /// Rows shown in hotspot tables (default: 30).
    #[serde(default = "default_top")]
    pub top: usize,
    /// Authors broken out in activity reports (default: 10).
    #[serde(default = "default_authors_top")]
    pub authors_top: usize,
}

fn default_timeslot() -> String {
    "2W".into()
}

fn default_top() -> usize {
    30
}

fn default_authors_top() -> usize {
    10
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            timeslot: default_timeslot(),
            top: default_top(),
            authors_top: default_authors_top(),
        }
    }
}
