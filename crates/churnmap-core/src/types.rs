use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How analysis subcommands render their report on stdout.
///
/// `log` always writes CSV, and `hotspot`/`hotgraph` switch to CSV with
/// their own `--csv` flag, so CSV is not a variant here.
///
/// # Examples
///
/// ```
/// use churnmap_core::OutputFormat;
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// assert_eq!(fmt.row(&["2024-01-01", "3"]), "| 2024-01-01 | 3 |");
/// assert!("csv".parse::<OutputFormat>().is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Aligned plain-text columns.
    #[default]
    Text,
    /// One pretty-printed JSON document, camelCase keys.
    Json,
    /// Markdown headings and pipe tables.
    Markdown,
}

impl OutputFormat {
    /// Join one table row of pre-rendered cells.
    ///
    /// JSON has no row form and falls back to the text layout.
    pub fn row<S: AsRef<str>>(self, cells: &[S]) -> String {
        let cells: Vec<&str> = cells.iter().map(AsRef::as_ref).collect();
        match self {
            OutputFormat::Markdown => format!("| {} |", cells.join(" | ")),
            OutputFormat::Text | OutputFormat::Json => cells.join("  "),
        }
    }

    /// Header separator line for a table of `columns` columns, if the format
    /// has one.
    pub fn rule(self, columns: usize) -> Option<String> {
        match self {
            OutputFormat::Markdown => Some(format!("|{}", "---|".repeat(columns))),
            OutputFormat::Text | OutputFormat::Json => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "csv" => Err("csv is not a report format; use --csv on hotspot or hotgraph".into()),
            other => Err(format!("unknown output format '{other}' (text, json, markdown)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_md_shorthand_in_any_case() {
        assert_eq!("MD".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("Json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
    }

    #[test]
    fn csv_points_at_the_csv_flag() {
        let err = "csv".parse::<OutputFormat>().unwrap_err();
        assert!(err.contains("--csv"));
        assert!("xml".parse::<OutputFormat>().unwrap_err().contains("text, json, markdown"));
    }

    #[test]
    fn markdown_rows_are_pipe_delimited() {
        let md = OutputFormat::Markdown;
        assert_eq!(md.row(&["week", "alice", "Others"]), "| week | alice | Others |");
        assert_eq!(md.rule(3).as_deref(), Some("|---|---|---|"));
    }

    #[test]
    fn text_rows_have_no_rule() {
        assert_eq!(OutputFormat::Text.row(&["a", "b"]), "a  b");
        assert_eq!(OutputFormat::Text.rule(2), None);
        assert_eq!(OutputFormat::default(), OutputFormat::Text);
    }
}
