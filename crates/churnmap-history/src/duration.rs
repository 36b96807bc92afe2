//! Analysis time windows.
//!
//! A [`Duration`] is a `since` date plus an optional `until` date. An open
//! `until` means "now" and is resolved by the consumer at the point of use,
//! never at construction time.

use chrono::{DateTime, Months, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use churnmap_core::ChurnmapError;
use serde::{Deserialize, Serialize};

/// Months of history used when neither a start date nor a month count is given.
pub const DEFAULT_MONTHS: u32 = 6;

/// Sentinel returned by [`Duration::until_text`] for open-ended windows.
pub const NOW: &str = "now";

/// A `[since, until)` window over commit history.
///
/// # Examples
///
/// ```
/// use churnmap_history::duration::Duration;
///
/// let d = Duration::months(10, Some("2019-01-01")).unwrap();
/// assert_eq!(d.since_text(), "2019-01-01");
/// assert_eq!(d.until_text(), "2019-11-01");
///
/// let open = Duration::from_now("2020-05-01").unwrap();
/// assert_eq!(open.until_text(), "now");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Duration {
    /// First day included in the window.
    pub since: NaiveDate,
    /// First day excluded from the window; `None` means "now".
    pub until: Option<NaiveDate>,
}

impl Duration {
    /// A window of `months` months.
    ///
    /// With `since`, the window is `since .. since + months`. Without it, the
    /// window starts `months` before today and stays open.
    ///
    /// # Errors
    ///
    /// Returns [`ChurnmapError::Parse`] if `since` is not an ISO-8601 date.
    pub fn months(months: u32, since: Option<&str>) -> Result<Self, ChurnmapError> {
        match since {
            Some(text) => {
                let since = parse_date(text)?;
                let until = add_months(since, months)?;
                Ok(Self {
                    since,
                    until: Some(until),
                })
            }
            None => Self::months_before(Utc::now().date_naive(), months),
        }
    }

    /// An open window starting `months` before `today`.
    ///
    /// # Errors
    ///
    /// Returns [`ChurnmapError::Parse`] if the start date would be out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use churnmap_history::duration::Duration;
    ///
    /// let today = NaiveDate::from_ymd_opt(2020, 3, 31).unwrap();
    /// let d = Duration::months_before(today, 1).unwrap();
    /// assert_eq!(d.since_text(), "2020-02-29");
    /// assert!(d.until.is_none());
    /// ```
    pub fn months_before(today: NaiveDate, months: u32) -> Result<Self, ChurnmapError> {
        let since = today
            .checked_sub_months(Months::new(months))
            .ok_or_else(|| ChurnmapError::Parse(format!("{months} months before {today} is out of range")))?;
        Ok(Self { since, until: None })
    }

    /// An explicit closed window.
    ///
    /// # Errors
    ///
    /// Returns [`ChurnmapError::Parse`] if either date is malformed or
    /// `since` is after `until`.
    ///
    /// # Examples
    ///
    /// ```
    /// use churnmap_history::duration::Duration;
    ///
    /// let d = Duration::range("2012-10-10", "2020-10-10").unwrap();
    /// assert_eq!(d.until_text(), "2020-10-10");
    /// assert!(Duration::range("2020-10-10", "2012-10-10").is_err());
    /// ```
    pub fn range(since: &str, until: &str) -> Result<Self, ChurnmapError> {
        let since = parse_date(since)?;
        let until = parse_date(until)?;
        if since > until {
            return Err(ChurnmapError::Parse(format!(
                "window start {since} is after its end {until}"
            )));
        }
        Ok(Self {
            since,
            until: Some(until),
        })
    }

    /// A window from `since` up to now.
    ///
    /// # Errors
    ///
    /// Returns [`ChurnmapError::Parse`] if `since` is malformed.
    pub fn from_now(since: &str) -> Result<Self, ChurnmapError> {
        Ok(Self {
            since: parse_date(since)?,
            until: None,
        })
    }

    /// Pick a window from optional CLI-style inputs.
    ///
    /// Priority: `since`+`until`, then `since`+`months`, then `since` alone
    /// (open until), then `months` alone, then `default_months` back from today.
    /// A lone `until` is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ChurnmapError::Parse`] on malformed dates.
    ///
    /// # Examples
    ///
    /// ```
    /// use churnmap_history::duration::Duration;
    ///
    /// let d = Duration::resolve(Some("2019-01-01"), None, Some(10), 6).unwrap();
    /// assert_eq!(d.until_text(), "2019-11-01");
    ///
    /// let d = Duration::resolve(Some("2019-01-01"), None, None, 6).unwrap();
    /// assert_eq!(d.until_text(), "now");
    /// ```
    pub fn resolve(
        since: Option<&str>,
        until: Option<&str>,
        months: Option<u32>,
        default_months: u32,
    ) -> Result<Self, ChurnmapError> {
        match (since, until, months) {
            (Some(since), Some(until), _) => Self::range(since, until),
            (Some(since), None, Some(months)) => Self::months(months, Some(since)),
            (Some(since), None, None) => Self::from_now(since),
            (None, _, Some(months)) => Self::months(months, None),
            (None, _, None) => Self::months(default_months, None),
        }
    }

    /// The start date as ISO-8601 text.
    pub fn since_text(&self) -> String {
        self.since.format("%Y-%m-%d").to_string()
    }

    /// The end date as ISO-8601 text, or `"now"` for open windows.
    pub fn until_text(&self) -> String {
        match self.until {
            Some(until) => until.format("%Y-%m-%d").to_string(),
            None => NOW.to_string(),
        }
    }

    /// Window length, resolving an open end against `now`.
    pub fn delta(&self, now: NaiveDateTime) -> TimeDelta {
        self.until.map_or(now, midnight) - midnight(self.since)
    }

    /// Unix timestamp of the first included second (UTC midnight of `since`).
    pub fn since_timestamp(&self) -> i64 {
        midnight(self.since).and_utc().timestamp()
    }

    /// Unix timestamp of the first excluded second, resolving "now" against `now`.
    pub fn until_timestamp(&self, now: DateTime<Utc>) -> i64 {
        self.until
            .map_or(now.timestamp(), |until| midnight(until).and_utc().timestamp())
    }

    /// Whether `timestamp` falls in `[since, until)`.
    pub fn contains(&self, timestamp: i64, now: DateTime<Utc>) -> bool {
        timestamp >= self.since_timestamp() && timestamp < self.until_timestamp(now)
    }
}

impl Default for Duration {
    fn default() -> Self {
        let today = Utc::now().date_naive();
        let since = today
            .checked_sub_months(Months::new(DEFAULT_MONTHS))
            .unwrap_or(today);
        Self { since, until: None }
    }
}

/// Parse an ISO-8601 calendar date (`YYYY-MM-DD`).
///
/// # Errors
///
/// Returns [`ChurnmapError::Parse`] for anything else, including time-of-day suffixes.
pub fn parse_date(text: &str) -> Result<NaiveDate, ChurnmapError> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|e| ChurnmapError::Parse(format!("invalid date '{text}': {e}")))
}

fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate, ChurnmapError> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| ChurnmapError::Parse(format!("{months} months after {date} is out of range")))
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0).unwrap_or_default()
}
