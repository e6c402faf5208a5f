use std::sync::LazyLock;

use chrono::{Duration, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::date_util::{first_of_month, start_of_week};
use crate::error::{Error, Result};
use crate::record::ActivityRecord;

static RE_LOOKBACK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{1,4})[dD]$").unwrap());
static RE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{1,2}-\d{1,2})\s*\.\.\s*(\d{4}-\d{1,2}-\d{1,2})$").unwrap()
});
static RE_DAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}$").unwrap());

/// Which days of activity a computation looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    /// Inclusive calendar range.
    Range { start: NaiveDate, end: NaiveDate },
    /// `today - N` through `today`, inclusive.
    Lookback(u32),
    /// Every record.
    All,
    /// Every record on the most recent date present in the data.
    LatestDay,
    /// First of the current month through today.
    MonthToDate,
    /// Sunday of the current week through today.
    WeekToDate,
}

impl Window {
    /// Parse a window string.
    ///
    /// Supported formats:
    /// - `all`: every record
    /// - `latest` / `today`: most recent day present
    /// - `7d`: lookback of N days
    /// - `mtd` / `wtd`: month / week to date
    /// - `2025-01-01..2025-01-31`: inclusive range
    /// - `2025-01-15`: a single day
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "all" => return Ok(Window::All),
            "latest" | "today" | "daily" => return Ok(Window::LatestDay),
            "mtd" => return Ok(Window::MonthToDate),
            "wtd" => return Ok(Window::WeekToDate),
            "weekly" => return Ok(Window::Lookback(7)),
            "monthly" => return Ok(Window::Lookback(30)),
            _ => {}
        }

        if let Some(caps) = RE_LOOKBACK.captures(s) {
            let n: u32 = caps[1]
                .parse()
                .map_err(|_| Error::WindowParse(format!("invalid lookback: {s}")))?;
            return Ok(Window::Lookback(n));
        }

        if let Some(caps) = RE_RANGE.captures(s) {
            let start = parse_day(&caps[1], s)?;
            let end = parse_day(&caps[2], s)?;
            return Ok(Window::Range { start, end });
        }

        if RE_DAY.is_match(s) {
            let day = parse_day(s, s)?;
            return Ok(Window::Range {
                start: day,
                end: day,
            });
        }

        Err(Error::WindowParse(format!("unrecognized window: {s}")))
    }

    /// Canonical key string, the inverse of [`Window::parse`].
    pub fn to_key(&self) -> String {
        match self {
            Window::Range { start, end } if start == end => start.format("%Y-%m-%d").to_string(),
            Window::Range { start, end } => {
                format!("{}..{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
            }
            Window::Lookback(n) => format!("{n}d"),
            Window::All => "all".to_string(),
            Window::LatestDay => "latest".to_string(),
            Window::MonthToDate => "mtd".to_string(),
            Window::WeekToDate => "wtd".to_string(),
        }
    }

    /// Resolve to inclusive bounds. `None` means the window is unbounded
    /// (`All`) or there is nothing to anchor to (`LatestDay` on no records).
    pub fn date_range(
        &self,
        today: NaiveDate,
        records: &[ActivityRecord],
    ) -> Option<(NaiveDate, NaiveDate)> {
        match self {
            Window::Range { start, end } => Some((*start, *end)),
            Window::Lookback(n) => {
                let start = today
                    .checked_sub_signed(Duration::days(*n as i64))
                    .unwrap_or(NaiveDate::MIN);
                Some((start, today))
            }
            Window::All => None,
            Window::LatestDay => records.iter().map(|r| r.date).max().map(|d| (d, d)),
            Window::MonthToDate => Some((first_of_month(today), today)),
            Window::WeekToDate => Some((start_of_week(today), today)),
        }
    }

    /// Select the records in this window, most recent first. Ties on date are
    /// ordered by member key so the output is deterministic.
    pub fn filter(&self, records: &[ActivityRecord], today: NaiveDate) -> Vec<ActivityRecord> {
        let mut selected: Vec<ActivityRecord> = match (self, self.date_range(today, records)) {
            (Window::All, _) => records.to_vec(),
            (_, Some((start, end))) => records
                .iter()
                .filter(|r| r.date >= start && r.date <= end)
                .cloned()
                .collect(),
            (_, None) => Vec::new(),
        };
        sort_desc(&mut selected);
        log::debug!(
            "Window {} kept {} of {} records",
            self.to_key(),
            selected.len(),
            records.len()
        );
        selected
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_key())
    }
}

/// Select the records of `window` relative to `today`, most recent first.
pub fn filter(
    records: &[ActivityRecord],
    window: &Window,
    today: NaiveDate,
) -> Vec<ActivityRecord> {
    window.filter(records, today)
}

/// Sort most recent first, then by member key.
pub fn sort_desc(records: &mut [ActivityRecord]) {
    records.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| a.team_member.cmp(&b.team_member))
    });
}

/// Comparison bucket for targets. Each bucket is aggregated separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Daily,
    Weekly,
    Monthly,
}

impl Timeframe {
    pub fn window(&self) -> Window {
        match self {
            Timeframe::Daily => Window::LatestDay,
            Timeframe::Weekly => Window::Lookback(7),
            Timeframe::Monthly => Window::Lookback(30),
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "day" => Ok(Timeframe::Daily),
            "weekly" | "week" => Ok(Timeframe::Weekly),
            "monthly" | "month" => Ok(Timeframe::Monthly),
            _ => Err(Error::WindowParse(format!("unknown timeframe: {s}"))),
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timeframe::Daily => write!(f, "daily"),
            Timeframe::Weekly => write!(f, "weekly"),
            Timeframe::Monthly => write!(f, "monthly"),
        }
    }
}

fn parse_day(s: &str, whole: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| Error::WindowParse(format!("invalid date in window: {whole}")))
}
