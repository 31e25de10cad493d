//! Target month resolution
//!
//! Every report covers exactly one calendar month. Callers name the month
//! either explicitly or with a relative tag (`current`, `last`), and the
//! [`DateRangeResolver`] turns that into a [`MonthKey`] plus the UTC
//! [`DateRange`] sent upstream.
//!
//! ## Boundaries
//!
//! ```text
//! start = YYYY-MM-01T00:00:00Z
//! end   = YYYY-MM-<last>T23:59:00Z   (last minute, not last instant)
//! ```

use chrono::{DateTime, Datelike, Days, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::SelectorError;

// ============================================================================
// Clock
// ============================================================================

/// Source of "now" for relative month tags
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given instant
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

// ============================================================================
// MonthKey / DateRange
// ============================================================================

/// A calendar month. `month()` is 0-based (January = 0).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey {
    first_day: NaiveDate,
}

impl MonthKey {
    pub const MIN_YEAR: i32 = 1;
    pub const MAX_YEAR: i32 = 9999;

    /// Build from a 0-based month index
    pub fn new(year: i32, month: u32) -> Result<Self, SelectorError> {
        if month > 11 {
            return Err(SelectorError::MonthOutOfRange(month));
        }
        if !(Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year) {
            return Err(SelectorError::YearOutOfRange(year));
        }
        NaiveDate::from_ymd_opt(year, month + 1, 1)
            .map(|first_day| Self { first_day })
            .ok_or(SelectorError::YearOutOfRange(year))
    }

    /// Build from a 1-based month, as it appears in URLs and email subjects
    pub fn from_display(year: i32, month: u32) -> Result<Self, SelectorError> {
        match month {
            1..=12 => Self::new(year, month - 1),
            _ => Err(SelectorError::MonthOutOfRange(month)),
        }
    }

    /// The month containing `date`
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            first_day: date - Days::new(u64::from(date.day0())),
        }
    }

    pub fn year(&self) -> i32 {
        self.first_day.year()
    }

    /// 0-based month index
    pub fn month(&self) -> u32 {
        self.first_day.month0()
    }

    /// 1-based month number
    pub fn display_month(&self) -> u32 {
        self.first_day.month()
    }

    /// The preceding calendar month (December of the prior year for January)
    pub fn previous(&self) -> Self {
        Self {
            first_day: self.first_day - Months::new(1),
        }
    }

    /// UTC boundaries of this month
    pub fn range(&self) -> DateRange {
        let start = self.first_day.and_time(NaiveTime::MIN);
        let next_month = (self.first_day + Months::new(1)).and_time(NaiveTime::MIN);
        let end = next_month - Duration::minutes(1);

        DateRange {
            start: Utc.from_utc_datetime(&start),
            end: Utc.from_utc_datetime(&end),
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year(), self.display_month())
    }
}

/// UTC interval covered by one report
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

// ============================================================================
// Selector / Resolver
// ============================================================================

/// Which month a caller asked for
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DateSelector {
    Month(MonthKey),
    /// Month containing today (UTC)
    #[default]
    Current,
    /// Calendar month before the current one
    Last,
}

impl FromStr for DateSelector {
    type Err = SelectorError;

    /// Accepts `current`, `last`, or `YYYY-MM` with a 1-based month
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "current" => return Ok(Self::Current),
            "last" => return Ok(Self::Last),
            _ => {}
        }

        let (year, month) = trimmed
            .split_once('-')
            .ok_or_else(|| SelectorError::UnknownTag(trimmed.to_string()))?;
        let year = parse_number::<i32>("year", year)?;
        let month = parse_number::<u32>("month", month)?;
        MonthKey::from_display(year, month).map(Self::Month)
    }
}

impl From<MonthKey> for DateSelector {
    fn from(key: MonthKey) -> Self {
        Self::Month(key)
    }
}

/// Parse one numeric date component, keeping the offending text for the error
pub fn parse_number<T: FromStr>(field: &'static str, raw: &str) -> Result<T, SelectorError> {
    raw.trim().parse().map_err(|_| SelectorError::NotANumber {
        field,
        value: raw.to_string(),
    })
}

/// A selector pinned to a concrete month and interval
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedMonth {
    pub month: MonthKey,
    pub range: DateRange,
}

/// Turns selectors into concrete months using an injected clock
#[derive(Clone)]
pub struct DateRangeResolver {
    clock: Arc<dyn Clock>,
}

impl DateRangeResolver {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn current_month(&self) -> MonthKey {
        MonthKey::containing(self.clock.now().date_naive())
    }

    pub fn resolve(&self, selector: DateSelector) -> ResolvedMonth {
        let month = match selector {
            DateSelector::Month(key) => key,
            DateSelector::Current => self.current_month(),
            DateSelector::Last => self.current_month().previous(),
        };
        ResolvedMonth {
            month,
            range: month.range(),
        }
    }
}

impl Default for DateRangeResolver {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}
