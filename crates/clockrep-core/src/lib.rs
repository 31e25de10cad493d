//! # clockrep-core
//!
//! Core domain model and traits for building monthly Clockify workbooks.
//!
//! This crate provides:
//! - Month selection: `MonthKey`, `DateRange`, `DateSelector`, `DateRangeResolver`
//! - Report filters: `ReportFilter`, `ReportGroup`
//! - Sheet model: `WorksheetModel`, `Cell`, `Workbook`
//! - The upstream seam: `ReportSource`
//! - Error types shared by every stage of the pipeline
//!
//! ## Example
//!
//! ```rust
//! use clockrep_core::{DateRangeResolver, DateSelector, FixedClock, MonthKey};
//! use chrono::{TimeZone, Utc};
//! use std::sync::Arc;
//!
//! let now = Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap();
//! let resolver = DateRangeResolver::new(Arc::new(FixedClock(now)));
//!
//! let resolved = resolver.resolve(DateSelector::Last);
//! assert_eq!(resolved.month, MonthKey::new(2023, 11).unwrap());
//! ```

pub mod filter;
pub mod month;
pub mod sheet;

pub use filter::{ReportFilter, ReportGroup, SortColumn, UserScope};
pub use month::{
    parse_number, Clock, DateRange, DateRangeResolver, DateSelector, FixedClock, MonthKey,
    ResolvedMonth, SystemClock,
};
pub use sheet::{Cell, SheetNames, Workbook, WorksheetModel, MAX_SHEET_NAME_LEN, SUMMARY_SHEET};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Media type of every artifact this workspace produces
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

// ============================================================================
// Upstream seam
// ============================================================================

/// A workspace member as listed upstream
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
}

impl fmt::Display for UserSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Where report payloads and the member list come from
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Fetch one xlsx-encoded summary report, returned unmodified
    async fn fetch_report(
        &self,
        filter: &ReportFilter,
        range: &DateRange,
    ) -> Result<Vec<u8>, ReportError>;

    /// Workspace members in upstream order
    async fn list_users(&self) -> Result<Vec<UserSummary>, ReportError>;
}

/// Output of one pipeline run
#[derive(Clone, Debug)]
pub struct ReportResult {
    /// Compressed xlsx workbook
    pub artifact: Vec<u8>,
    pub month: MonthKey,
}

// ============================================================================
// Errors
// ============================================================================

/// Failure of a single fetch, parse or write step
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("{context} failed{}: {message}", status_suffix(.status))]
    Transport {
        context: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Malformed spreadsheet payload: {0}")]
    Parse(String),

    #[error("Failed to write workbook: {0}")]
    Write(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" with status {s}")).unwrap_or_default()
}

impl ReportError {
    pub fn transport(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Transport {
            context: context.into(),
            status: None,
            message: message.to_string(),
        }
    }
}

/// Rejected date selector, raised before any pipeline work starts
#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("Month {0} is out of range")]
    MonthOutOfRange(u32),

    #[error("Year {0} is out of range")]
    YearOutOfRange(i32),

    #[error("Unknown month selector: {0:?}")]
    UnknownTag(String),

    #[error("Invalid {field}: {value:?} is not a number")]
    NotANumber { field: &'static str, value: String },
}

/// A per-member step failed; the whole run is abandoned
#[derive(Debug, Error)]
#[error("Report for member {user} (position {position}) failed: {source}")]
pub struct UserReportFailure {
    /// 0-based index into the member list
    pub position: usize,
    pub user: UserSummary,
    #[source]
    pub source: ReportError,
}

/// Stage of a pipeline run, used for log and error context
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelinePhase {
    Summary,
    Members,
    UserReports,
    Assemble,
}

impl PipelinePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Members => "members",
            Self::UserReports => "user-reports",
            Self::Assemble => "assemble",
        }
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a pipeline run produced no artifact
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Aggregate summary for {month} failed: {source}")]
    Summary {
        month: MonthKey,
        #[source]
        source: ReportError,
    },

    #[error("Member list failed: {0}")]
    Members(#[source] ReportError),

    #[error(transparent)]
    User(#[from] UserReportFailure),

    #[error("Workbook assembly for {month} failed: {source}")]
    Assemble {
        month: MonthKey,
        #[source]
        source: ReportError,
    },
}

impl PipelineError {
    pub fn phase(&self) -> PipelinePhase {
        match self {
            Self::Summary { .. } => PipelinePhase::Summary,
            Self::Members(_) => PipelinePhase::Members,
            Self::User(_) => PipelinePhase::UserReports,
            Self::Assemble { .. } => PipelinePhase::Assemble,
        }
    }

    /// The member whose step aborted the run, if any
    pub fn failed_user(&self) -> Option<&UserSummary> {
        match self {
            Self::User(failure) => Some(&failure.user),
            _ => None,
        }
    }
}
