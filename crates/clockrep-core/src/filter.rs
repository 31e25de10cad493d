//! Report filters understood by the upstream summary-report endpoint
//!
//! A [`ReportFilter`] only carries the parts that vary between requests:
//! grouping dimensions, sort column and an optional user scope. Sort order
//! (ascending), amount visibility (hidden) and export type (xlsx) are fixed
//! and added by the wire encoder.

use serde::{Deserialize, Serialize};

/// Grouping dimension for summary reports
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportGroup {
    Project,
    Date,
    #[serde(rename = "TIMEENTRY")]
    TimeEntry,
}

impl ReportGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "PROJECT",
            Self::Date => "DATE",
            Self::TimeEntry => "TIMEENTRY",
        }
    }
}

/// Column the grouped rows are sorted by
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortColumn {
    #[default]
    Group,
}

impl SortColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Group => "GROUP",
        }
    }
}

/// Restricts a report to a set of workspace members
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserScope {
    pub ids: Vec<String>,
}

impl UserScope {
    /// Membership test applied upstream to `ids`
    pub const CONTAINS: &'static str = "CONTAINS";
    /// Include active and inactive members
    pub const STATUS: &'static str = "ALL";
}

/// Immutable per-request filter
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportFilter {
    groups: Vec<ReportGroup>,
    sort_column: SortColumn,
    users: Option<UserScope>,
}

impl ReportFilter {
    /// Totals per project across all members
    pub fn summary() -> Self {
        Self {
            groups: vec![ReportGroup::Project],
            sort_column: SortColumn::Group,
            users: None,
        }
    }

    /// One member's entries grouped by date, project and time entry
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            groups: vec![ReportGroup::Date, ReportGroup::Project, ReportGroup::TimeEntry],
            sort_column: SortColumn::Group,
            users: Some(UserScope {
                ids: vec![user_id.into()],
            }),
        }
    }

    pub fn groups(&self) -> &[ReportGroup] {
        &self.groups
    }

    pub fn sort_column(&self) -> SortColumn {
        self.sort_column
    }

    pub fn users(&self) -> Option<&UserScope> {
        self.users.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn summary_groups_by_project_only() {
        let filter = ReportFilter::summary();
        assert_eq!(filter.groups(), &[ReportGroup::Project]);
        assert!(filter.users().is_none());
        assert_eq!(filter.sort_column(), SortColumn::Group);
    }

    #[test]
    fn user_filter_is_scoped_and_grouped_in_order() {
        let filter = ReportFilter::for_user("u-42");
        assert_eq!(
            filter.groups(),
            &[ReportGroup::Date, ReportGroup::Project, ReportGroup::TimeEntry]
        );
        assert_eq!(filter.users().unwrap().ids, vec!["u-42".to_string()]);
    }

    #[test]
    fn wire_names_match_serde_names() {
        for group in [ReportGroup::Project, ReportGroup::Date, ReportGroup::TimeEntry] {
            let json = serde_json::to_string(&group).unwrap();
            assert_eq!(json, format!("\"{}\"", group.as_str()));
        }
    }
}
