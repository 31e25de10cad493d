//! Wire encoding for summary-report requests
//!
//! The reports endpoint expects array fields as repeated keys
//! (`groups=DATE&groups=PROJECT`), never `groups[]=` or comma-joined values,
//! and dates as ISO-8601 strings with millisecond precision.

use chrono::{DateTime, SecondsFormat, Utc};
use clockrep_core::{DateRange, ReportFilter, UserScope};
use url::form_urlencoded;

pub const EXPORT_TYPE: &str = "XLSX";
pub const AMOUNT_SHOWN: &str = "HIDE_AMOUNT";
pub const SORT_ORDER: &str = "ASCENDING";

/// Ordered key/value pairs of one summary-report request
pub fn summary_request_pairs(filter: &ReportFilter, range: &DateRange) -> Vec<(&'static str, String)> {
    let mut pairs = vec![
        ("dateRangeStart", iso_8601(range.start)),
        ("dateRangeEnd", iso_8601(range.end)),
        ("exportType", EXPORT_TYPE.to_string()),
        ("amountShown", AMOUNT_SHOWN.to_string()),
        ("sortOrder", SORT_ORDER.to_string()),
    ];

    pairs.extend(filter.groups().iter().map(|g| ("groups", g.as_str().to_string())));
    pairs.push(("sortColumn", filter.sort_column().as_str().to_string()));

    if let Some(users) = filter.users() {
        pairs.extend(users.ids.iter().map(|id| ("users.ids", id.clone())));
        pairs.push(("users.contains", UserScope::CONTAINS.to_string()));
        pairs.push(("users.status", UserScope::STATUS.to_string()));
    }

    pairs
}

/// `application/x-www-form-urlencoded` body with repeated array keys
pub fn summary_request_body(filter: &ReportFilter, range: &DateRange) -> String {
    let mut form = form_urlencoded::Serializer::new(String::new());
    for (key, value) in summary_request_pairs(filter, range) {
        form.append_pair(key, &value);
    }
    form.finish()
}

fn iso_8601(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}
