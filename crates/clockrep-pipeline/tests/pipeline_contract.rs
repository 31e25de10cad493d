//! End-to-end pipeline behavior against an in-memory report source
//!
//! The fake source records every call boundary so ordering guarantees (the
//! summary/member-list join, the sequential member loop) can be asserted.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use calamine::{Reader, Xlsx};
use chrono::{TimeZone, Utc};
use clockrep_core::{
    DateRange, DateSelector, FixedClock, MonthKey, PipelineError, PipelinePhase, ReportError,
    ReportFilter, ReportSource, UserSummary,
};
use clockrep_pipeline::{ReportPipeline, Throttle};
use clockrep_xlsx::extract_first_sheet;
use pretty_assertions::assert_eq;
use rust_xlsxwriter::Workbook;

// =============================================================================
// Fakes
// =============================================================================

fn xlsx_payload(title: &str, rows: &[(&str, f64)]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet().set_name("Report").unwrap();
    sheet.write_string(0, 0, title).unwrap();
    for (i, (label, hours)) in rows.iter().enumerate() {
        sheet.write_string(i as u32 + 1, 0, *label).unwrap();
        sheet.write_number(i as u32 + 1, 1, *hours).unwrap();
    }
    workbook.save_to_buffer().unwrap()
}

fn summary_payload() -> Vec<u8> {
    xlsx_payload("Summary report", &[("Apollo", 120.0), ("Borealis", 32.5)])
}

fn user(id: &str, name: &str) -> UserSummary {
    UserSummary {
        id: id.into(),
        name: name.into(),
    }
}

#[derive(Default)]
struct FakeSource {
    users: Vec<UserSummary>,
    /// Member id whose report fails to fetch
    fetch_fails_for: Option<String>,
    /// Member id whose report is not a spreadsheet
    garbage_for: Option<String>,
    summary_fails: bool,
    members_fail: bool,
    events: Arc<Mutex<Vec<String>>>,
    ranges: Mutex<Vec<DateRange>>,
}

impl FakeSource {
    fn with_users(users: Vec<UserSummary>) -> Self {
        Self {
            users,
            ..Self::default()
        }
    }

    fn log(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }
}

#[async_trait]
impl ReportSource for FakeSource {
    async fn fetch_report(
        &self,
        filter: &ReportFilter,
        range: &DateRange,
    ) -> Result<Vec<u8>, ReportError> {
        self.ranges.lock().unwrap().push(*range);

        let Some(scope) = filter.users() else {
            self.log("start:summary".into());
            tokio::task::yield_now().await;
            self.log("end:summary".into());
            if self.summary_fails {
                return Err(ReportError::transport("Summary report request", "boom"));
            }
            return Ok(summary_payload());
        };

        let id = scope.ids[0].clone();
        self.log(format!("start:user:{id}"));
        tokio::task::yield_now().await;
        self.log(format!("end:user:{id}"));

        if self.fetch_fails_for.as_deref() == Some(id.as_str()) {
            return Err(ReportError::Transport {
                context: format!("Report request for user {id}"),
                status: Some(429),
                message: "Too many requests".into(),
            });
        }
        if self.garbage_for.as_deref() == Some(id.as_str()) {
            return Ok(b"<html>oops</html>".to_vec());
        }
        Ok(xlsx_payload(&format!("Detailed report {id}"), &[("Task", 1.5)]))
    }

    async fn list_users(&self) -> Result<Vec<UserSummary>, ReportError> {
        self.log("start:members".into());
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        self.log("end:members".into());
        if self.members_fail {
            return Err(ReportError::transport("Member list request", "refused"));
        }
        Ok(self.users.clone())
    }
}

/// Counts pauses into the shared event log
struct RecordingThrottle {
    events: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Throttle for RecordingThrottle {
    async fn pause(&self) {
        self.events.lock().unwrap().push("pause".into());
    }
}

fn pipeline_for(source: &Arc<FakeSource>) -> ReportPipeline {
    let now = Utc.with_ymd_and_hms(2024, 7, 15, 10, 0, 0).unwrap();
    ReportPipeline::new(source.clone())
        .with_clock(Arc::new(FixedClock(now)))
        .with_throttle(Arc::new(RecordingThrottle {
            events: source.events.clone(),
        }))
}

fn sheet_names(artifact: &[u8]) -> Vec<String> {
    let workbook: Xlsx<_> = Xlsx::new(std::io::Cursor::new(artifact)).unwrap();
    workbook.sheet_names()
}

fn count(events: &[String], name: &str) -> usize {
    events.iter().filter(|e| *e == name).count()
}

// =============================================================================
// Successful runs
// =============================================================================

#[tokio::test]
async fn n_members_yield_n_plus_one_sheets_in_member_order() {
    let source = Arc::new(FakeSource::with_users(vec![
        user("z", "Zoe"),
        user("a", "Adam"),
        user("m", "Mia"),
    ]));

    let result = pipeline_for(&source)
        .generate(DateSelector::Current)
        .await
        .expect("pipeline succeeds");

    assert_eq!(result.month, MonthKey::new(2024, 6).unwrap());
    assert_eq!(sheet_names(&result.artifact), vec!["Summary", "Zoe", "Adam", "Mia"]);
}

#[tokio::test]
async fn empty_member_list_yields_summary_only() {
    let source = Arc::new(FakeSource::with_users(vec![]));

    let result = pipeline_for(&source)
        .generate(DateSelector::Current)
        .await
        .expect("pipeline succeeds");

    assert_eq!(sheet_names(&result.artifact), vec!["Summary"]);
    assert_eq!(count(&source.events(), "pause"), 0);
}

#[tokio::test]
async fn summary_round_trips_through_the_artifact() {
    let source = Arc::new(FakeSource::with_users(vec![user("a", "Ana")]));

    let result = pipeline_for(&source)
        .generate(DateSelector::Current)
        .await
        .expect("pipeline succeeds");

    let expected = extract_first_sheet(&summary_payload()).unwrap().with_name("Summary");
    assert_eq!(extract_first_sheet(&result.artifact).unwrap(), expected);
}

#[tokio::test]
async fn summary_and_member_list_complete_before_first_member_fetch() {
    let source = Arc::new(FakeSource::with_users(vec![user("a", "Ana"), user("b", "Bo")]));

    pipeline_for(&source)
        .generate(DateSelector::Current)
        .await
        .expect("pipeline succeeds");

    let first_member = source.position("start:user:a").expect("member fetched");
    assert!(source.position("end:summary").unwrap() < first_member);
    assert!(source.position("end:members").unwrap() < first_member);

    // the two fan-out requests overlap
    assert!(source.position("start:members").unwrap() < source.position("end:summary").unwrap());
}

#[tokio::test]
async fn members_are_fetched_sequentially_with_a_pause_after_each() {
    let source = Arc::new(FakeSource::with_users(vec![user("a", "Ana"), user("b", "Bo")]));

    pipeline_for(&source)
        .generate(DateSelector::Current)
        .await
        .expect("pipeline succeeds");

    let events = source.events();
    let member_events: Vec<&str> = events
        .iter()
        .map(String::as_str)
        .skip_while(|e| !e.starts_with("start:user"))
        .collect();
    assert_eq!(
        member_events,
        vec![
            "start:user:a",
            "end:user:a",
            "pause",
            "start:user:b",
            "end:user:b",
            "pause"
        ]
    );
}

#[tokio::test]
async fn last_month_is_resolved_from_the_clock() {
    let source = Arc::new(FakeSource::with_users(vec![user("a", "Ana")]));

    let result = pipeline_for(&source)
        .generate(DateSelector::Last)
        .await
        .expect("pipeline succeeds");

    let june = MonthKey::new(2024, 5).unwrap();
    assert_eq!(result.month, june);
    let ranges = source.ranges.lock().unwrap().clone();
    assert_eq!(ranges.len(), 2);
    assert!(ranges.iter().all(|r| *r == june.range()));
}

#[tokio::test]
async fn duplicate_member_names_get_distinct_sheets() {
    let source = Arc::new(FakeSource::with_users(vec![
        user("1", "Sam"),
        user("2", "Sam"),
        user("3", "Summary"),
    ]));

    let result = pipeline_for(&source)
        .generate(DateSelector::Current)
        .await
        .expect("pipeline succeeds");

    assert_eq!(
        sheet_names(&result.artifact),
        vec!["Summary", "Sam", "Sam (2)", "Summary (2)"]
    );
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn member_fetch_failure_aborts_and_names_the_member() {
    let source = Arc::new(FakeSource {
        fetch_fails_for: Some("c".into()),
        ..FakeSource::with_users(vec![
            user("a", "Ana"),
            user("b", "Bo"),
            user("c", "Cy"),
            user("d", "Di"),
        ])
    });

    let err = pipeline_for(&source)
        .generate(DateSelector::Current)
        .await
        .unwrap_err();

    assert_eq!(err.phase(), PipelinePhase::UserReports);
    match &err {
        PipelineError::User(failure) => {
            assert_eq!(failure.position, 2);
            assert_eq!(failure.user, user("c", "Cy"));
            assert!(matches!(
                failure.source,
                ReportError::Transport { status: Some(429), .. }
            ));
        }
        other => panic!("expected member failure, got {other:?}"),
    }

    let events = source.events();
    assert_eq!(source.position("start:user:d"), None, "loop must stop at c");
    assert_eq!(count(&events, "pause"), 2);
}

#[tokio::test]
async fn member_parse_failure_is_treated_like_a_fetch_failure() {
    let source = Arc::new(FakeSource {
        garbage_for: Some("a".into()),
        ..FakeSource::with_users(vec![user("a", "Ana"), user("b", "Bo")])
    });

    let err = pipeline_for(&source)
        .generate(DateSelector::Current)
        .await
        .unwrap_err();

    assert_eq!(err.failed_user(), Some(&user("a", "Ana")));
    assert!(matches!(
        err,
        PipelineError::User(ref f) if matches!(f.source, ReportError::Parse(_))
    ));
    assert_eq!(source.position("start:user:b"), None);
    assert_eq!(count(&source.events(), "pause"), 0);
}

#[tokio::test]
async fn summary_failure_stops_before_member_work() {
    let source = Arc::new(FakeSource {
        summary_fails: true,
        ..FakeSource::with_users(vec![user("a", "Ana")])
    });

    let err = pipeline_for(&source)
        .generate(DateSelector::Current)
        .await
        .unwrap_err();

    assert_eq!(err.phase(), PipelinePhase::Summary);
    assert_eq!(source.position("start:user:a"), None);
}

#[tokio::test]
async fn member_list_failure_stops_before_member_work() {
    let source = Arc::new(FakeSource {
        members_fail: true,
        ..FakeSource::with_users(vec![user("a", "Ana")])
    });

    let err = pipeline_for(&source)
        .generate(DateSelector::Current)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Members(_)));
    assert_eq!(source.position("start:user:a"), None);
}
