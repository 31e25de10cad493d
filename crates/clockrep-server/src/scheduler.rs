//! Cron-driven monthly email
//!
//! Expressions are evaluated in UTC. Five-field (minute-first) expressions are
//! read as crontab: they get a leading `0` seconds field, and numeric
//! days of the week (0 and 7 are Sunday) are spelled out as names, since the
//! `cron` crate numbers Sunday as 1.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clockrep_pipeline::ReportPipeline;
use cron::Schedule;
use tracing::{error, info, warn};

use crate::delivery::send_last_month;
use crate::mail::ReportMailer;

const WEEKDAYS: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

pub fn parse_schedule(expression: &str) -> Result<Schedule, cron::error::Error> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if let [minute, hour, day, month, weekday] = fields.as_slice() {
        let weekday = crontab_weekdays(weekday);
        Schedule::from_str(&format!("0 {minute} {hour} {day} {month} {weekday}"))
    } else {
        Schedule::from_str(expression.trim())
    }
}

/// Rewrite a crontab day-of-week field (0-7, ranges, lists, steps) to names.
/// Items that are not numeric are left for the cron parser to judge.
fn crontab_weekdays(field: &str) -> String {
    field
        .split(',')
        .map(|item| match weekday_numbers(item) {
            Some(days) => days
                .into_iter()
                .map(|day| WEEKDAYS[usize::from(day % 7)])
                .collect::<Vec<_>>()
                .join(","),
            None => item.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn weekday_numbers(item: &str) -> Option<Vec<u8>> {
    let (span, step) = match item.split_once('/') {
        Some((span, step)) => (span, Some(step.parse::<u8>().ok().filter(|s| *s > 0)?)),
        None => (item, None),
    };

    let (start, end) = match span {
        "*" if step.is_none() => return None,
        "*" => (0, 6),
        _ => match span.split_once('-') {
            Some((start, end)) => (start.parse::<u8>().ok()?, end.parse::<u8>().ok()?),
            None => {
                let day = span.parse::<u8>().ok()?;
                (day, if step.is_some() { 7 } else { day })
            }
        },
    };
    if start > end || end > 7 {
        return None;
    }

    Some((start..=end).step_by(usize::from(step.unwrap_or(1))).collect())
}

/// First firing strictly after `now`
pub fn next_tick(schedule: &Schedule, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&now).next()
}

pub struct ReportScheduler {
    schedule: Schedule,
    pipeline: Arc<ReportPipeline>,
    mailer: Arc<dyn ReportMailer>,
}

impl ReportScheduler {
    pub fn new(
        schedule: Schedule,
        pipeline: Arc<ReportPipeline>,
        mailer: Arc<dyn ReportMailer>,
    ) -> Self {
        Self {
            schedule,
            pipeline,
            mailer,
        }
    }

    /// Sleep until each tick and run the email job until `shutdown` resolves.
    /// Job failures are logged and the loop keeps going.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        loop {
            let now = Utc::now();
            let Some(next) = next_tick(&self.schedule, now) else {
                warn!("Schedule has no future firings, scheduler stopped");
                return;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            info!(next = %next, "Next scheduled report");

            tokio::select! {
                () = &mut shutdown => {
                    info!("Scheduler shutting down");
                    return;
                }
                () = tokio::time::sleep(wait) => {}
            }

            match send_last_month(&self.pipeline, self.mailer.as_ref()).await {
                Ok(month) => info!(month = %month, "Scheduled report sent"),
                Err(err) => error!(error = %err, "Scheduled report failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn five_field_expression_gets_seconds() {
        let schedule = parse_schedule("30 8 1 * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 2, 14, 12, 0, 0).unwrap();
        assert_eq!(
            next_tick(&schedule, now),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap())
        );
    }

    #[test]
    fn six_field_expression_is_used_as_is() {
        let schedule = parse_schedule("15 0 9 * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 2, 14, 12, 0, 0).unwrap();
        assert_eq!(
            next_tick(&schedule, now),
            Some(Utc.with_ymd_and_hms(2024, 2, 15, 9, 0, 15).unwrap())
        );
    }

    #[test]
    fn tick_is_strictly_after_now() {
        let schedule = parse_schedule("0 8 1 * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        assert_eq!(
            next_tick(&schedule, now),
            Some(Utc.with_ymd_and_hms(2024, 4, 1, 8, 0, 0).unwrap())
        );
    }

    fn ticks(expression: &str, from: DateTime<Utc>, n: usize) -> Vec<DateTime<Utc>> {
        parse_schedule(expression).unwrap().after(&from).take(n).collect()
    }

    fn at_eight(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, day, 8, 0, 0).unwrap()
    }

    #[test]
    fn crontab_monday_is_one() {
        // Wednesday 2024-02-14
        let now = Utc.with_ymd_and_hms(2024, 2, 14, 12, 0, 0).unwrap();
        assert_eq!(ticks("0 8 * * 1", now, 1), vec![at_eight(19)]);
    }

    #[test]
    fn crontab_sunday_is_zero_or_seven() {
        let now = Utc.with_ymd_and_hms(2024, 2, 14, 12, 0, 0).unwrap();
        assert_eq!(ticks("0 8 * * 0", now, 1), vec![at_eight(18)]);
        assert_eq!(ticks("0 8 * * 7", now, 1), vec![at_eight(18)]);
    }

    #[test]
    fn crontab_weekday_range_is_monday_to_friday() {
        // Saturday 2024-02-17
        let now = Utc.with_ymd_and_hms(2024, 2, 17, 12, 0, 0).unwrap();
        assert_eq!(
            ticks("0 8 * * 1-5", now, 6),
            vec![
                at_eight(19),
                at_eight(20),
                at_eight(21),
                at_eight(22),
                at_eight(23),
                at_eight(26)
            ]
        );
    }

    #[test]
    fn weekday_field_is_spelled_out() {
        assert_eq!(crontab_weekdays("1-5"), "MON,TUE,WED,THU,FRI");
        assert_eq!(crontab_weekdays("0,7"), "SUN,SUN");
        assert_eq!(crontab_weekdays("5-7"), "FRI,SAT,SUN");
        assert_eq!(crontab_weekdays("*/2"), "SUN,TUE,THU,SAT");
        assert_eq!(crontab_weekdays("*"), "*");
        assert_eq!(crontab_weekdays("MON-FRI"), "MON-FRI");
    }

    #[test]
    fn garbage_expression_is_rejected() {
        assert!(parse_schedule("every monday").is_err());
    }
}
