//! The "last month by email" job shared by the route, the CLI and the scheduler

use clockrep_core::{DateSelector, MonthKey, PipelineError};
use clockrep_pipeline::ReportPipeline;
use thiserror::Error;
use tracing::info;

use crate::mail::{MailError, ReportMailer};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Build last month's workbook and mail it; returns the month that was sent
pub async fn send_last_month(
    pipeline: &ReportPipeline,
    mailer: &dyn ReportMailer,
) -> Result<MonthKey, DeliveryError> {
    let report = pipeline.generate(DateSelector::Last).await?;
    mailer.send_report(&report).await?;
    info!(month = %report.month, "Monthly report delivered");
    Ok(report.month)
}
