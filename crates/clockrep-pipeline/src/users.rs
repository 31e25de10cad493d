//! Sequential, throttled per-member reports
//!
//! Members are processed strictly one after another in list order. Each step
//! is fetch → extract → rename; a successful step is followed by a throttle
//! pause. The first failing step ends the loop and is returned tagged with
//! its member. Sheets built before the failure are dropped.

use std::sync::Arc;

use clockrep_core::{
    DateRange, ReportError, ReportFilter, ReportSource, UserReportFailure, UserSummary,
    WorksheetModel,
};
use clockrep_xlsx::extract_first_sheet;
use tracing::{debug, info, warn};

use crate::throttle::Throttle;

/// Produces one worksheet per member, in order, aborting on first failure
#[derive(Clone)]
pub struct ThrottledUserIterator {
    source: Arc<dyn ReportSource>,
    throttle: Arc<dyn Throttle>,
}

impl ThrottledUserIterator {
    pub fn new(source: Arc<dyn ReportSource>, throttle: Arc<dyn Throttle>) -> Self {
        Self { source, throttle }
    }

    /// Fetch and parse one member's report; the sheet is named after the member
    pub async fn step(
        &self,
        position: usize,
        user: &UserSummary,
        range: &DateRange,
    ) -> Result<WorksheetModel, UserReportFailure> {
        self.fetch_sheet(user, range)
            .await
            .map(|sheet| sheet.with_name(user.name.as_str()))
            .map_err(|source| UserReportFailure {
                position,
                user: user.clone(),
                source,
            })
    }

    async fn fetch_sheet(
        &self,
        user: &UserSummary,
        range: &DateRange,
    ) -> Result<WorksheetModel, ReportError> {
        let payload = self
            .source
            .fetch_report(&ReportFilter::for_user(user.id.as_str()), range)
            .await?;
        extract_first_sheet(&payload)
    }

    /// All member sheets in list order, or the first failure
    pub async fn run(
        &self,
        users: &[UserSummary],
        range: &DateRange,
    ) -> Result<Vec<WorksheetModel>, UserReportFailure> {
        let mut sheets = Vec::with_capacity(users.len());

        for (position, user) in users.iter().enumerate() {
            debug!(position, user_id = %user.id, "Fetching member report");
            let sheet = match self.step(position, user, range).await {
                Ok(sheet) => sheet,
                Err(failure) => {
                    warn!(
                        position,
                        user_id = %user.id,
                        user = %user.name,
                        completed = sheets.len(),
                        error = %failure.source,
                        "Member report failed, abandoning remaining members"
                    );
                    return Err(failure);
                }
            };
            info!(
                position,
                user = %user.name,
                rows = sheet.height(),
                "Member report ready"
            );
            sheets.push(sheet);

            self.throttle.pause().await;
        }

        Ok(sheets)
    }
}
