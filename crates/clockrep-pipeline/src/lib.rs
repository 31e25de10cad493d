//! # clockrep-pipeline
//!
//! The report aggregation pipeline:
//!
//! ```text
//! selector ──► DateRangeResolver ──► ┌ summary report ┐  (concurrent, joined)
//!                                    └ member list    ┘
//!                                            │
//!                         ThrottledUserIterator (sequential, fail-fast)
//!                                            │
//!                                   WorkbookAssembler ──► ReportResult
//! ```
//!
//! A run either yields a complete [`ReportResult`] or a [`PipelineError`]
//! naming the phase (and, for member failures, the member) that broke it.
//! Nothing is shared between runs, and nothing prevents two runs from
//! overlapping.

pub mod throttle;
pub mod users;

pub use throttle::{
    FixedDelay, MonotonicClock, NoThrottle, Sleeper, Throttle, TimeSource, TokenBucket, TokioSleep,
    DEFAULT_DELAY,
};
pub use users::ThrottledUserIterator;

use std::sync::Arc;

use clockrep_core::{
    Clock, DateRangeResolver, DateSelector, PipelineError, ReportFilter, ReportResult,
    ReportSource, ResolvedMonth,
};
use clockrep_xlsx::{extract_first_sheet, WorkbookAssembler};
use tracing::{error, info, info_span, Instrument};

/// Builds monthly workbooks from an injected report source
#[derive(Clone)]
pub struct ReportPipeline {
    source: Arc<dyn ReportSource>,
    resolver: DateRangeResolver,
    throttle: Arc<dyn Throttle>,
    assembler: WorkbookAssembler,
}

impl ReportPipeline {
    /// Wall clock, 300 ms fixed delay between member reports
    pub fn new(source: Arc<dyn ReportSource>) -> Self {
        Self {
            source,
            resolver: DateRangeResolver::default(),
            throttle: Arc::new(FixedDelay::default()),
            assembler: WorkbookAssembler::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.resolver = DateRangeResolver::new(clock);
        self
    }

    pub fn with_throttle(mut self, throttle: Arc<dyn Throttle>) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_assembler(mut self, assembler: WorkbookAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn resolver(&self) -> &DateRangeResolver {
        &self.resolver
    }

    /// Run the whole pipeline for one month
    pub async fn generate(&self, selector: DateSelector) -> Result<ReportResult, PipelineError> {
        let resolved = self.resolver.resolve(selector);
        let span = info_span!(
            "report",
            year = resolved.month.year(),
            month = resolved.month.display_month()
        );

        async move {
            let result = self.run(resolved).await;
            if let Err(e) = &result {
                error!(phase = %e.phase(), error = %e, "Report generation failed");
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, resolved: ResolvedMonth) -> Result<ReportResult, PipelineError> {
        let ResolvedMonth { month, range } = resolved;
        info!(start = %range.start, end = %range.end, "Generating report");

        let summary_filter = ReportFilter::summary();
        let (summary, users) = tokio::join!(
            self.source.fetch_report(&summary_filter, &range),
            self.source.list_users()
        );

        let summary = summary
            .and_then(|payload| extract_first_sheet(&payload))
            .map_err(|source| PipelineError::Summary { month, source })?;
        info!(rows = summary.height(), "Aggregate summary fetched");

        let users = users.map_err(PipelineError::Members)?;
        info!(members = users.len(), "Member list fetched");

        let iterator = ThrottledUserIterator::new(self.source.clone(), self.throttle.clone());
        let member_sheets = iterator.run(&users, &range).await?;

        let sheet_count = member_sheets.len() + 1;
        let artifact = self
            .assembler
            .assemble(summary, member_sheets)
            .map_err(|source| PipelineError::Assemble { month, source })?;
        info!(sheets = sheet_count, bytes = artifact.len(), "Workbook assembled");

        Ok(ReportResult { artifact, month })
    }
}
