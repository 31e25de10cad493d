//! HTTP surface: download and email triggers, all behind Basic auth

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{middleware, Json, Router};
use clockrep_core::{
    parse_number, DateSelector, MonthKey, PipelineError, ReportResult, SelectorError,
    XLSX_CONTENT_TYPE,
};
use clockrep_pipeline::ReportPipeline;
use serde_json::json;
use tracing::{error, info};

use crate::auth::{require_basic_auth, BasicAuth};
use crate::delivery::send_last_month;
use crate::mail::ReportMailer;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ReportPipeline>,
    pub mailer: Arc<dyn ReportMailer>,
}

pub fn router(state: AppState, auth: BasicAuth) -> Router {
    Router::new()
        .route("/report", get(current_report))
        .route("/report/:month/:year", get(month_report))
        .route("/send-last-month-report", get(send_last_month_report))
        .layer(middleware::from_fn_with_state(
            Arc::new(auth),
            require_basic_auth,
        ))
        .with_state(state)
}

enum ApiError {
    BadRequest(SelectorError),
    Pipeline(PipelineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(err) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response(),
            // details stay in the logs
            Self::Pipeline(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Report generation failed" })),
            )
                .into_response(),
        }
    }
}

/// `month` is 1-based, as in the URL
fn parse_month_path(month: &str, year: &str) -> Result<DateSelector, SelectorError> {
    let month: u32 = parse_number("month", month)?;
    let year: i32 = parse_number("year", year)?;
    MonthKey::from_display(year, month).map(DateSelector::Month)
}

fn xlsx_response(report: ReportResult) -> Response {
    let disposition = format!(
        "attachment; filename=report-{}-{}.xlsx",
        report.month.display_month(),
        report.month.year()
    );
    (
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        report.artifact,
    )
        .into_response()
}

async fn download(state: &AppState, selector: DateSelector) -> Result<Response, ApiError> {
    let report = state
        .pipeline
        .generate(selector)
        .await
        .map_err(ApiError::Pipeline)?;
    info!(month = %report.month, bytes = report.artifact.len(), "Serving report");
    Ok(xlsx_response(report))
}

async fn current_report(State(state): State<AppState>) -> Result<Response, ApiError> {
    download(&state, DateSelector::Current).await
}

async fn month_report(
    State(state): State<AppState>,
    Path((month, year)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let selector = parse_month_path(&month, &year).map_err(ApiError::BadRequest)?;
    download(&state, selector).await
}

async fn send_last_month_report(State(state): State<AppState>) -> Json<serde_json::Value> {
    match send_last_month(&state.pipeline, state.mailer.as_ref()).await {
        Ok(_) => Json(json!({ "message": "Report sent" })),
        Err(err) => {
            error!(error = %err, "Sending last month's report failed");
            Json(json!({ "message": "Error sending report" }))
        }
    }
}
