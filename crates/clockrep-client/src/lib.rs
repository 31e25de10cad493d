//! # clockrep-client
//!
//! Typed HTTP client for the two Clockify endpoints clockrep needs:
//! - `POST {reports}/workspaces/{id}/reports/summary`: xlsx summary export
//! - `GET {api}/workspaces/{id}/users`: workspace member list
//!
//! Each call is a single attempt; transport failures and non-2xx responses
//! surface as [`ReportError::Transport`].

pub mod encode;

use async_trait::async_trait;
use clockrep_core::{DateRange, ReportError, ReportFilter, ReportSource, UserSummary};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Response;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.clockify.me/api/v1/";
pub const DEFAULT_REPORTS_URL: &str = "https://reports.api.clockify.me/v1/";
pub const DEFAULT_PAGE_SIZE: u32 = 500;

const API_KEY_HEADER: &str = "X-Api-Key";
const ERROR_BODY_LIMIT: usize = 200;

/// Connection settings for one workspace
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_key: String,
    pub workspace_id: String,
    pub api_url: String,
    pub reports_url: String,
    /// Members requested in the single member-list call
    pub page_size: u32,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>, workspace_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            workspace_id: workspace_id.into(),
            api_url: DEFAULT_API_URL.into(),
            reports_url: DEFAULT_REPORTS_URL.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Point both endpoints somewhere else (proxies, tests)
    pub fn base_urls(mut self, api_url: impl Into<String>, reports_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self.reports_url = reports_url.into();
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }
}

/// Client construction error
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid base URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Base URL {0:?} cannot carry a path")]
    NotABase(String),

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Clockify client bound to one workspace
#[derive(Clone, Debug)]
pub struct ClockifyClient {
    http: reqwest::Client,
    api_key: String,
    page_size: u32,
    summary_url: Url,
    users_url: Url,
}

impl ClockifyClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let summary_url = workspace_url(
            &config.reports_url,
            &config.workspace_id,
            &["reports", "summary"],
        )?;
        let users_url = workspace_url(&config.api_url, &config.workspace_id, &["users"])?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("clockrep/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_key: config.api_key,
            page_size: config.page_size,
            summary_url,
            users_url,
        })
    }

    pub fn summary_url(&self) -> &Url {
        &self.summary_url
    }

    pub fn users_url(&self) -> &Url {
        &self.users_url
    }
}

#[async_trait]
impl ReportSource for ClockifyClient {
    async fn fetch_report(
        &self,
        filter: &ReportFilter,
        range: &DateRange,
    ) -> Result<Vec<u8>, ReportError> {
        let context = match filter.users() {
            Some(scope) => format!("Report request for user {}", scope.ids.join(", ")),
            None => "Summary report request".to_string(),
        };
        let body = encode::summary_request_body(filter, range);

        let response = self
            .http
            .post(self.summary_url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, clockrep_core::XLSX_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| ReportError::transport(&context, e))?;
        let response = ensure_success(response, &context).await?;

        let payload = response
            .bytes()
            .await
            .map_err(|e| ReportError::transport(&context, e))?;
        debug!(request = %context, bytes = payload.len(), "Fetched report payload");
        Ok(payload.to_vec())
    }

    async fn list_users(&self) -> Result<Vec<UserSummary>, ReportError> {
        let context = "Member list request";

        let response = self
            .http
            .get(self.users_url.clone())
            .query(&[("page-size", self.page_size)])
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| ReportError::transport(context, e))?;
        let response = ensure_success(response, context).await?;

        let users: Vec<UserSummary> = response
            .json()
            .await
            .map_err(|e| ReportError::transport("Member list decoding", e))?;
        debug!(count = users.len(), "Fetched member list");
        Ok(users)
    }
}

/// `{base}/workspaces/{workspace}/{tail...}` with each segment percent-encoded
fn workspace_url(base: &str, workspace_id: &str, tail: &[&str]) -> Result<Url, ClientError> {
    let mut url = Url::parse(base).map_err(|source| ClientError::InvalidUrl {
        url: base.to_string(),
        source,
    })?;
    url.path_segments_mut()
        .map_err(|()| ClientError::NotABase(base.to_string()))?
        .pop_if_empty()
        .push("workspaces")
        .push(workspace_id)
        .extend(tail);
    Ok(url)
}

async fn ensure_success(response: Response, context: &str) -> Result<Response, ReportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match body.trim() {
        "" => status
            .canonical_reason()
            .unwrap_or("Unexpected status")
            .to_string(),
        text => text.chars().take(ERROR_BODY_LIMIT).collect(),
    };
    Err(ReportError::Transport {
        context: context.to_string(),
        status: Some(status.as_u16()),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_endpoints() {
        let client = ClockifyClient::new(ClientConfig::new("key", "ws-1")).unwrap();
        assert_eq!(
            client.summary_url().as_str(),
            "https://reports.api.clockify.me/v1/workspaces/ws-1/reports/summary"
        );
        assert_eq!(
            client.users_url().as_str(),
            "https://api.clockify.me/api/v1/workspaces/ws-1/users"
        );
    }

    #[test]
    fn base_without_trailing_slash_and_odd_workspace_id() {
        let config = ClientConfig::new("key", "team a/b")
            .base_urls("http://localhost:9000/api", "http://localhost:9000");
        let client = ClockifyClient::new(config).unwrap();
        assert_eq!(
            client.users_url().as_str(),
            "http://localhost:9000/api/workspaces/team%20a%2Fb/users"
        );
        assert_eq!(
            client.summary_url().as_str(),
            "http://localhost:9000/workspaces/team%20a%2Fb/reports/summary"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let config = ClientConfig::new("key", "ws").base_urls("not a url", DEFAULT_REPORTS_URL);
        assert!(matches!(
            ClockifyClient::new(config),
            Err(ClientError::InvalidUrl { .. })
        ));

        let config = ClientConfig::new("key", "ws").base_urls("mailto:ops@example.com", DEFAULT_REPORTS_URL);
        assert!(matches!(
            ClockifyClient::new(config),
            Err(ClientError::NotABase(_))
        ));
    }
}
