//! Command-line and environment configuration
//!
//! Every option can come from a flag or from the environment; `main` loads a
//! `.env` file with `dotenvy` before clap parses anything.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Args};
use clockrep_client::{
    ClientConfig, ClockifyClient, DEFAULT_API_URL, DEFAULT_PAGE_SIZE, DEFAULT_REPORTS_URL,
};
use clockrep_pipeline::{FixedDelay, ReportPipeline};

use crate::auth::BasicAuth;
use crate::mail::MailSettings;

/// Upstream API access and pacing
#[derive(Debug, Clone, Args)]
pub struct ClockifyArgs {
    /// Clockify API key
    #[arg(long, env = "CLOCKIFY_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Workspace whose members are reported
    #[arg(long, env = "CLOCKIFY_WORKSPACE_ID")]
    pub workspace_id: String,

    /// Base URL of the workspace API
    #[arg(long, env = "CLOCKIFY_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Base URL of the reports API
    #[arg(long, env = "CLOCKIFY_REPORTS_URL", default_value = DEFAULT_REPORTS_URL)]
    pub reports_url: String,

    /// Members requested in the single member-list call
    #[arg(long, env = "CLOCKIFY_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,

    /// Pause after each member report, in milliseconds
    #[arg(long, env = "REPORT_THROTTLE_MS", default_value_t = 300)]
    pub throttle_ms: u64,
}

impl ClockifyArgs {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.api_key, &self.workspace_id)
            .base_urls(&self.api_url, &self.reports_url)
            .page_size(self.page_size)
    }

    pub fn pipeline(&self) -> anyhow::Result<ReportPipeline> {
        let client = ClockifyClient::new(self.client_config())
            .context("invalid Clockify client configuration")?;
        let throttle = FixedDelay::new(Duration::from_millis(self.throttle_ms));
        Ok(ReportPipeline::new(Arc::new(client)).with_throttle(Arc::new(throttle)))
    }
}

/// Static credentials guarding every HTTP route
#[derive(Debug, Clone, Args)]
pub struct AccessArgs {
    #[arg(long, env = "ACCESS_USERNAME")]
    pub access_username: String,

    #[arg(long, env = "ACCESS_PASSWORD", hide_env_values = true)]
    pub access_password: String,
}

impl AccessArgs {
    pub fn basic_auth(&self) -> BasicAuth {
        BasicAuth::new(&self.access_username, &self.access_password)
    }
}

/// SMTP delivery of the monthly workbook
#[derive(Debug, Clone, Args)]
pub struct MailArgs {
    #[arg(long, env = "EMAIL_HOST")]
    pub email_host: String,

    #[arg(long, env = "EMAIL_PORT", default_value_t = 587)]
    pub email_port: u16,

    /// Implicit TLS; otherwise STARTTLS when the server offers it
    #[arg(long, env = "EMAIL_SSL", default_value_t = false, action = ArgAction::Set)]
    pub email_ssl: bool,

    #[arg(long, env = "EMAIL_USER")]
    pub email_user: Option<String>,

    #[arg(long, env = "EMAIL_PASSWORD", hide_env_values = true)]
    pub email_password: Option<String>,

    #[arg(long, env = "EMAIL_FROM")]
    pub email_from: String,

    /// Comma-separated recipients
    #[arg(long, env = "EMAIL_TO", value_delimiter = ',', required = true)]
    pub email_to: Vec<String>,

    /// Prefix of the subject line, followed by "{month}/{year}"
    #[arg(long, env = "EMAIL_SUBJECT", default_value = "Clockify report")]
    pub email_subject: String,

    #[arg(
        long,
        env = "EMAIL_BODY",
        default_value = "Attached is the Clockify report for last month."
    )]
    pub email_body: String,

    /// Cron expression (5 or 6 fields, UTC) for the scheduled email
    #[arg(long, env = "EMAIL_SCHEDULE", default_value = "0 8 1 * *")]
    pub email_schedule: String,
}

impl MailArgs {
    pub fn settings(&self) -> MailSettings {
        let credentials = self
            .email_user
            .as_ref()
            .map(|user| (user.clone(), self.email_password.clone().unwrap_or_default()));

        MailSettings {
            host: self.email_host.clone(),
            port: self.email_port,
            implicit_tls: self.email_ssl,
            credentials,
            from: self.email_from.clone(),
            to: self
                .email_to
                .iter()
                .map(|address| address.trim().to_string())
                .filter(|address| !address.is_empty())
                .collect(),
            subject: self.email_subject.clone(),
            body: self.email_body.clone(),
        }
    }
}

/// Listener address for `serve`
#[derive(Debug, Clone, Args)]
pub struct BindArgs {
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        clockify: ClockifyArgs,
        #[command(flatten)]
        mail: MailArgs,
    }

    const REQUIRED: [&str; 9] = [
        "clockrep",
        "--api-key=k",
        "--workspace-id=ws",
        "--email-host=smtp.example.com",
        "--email-from=reports@example.com",
        "--email-to=a@example.com, b@example.com",
        "--email-user=mailer",
        "--email-ssl=true",
        "--throttle-ms=0",
    ];

    #[test]
    fn defaults_cover_optional_settings() {
        let args = Harness::try_parse_from(REQUIRED[..6].iter().copied()).unwrap();
        assert_eq!(args.clockify.page_size, 500);
        assert_eq!(args.clockify.throttle_ms, 300);
        assert_eq!(args.clockify.api_url, DEFAULT_API_URL);
        assert_eq!(args.mail.email_port, 587);
        assert!(!args.mail.email_ssl);
        assert_eq!(args.mail.email_schedule, "0 8 1 * *");
    }

    #[test]
    fn recipients_are_split_and_trimmed() {
        let args = Harness::try_parse_from(REQUIRED).unwrap();
        let settings = args.mail.settings();
        assert_eq!(settings.to, vec!["a@example.com", "b@example.com"]);
        assert!(settings.implicit_tls);
        assert_eq!(
            settings.credentials,
            Some(("mailer".to_string(), String::new()))
        );
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let result = Harness::try_parse_from(["clockrep", "--workspace-id=ws"]);
        assert!(result.is_err());
    }
}
