//! Email delivery of a finished workbook

use async_trait::async_trait;
use clockrep_core::{MonthKey, ReportResult, XLSX_CONTENT_TYPE};
use lettre::address::AddressError;
use lettre::message::header::{ContentType, ContentTypeErr};
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("No recipients configured")]
    NoRecipients,

    #[error("Invalid address {address:?}: {source}")]
    Address {
        address: String,
        #[source]
        source: AddressError,
    },

    #[error("Invalid attachment content type: {0}")]
    ContentType(#[from] ContentTypeErr),

    #[error("Failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Sends one finished report to the configured recipients
#[async_trait]
pub trait ReportMailer: Send + Sync {
    async fn send_report(&self, report: &ReportResult) -> Result<(), MailError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSettings {
    pub host: String,
    pub port: u16,
    /// TLS from the first byte instead of STARTTLS
    pub implicit_tls: bool,
    pub credentials: Option<(String, String)>,
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// `"{prefix} {month}/{year}"` with a 1-based month
pub fn subject_for(prefix: &str, month: MonthKey) -> String {
    format!("{prefix} {}/{}", month.display_month(), month.year())
}

pub fn attachment_name(month: MonthKey) -> String {
    format!(
        "clockify-report-{}-{}.xlsx",
        month.display_month(),
        month.year()
    )
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|source| MailError::Address {
        address: address.to_string(),
        source,
    })
}

/// Plain-text body plus the workbook as a single attachment
pub fn build_message(settings: &MailSettings, report: &ReportResult) -> Result<Message, MailError> {
    if settings.to.is_empty() {
        return Err(MailError::NoRecipients);
    }

    let mut builder = Message::builder()
        .from(mailbox(&settings.from)?)
        .subject(subject_for(&settings.subject, report.month));
    for recipient in &settings.to {
        builder = builder.to(mailbox(recipient)?);
    }

    let attachment = Attachment::new(attachment_name(report.month))
        .body(report.artifact.clone(), ContentType::parse(XLSX_CONTENT_TYPE)?);
    let message = builder.multipart(
        MultiPart::mixed()
            .singlepart(SinglePart::plain(settings.body.clone()))
            .singlepart(attachment),
    )?;
    Ok(message)
}

/// SMTP over lettre's tokio transport
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    settings: MailSettings,
}

impl SmtpMailer {
    pub fn new(settings: MailSettings) -> Result<Self, MailError> {
        let mut builder = if settings.implicit_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?
        } else {
            let tls = TlsParameters::new(settings.host.clone())?;
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
                .tls(Tls::Opportunistic(tls))
        };
        builder = builder.port(settings.port);
        if let Some((user, password)) = &settings.credentials {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            settings,
        })
    }
}

#[async_trait]
impl ReportMailer for SmtpMailer {
    async fn send_report(&self, report: &ReportResult) -> Result<(), MailError> {
        let message = build_message(&self.settings, report)?;
        self.transport.send(message).await?;
        info!(
            recipients = self.settings.to.len(),
            attachment = %attachment_name(report.month),
            "Report emailed"
        );
        Ok(())
    }
}
