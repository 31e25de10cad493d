//! # clockrep-server
//!
//! Delivery surfaces around the report pipeline: the authenticated HTTP
//! router, SMTP mail, and the cron scheduler. The `clockrep` binary wires
//! them together from [`config`].

pub mod auth;
pub mod config;
pub mod delivery;
pub mod mail;
pub mod routes;
pub mod scheduler;
pub mod shutdown;

pub use auth::{BasicAuth, REALM};
pub use delivery::{send_last_month, DeliveryError};
pub use mail::{MailError, MailSettings, ReportMailer, SmtpMailer};
pub use routes::{router, AppState};
pub use scheduler::{parse_schedule, ReportScheduler};
